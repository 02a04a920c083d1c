// Piecewise-linear interpolation of a microstructure frequency curve.
//
// Samples are (graph_size, occurrence_count) pairs from real traces.
// Duplicate graph sizes keep the most recently recorded sample. Outside the
// sampled range the nearest segment continues linearly; a single sample
// extrapolates as a constant.

/// Interpolated occurrence count at `target` graph size.
///
/// Returns `None` when `samples` is empty (the caller maps that to the
/// interpolation-domain error, which carries the pattern name).
#[allow(clippy::cast_precision_loss)]
pub fn interpolate(samples: &[(usize, u64)], target: usize) -> Option<f64> {
    // Keep the latest sample per x, then sort by x.
    let mut dedup: Vec<(usize, u64)> = Vec::with_capacity(samples.len());
    for &(x, y) in samples {
        if let Some(existing) = dedup.iter_mut().find(|(ex, _)| *ex == x) {
            existing.1 = y;
        } else {
            dedup.push((x, y));
        }
    }
    dedup.sort_by_key(|&(x, _)| x);

    match dedup.as_slice() {
        [] => None,
        [(_, y)] => Some(*y as f64),
        points => {
            if let Some(&(_, y)) = points.iter().find(|&&(x, _)| x == target) {
                return Some(y as f64);
            }
            // Pick the segment to continue: the bracketing one inside the
            // range, the first/last one beyond it.
            let seg = if target < points[0].0 {
                (points[0], points[1])
            } else if target > points[points.len() - 1].0 {
                (points[points.len() - 2], points[points.len() - 1])
            } else {
                let hi = points.iter().position(|&(x, _)| x > target)?;
                (points[hi - 1], points[hi])
            };
            let ((x1, y1), (x2, y2)) = seg;
            let slope = (y2 as f64 - y1 as f64) / (x2 as f64 - x1 as f64);
            Some(y1 as f64 + slope * (target as f64 - x1 as f64))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_has_no_value() {
        assert!(interpolate(&[], 10).is_none());
    }

    #[test]
    fn single_sample_is_constant() {
        assert_eq!(interpolate(&[(10, 4)], 5), Some(4.0));
        assert_eq!(interpolate(&[(10, 4)], 100), Some(4.0));
    }

    #[test]
    fn exact_sample_wins() {
        let samples = [(10, 2), (20, 6), (30, 7)];
        assert_eq!(interpolate(&samples, 20), Some(6.0));
    }

    #[test]
    fn midpoint_is_linear() {
        let samples = [(10, 2), (20, 6)];
        assert_eq!(interpolate(&samples, 15), Some(4.0));
    }

    #[test]
    fn extrapolates_nearest_segment() {
        let samples = [(10, 2), (20, 6), (40, 8)];
        // Below range: continue the (10,2)-(20,6) segment.
        assert_eq!(interpolate(&samples, 5), Some(0.0));
        // Above range: continue the (20,6)-(40,8) segment.
        assert_eq!(interpolate(&samples, 50), Some(9.0));
    }

    #[test]
    fn duplicate_x_keeps_latest() {
        let samples = [(10, 2), (10, 5), (20, 5)];
        assert_eq!(interpolate(&samples, 10), Some(5.0));
        assert_eq!(interpolate(&samples, 15), Some(5.0));
    }

    #[test]
    fn unsorted_samples_are_handled() {
        let samples = [(30, 9), (10, 3), (20, 6)];
        assert_eq!(interpolate(&samples, 15), Some(4.5));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn within_range_stays_within_sample_bounds(
                ys in proptest::collection::vec(0u64..100, 2..6),
                frac in 0.0f64..1.0,
            ) {
                let samples: Vec<(usize, u64)> =
                    ys.iter().enumerate().map(|(i, &y)| ((i + 1) * 10, y)).collect();
                let lo = samples[0].0;
                let hi = samples[samples.len() - 1].0;
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let target = lo + ((hi - lo) as f64 * frac) as usize;
                let value = interpolate(&samples, target).unwrap();
                let min = *ys.iter().min().unwrap() as f64;
                let max = *ys.iter().max().unwrap() as f64;
                prop_assert!(value >= min - 1e-9 && value <= max + 1e-9);
            }
        }
    }
}
