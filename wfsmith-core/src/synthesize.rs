// Duplication/synthesis engine: grows a base graph to a target node count
// by structurally cloning microstructure occurrences in proportion to
// their interpolated real-world frequency.
//
// All precondition checks run before the base graph is copied, so a failed
// synthesis never exposes a partially-grown graph. The random source is
// injected by the caller; a fixed seed makes runs reproducible.

use std::collections::{BTreeSet, HashMap};

use petgraph::stable_graph::NodeIndex;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::Microstructure;
use crate::error::SynthesizeError;
use crate::graph::{TaskGraph, TaskId};
use crate::interpolate::interpolate;

/// Grow `base` until it reaches at least `target` nodes.
///
/// Eligible patterns (all of them when `allow_complex`, otherwise only
/// `simple` ones) each get `round(interpolated_count) - present` deferred
/// clone operations; the operations are shuffled into one random execution
/// order so growth interleaves patterns rather than exhausting one at a
/// time. Overshoot is allowed: a clone adds an entire occurrence
/// atomically. If the schedule runs out early, cloning continues over
/// uniformly chosen occurrences until the target is met.
pub fn synthesize(
    base: &TaskGraph,
    patterns: &[Microstructure],
    target: usize,
    allow_complex: bool,
    rng: &mut impl Rng,
) -> Result<TaskGraph, SynthesizeError> {
    let base_size = base.node_count();
    if target < base_size {
        return Err(SynthesizeError::ShrinkRequest {
            target,
            base: base_size,
        });
    }

    // A pattern with no occurrences, or with an empty occurrence set, has
    // nothing to clone; cloning it would add zero nodes and the growth
    // loop below would never advance.
    let eligible: Vec<&Microstructure> = patterns
        .iter()
        .filter(|ms| {
            (ms.simple || allow_complex)
                && !ms.occurrences.is_empty()
                && ms.occurrences.iter().all(|occ| !occ.is_empty())
        })
        .collect();
    if eligible.is_empty() {
        return Err(SynthesizeError::NoEligiblePatterns { allow_complex });
    }

    // Build the deferred clone schedule before touching the graph.
    let mut ops: Vec<usize> = Vec::new();
    for (i, ms) in eligible.iter().enumerate() {
        let expected = interpolate(&ms.frequencies, target).ok_or_else(|| {
            SynthesizeError::InterpolationDomain {
                pattern: ms.name.clone(),
            }
        })?;
        #[allow(clippy::cast_possible_truncation)]
        let needed = (expected.round() as i64) - (ms.occurrences.len() as i64);
        for _ in 0..needed.max(0) {
            ops.push(i);
        }
        debug!(
            pattern = ms.name,
            expected,
            present = ms.occurrences.len(),
            scheduled = needed.max(0),
            "Scheduled clone operations"
        );
    }
    ops.shuffle(rng);

    let mut graph = base.clone();
    for &i in &ops {
        if graph.node_count() >= target {
            break;
        }
        clone_occurrence(&mut graph, eligible[i], rng)?;
    }

    // Interpolation can under-estimate; keep cloning until the target is
    // met so growth is always monotonic.
    while graph.node_count() < target {
        let i = rng.gen_range(0..eligible.len());
        clone_occurrence(&mut graph, eligible[i], rng)?;
    }

    info!(
        base = base.name(),
        base_size,
        target,
        grown = graph.node_count(),
        synthetic = graph.synthetic_tasks().len(),
        "Synthesis complete"
    );
    Ok(graph)
}

/// Clone one randomly chosen occurrence of `pattern` into `graph`.
fn clone_occurrence(
    graph: &mut TaskGraph,
    pattern: &Microstructure,
    rng: &mut impl Rng,
) -> Result<BTreeSet<TaskId>, SynthesizeError> {
    let occurrence = pattern.occurrences.choose(rng).ok_or_else(|| {
        SynthesizeError::NoEligiblePatterns {
            allow_complex: true,
        }
    })?;
    structural_clone(graph, occurrence)
}

/// Structurally clone a node set: every member gets a fresh id, inherits
/// all attributes, and records a back-reference to its origin.
///
/// Edge rewiring: an edge between two members connects the two clones; an
/// edge to a node outside the set connects the clone to that same external
/// node, so fan-in/fan-out from the rest of the graph is preserved rather
/// than duplicated.
pub fn structural_clone(
    graph: &mut TaskGraph,
    occurrence: &BTreeSet<TaskId>,
) -> Result<BTreeSet<TaskId>, SynthesizeError> {
    let mut mapping: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut new_ids = BTreeSet::new();

    for id in occurrence {
        let orig_idx = graph
            .index_of(id)
            .ok_or_else(|| SynthesizeError::MissingOccurrenceNode(id.to_string()))?;
        let mut clone = graph.node(orig_idx).clone();
        clone.id = TaskId::new(format!("{id}_{}", Uuid::new_v4()));
        clone.duplicate_of = Some(id.clone());
        new_ids.insert(clone.id.clone());
        let new_idx = graph.add_task(clone);
        mapping.insert(orig_idx, new_idx);
    }

    let originals: Vec<NodeIndex> = mapping.keys().copied().collect();
    for orig_idx in originals {
        let new_idx = mapping[&orig_idx];
        for parent in graph.predecessors(orig_idx) {
            match mapping.get(&parent) {
                Some(&cloned_parent) => graph.add_edge(cloned_parent, new_idx),
                None => graph.add_edge(parent, new_idx),
            }
        }
        for child in graph.successors(orig_idx) {
            match mapping.get(&child) {
                Some(&cloned_child) => graph.add_edge(new_idx, cloned_child),
                None => graph.add_edge(new_idx, child),
            }
        }
    }

    Ok(new_ids)
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate;
    use crate::catalog::Catalog;
    use crate::config::DetectSection;
    use crate::detect::analyze_family;
    use crate::graph::TaskNode;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    /// SRC → A → {B1..Bk} → DST with all B the same type.
    fn fan(name: &str, k: usize) -> TaskGraph {
        let mut g = TaskGraph::new(name);
        let a = g.add_task(TaskNode::new("a_ID1", "a"));
        for i in 1..=k {
            let b = g.add_task(TaskNode::new(format!("b_ID{i}"), "b"));
            g.add_edge(a, b);
        }
        g.connect_sentinels();
        annotate(&mut g).unwrap();
        g
    }

    fn fan_catalog() -> Catalog {
        analyze_family(
            "w",
            vec![fan("small", 2), fan("large", 4)],
            &DetectSection::default(),
        )
        .unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn shrink_request_is_rejected() {
        let catalog = fan_catalog();
        let base = &catalog.bases[0];
        let err = synthesize(
            &base.graph,
            &base.microstructures,
            base.node_count - 1,
            false,
            &mut rng(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SynthesizeError::ShrinkRequest { target: 4, base: 5 }
        ));
    }

    #[test]
    fn target_equal_to_base_is_a_noop() {
        let catalog = fan_catalog();
        let base = &catalog.bases[0];
        let grown = synthesize(
            &base.graph,
            &base.microstructures,
            base.node_count,
            false,
            &mut rng(),
        )
        .unwrap();
        assert_eq!(grown.node_count(), base.node_count);
        assert!(grown.synthetic_tasks().is_empty());
    }

    #[test]
    fn growth_is_monotonic() {
        let catalog = fan_catalog();
        let base = &catalog.bases[0];
        for target in [6, 7, 9, 20, 50] {
            let grown = synthesize(
                &base.graph,
                &base.microstructures,
                target,
                false,
                &mut rng(),
            )
            .unwrap();
            assert!(
                grown.node_count() >= target,
                "target {target} not reached: {}",
                grown.node_count()
            );
        }
    }

    #[test]
    fn single_clone_wires_into_the_graph() {
        // Growing the 2-branch base by one node must add exactly one clone
        // of B1 or B2, connected from A and to DST, with a fresh id and a
        // back-reference.
        let catalog = fan_catalog();
        let base = &catalog.bases[0];
        let grown = synthesize(
            &base.graph,
            &base.microstructures,
            base.node_count + 1,
            false,
            &mut rng(),
        )
        .unwrap();
        assert_eq!(grown.node_count(), base.node_count + 1);

        let synthetic = grown.synthetic_tasks();
        assert_eq!(synthetic.len(), 1);
        let clone_id = synthetic.first().unwrap();
        let clone_idx = grown.index_of(clone_id).unwrap();
        let clone = grown.node(clone_idx);
        let origin = clone.duplicate_of.clone().unwrap();
        assert!(["b_ID1", "b_ID2"].contains(&origin.as_str()));
        assert_ne!(clone.id, origin);
        assert_eq!(clone.task_type, "b");

        let a = grown.index_of(&TaskId::new("a_ID1")).unwrap();
        assert_eq!(grown.predecessors(clone_idx), vec![a]);
        assert_eq!(grown.successors(clone_idx), vec![grown.dst_index()]);
    }

    #[test]
    fn multi_node_occurrence_clones_atomically() {
        // A → (B_i → C_i): the pattern is the 2-node chain. A single clone
        // must preserve external fan-in/fan-out and internal topology.
        let build = |name: &str, k: usize| {
            let mut g = TaskGraph::new(name);
            let a = g.add_task(TaskNode::new("a_ID1", "a"));
            for i in 1..=k {
                let b = g.add_task(TaskNode::new(format!("b_ID{i}"), "b"));
                let c = g.add_task(TaskNode::new(format!("c_ID{i}"), "c"));
                g.add_edge(a, b);
                g.add_edge(b, c);
            }
            g.connect_sentinels();
            annotate(&mut g).unwrap();
            g
        };
        let catalog = analyze_family(
            "w",
            vec![build("small", 2), build("large", 3)],
            &DetectSection::default(),
        )
        .unwrap();
        let base = &catalog.bases[0];
        let chain = base
            .microstructures
            .iter()
            .find(|ms| ms.size == 2)
            .expect("chain pattern");

        let mut grown = base.graph.clone();
        let occurrence = &chain.occurrences[0];
        let new_ids = structural_clone(&mut grown, occurrence).unwrap();
        assert_eq!(new_ids.len(), 2);
        assert_eq!(grown.node_count(), base.node_count + 2);

        let by_type = |t: &str| {
            new_ids
                .iter()
                .map(|id| grown.index_of(id).unwrap())
                .find(|&idx| grown.node(idx).task_type == t)
                .unwrap()
        };
        let new_b = by_type("b");
        let new_c = by_type("c");
        let a = grown.index_of(&TaskId::new("a_ID1")).unwrap();
        // External edges keep their external endpoint.
        assert_eq!(grown.predecessors(new_b), vec![a]);
        assert_eq!(grown.successors(new_c), vec![grown.dst_index()]);
        // Internal topology maps onto the clones.
        assert_eq!(grown.successors(new_b), vec![new_c]);
        assert_eq!(grown.predecessors(new_c), vec![new_b]);
    }

    #[test]
    fn complex_patterns_need_opt_in() {
        let catalog = fan_catalog();
        let base = &catalog.bases[0];
        let mut patterns = base.microstructures.clone();
        for ms in &mut patterns {
            ms.simple = false;
        }
        let err = synthesize(&base.graph, &patterns, 10, false, &mut rng()).unwrap_err();
        assert!(matches!(
            err,
            SynthesizeError::NoEligiblePatterns {
                allow_complex: false
            }
        ));
        let grown = synthesize(&base.graph, &patterns, 10, true, &mut rng()).unwrap();
        assert!(grown.node_count() >= 10);
    }

    #[test]
    fn empty_frequency_table_is_rejected_before_mutation() {
        let catalog = fan_catalog();
        let base = &catalog.bases[0];
        let mut patterns = base.microstructures.clone();
        patterns[0].frequencies.clear();
        let err = synthesize(&base.graph, &patterns, 10, false, &mut rng()).unwrap_err();
        assert!(matches!(
            err,
            SynthesizeError::InterpolationDomain { .. }
        ));
    }

    #[test]
    fn empty_occurrence_sets_are_not_eligible() {
        // A corrupted catalogue can carry occurrence entries with no
        // nodes; such a pattern must be rejected up front, not cloned
        // forever without ever growing the graph.
        let catalog = fan_catalog();
        let base = &catalog.bases[0];
        let mut patterns = base.microstructures.clone();
        patterns[0].occurrences = vec![BTreeSet::new()];
        let err = synthesize(&base.graph, &patterns, 10, false, &mut rng()).unwrap_err();
        assert!(matches!(
            err,
            SynthesizeError::NoEligiblePatterns {
                allow_complex: false
            }
        ));

        // A single empty set among valid ones poisons the pattern too:
        // the occurrence choice is random, so any empty entry can stall
        // growth.
        let mut patterns = base.microstructures.clone();
        patterns[0].occurrences.push(BTreeSet::new());
        let err = synthesize(&base.graph, &patterns, 10, false, &mut rng()).unwrap_err();
        assert!(matches!(err, SynthesizeError::NoEligiblePatterns { .. }));
    }

    #[test]
    fn missing_occurrence_node_is_an_error() {
        let catalog = fan_catalog();
        let base = &catalog.bases[0];
        let mut patterns = base.microstructures.clone();
        patterns[0].occurrences = vec![BTreeSet::from([TaskId::new("ghost_ID1")])];
        let err = synthesize(&base.graph, &patterns, 10, false, &mut rng()).unwrap_err();
        assert!(matches!(err, SynthesizeError::MissingOccurrenceNode(_)));
    }

    #[test]
    fn fixed_seed_reproduces_the_run() {
        let catalog = fan_catalog();
        let base = &catalog.bases[0];
        let mut rng_a = StdRng::seed_from_u64(99);
        let mut rng_b = StdRng::seed_from_u64(99);
        let a = synthesize(&base.graph, &base.microstructures, 12, false, &mut rng_a).unwrap();
        let b = synthesize(&base.graph, &base.microstructures, 12, false, &mut rng_b).unwrap();
        assert_eq!(a.node_count(), b.node_count());
        let origin_multiset = |g: &TaskGraph| -> BTreeMap<TaskId, usize> {
            let mut counts = BTreeMap::new();
            for id in g.synthetic_tasks() {
                let idx = g.index_of(&id).unwrap();
                let origin = g.node(idx).duplicate_of.clone().unwrap();
                *counts.entry(origin).or_insert(0) += 1;
            }
            counts
        };
        // Clone ids are fresh uuids, but the chosen origins must match.
        assert_eq!(origin_multiset(&a), origin_multiset(&b));
    }

    #[test]
    fn interpolated_schedule_hits_exact_family_sizes() {
        // Base has 2 occurrences at size 5; the family recorded 4 at size
        // 7. Growing to 7 schedules exactly two clones.
        let catalog = fan_catalog();
        let base = &catalog.bases[0];
        let grown = synthesize(
            &base.graph,
            &base.microstructures,
            7,
            false,
            &mut rng(),
        )
        .unwrap();
        assert_eq!(grown.node_count(), 7);
        assert_eq!(grown.synthetic_tasks().len(), 2);
    }
}
