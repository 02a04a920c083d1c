// Microstructure detector: finds node sets that recur as structurally
// identical subgraphs across a family of annotated traces of the same
// workflow.
//
// Detection runs on the smallest trace (the base graph): for every node,
// every unordered pair of its children with equal identity hashes seeds a
// subtree alignment, and the aligned node sets are recorded as two
// occurrences of one pattern. The rest of the family only contributes
// type-frequency statistics, which become each pattern's frequency curve.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use petgraph::stable_graph::NodeIndex;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::annotate::annotate;
use crate::catalog::{BaseEntry, Catalog, Microstructure};
use crate::config::DetectSection;
use crate::error::{DetectError, WfsmithError};
use crate::graph::{TaskGraph, TaskId};
use crate::hash::{Fingerprint, combine_hashes};
use crate::trace::load_trace;

/// Load every `*.json` trace under `dir`, decode and annotate each in
/// parallel, and return the family sorted by node count.
///
/// Traces are independent until the family is assembled, so the per-trace
/// work is farmed out to rayon; the caller owns the merged result.
pub fn load_family(dir: &Path) -> Result<Vec<TaskGraph>, WfsmithError> {
    let pattern = dir.join("*.json");
    let paths: Vec<std::path::PathBuf> = glob::glob(&pattern.to_string_lossy())
        .into_iter()
        .flatten()
        .flatten()
        .collect();

    let mut graphs: Vec<TaskGraph> = paths
        .par_iter()
        .map(|path| {
            let mut graph = load_trace(path)?;
            annotate(&mut graph)?;
            Ok(graph)
        })
        .collect::<Result<Vec<_>, WfsmithError>>()?;

    graphs.sort_by(|a, b| {
        a.node_count()
            .cmp(&b.node_count())
            .then_with(|| a.name().cmp(b.name()))
    });
    info!(dir = %dir.display(), traces = graphs.len(), "Loaded trace family");
    Ok(graphs)
}

/// Run detection over an annotated family and build the catalogue.
///
/// The family must be non-empty and fully annotated. The `options.bases`
/// smallest traces each become an interpolation anchor.
pub fn analyze_family(
    workflow: impl Into<String>,
    mut graphs: Vec<TaskGraph>,
    options: &DetectSection,
) -> Result<Catalog, DetectError> {
    if graphs.is_empty() {
        return Err(DetectError::EmptyFamily);
    }
    for graph in &graphs {
        if !graph.is_annotated() {
            return Err(DetectError::Unannotated(graph.name().to_string()));
        }
    }
    graphs.sort_by(|a, b| {
        a.node_count()
            .cmp(&b.node_count())
            .then_with(|| a.name().cmp(b.name()))
    });

    let sizes: Vec<usize> = graphs.iter().map(TaskGraph::node_count).collect();
    let type_freqs = type_frequencies(&graphs);

    let anchors = options.bases.max(1).min(graphs.len());
    let bases: Vec<BaseEntry> = (0..anchors)
        .map(|i| detect_on_base(&graphs[i], &type_freqs, &sizes, options, i))
        .collect();

    let workflow = workflow.into();
    info!(
        workflow,
        traces = graphs.len(),
        anchors,
        patterns = bases.first().map_or(0, |b| b.microstructures.len()),
        "Family analysis complete"
    );
    Ok(Catalog {
        workflow,
        sizes,
        bases,
    })
}

/// Per task type, its node count in each family graph (family order).
fn type_frequencies(graphs: &[TaskGraph]) -> HashMap<String, Vec<u64>> {
    let mut freqs: HashMap<String, Vec<u64>> = HashMap::new();
    for (i, graph) in graphs.iter().enumerate() {
        for idx in graph.node_indices() {
            let entry = freqs
                .entry(graph.node(idx).task_type.clone())
                .or_insert_with(|| vec![0; graphs.len()]);
            entry[i] += 1;
        }
    }
    freqs
}

/// Element-wise minimum over the root types' frequency vectors: the number
/// of whole pattern instances each graph can support.
fn pattern_frequencies(
    root_types: &BTreeSet<String>,
    type_freqs: &HashMap<String, Vec<u64>>,
    len: usize,
) -> Vec<u64> {
    let mut result = vec![u64::MAX; len];
    for root_type in root_types {
        match type_freqs.get(root_type) {
            Some(counts) => {
                for (slot, &count) in result.iter_mut().zip(counts) {
                    *slot = (*slot).min(count);
                }
            }
            None => result.fill(0),
        }
    }
    if root_types.is_empty() {
        result.fill(0);
    }
    result
}

/// A detected pattern before naming, filtering, and correlation.
#[derive(Debug, Clone)]
struct RawPattern {
    size: usize,
    root_types: BTreeSet<String>,
    occurrences: Vec<BTreeSet<TaskId>>,
}

fn detect_on_base(
    base: &TaskGraph,
    type_freqs: &HashMap<String, Vec<u64>>,
    sizes: &[usize],
    options: &DetectSection,
    anchor_index: usize,
) -> BaseEntry {
    let mut graph = base.clone();
    let identity = identity_map(&graph);

    // Explore from SRC; sibling order is irrelevant to correctness.
    let mut raw: BTreeMap<Fingerprint, RawPattern> = BTreeMap::new();
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut stack = vec![graph.src_index()];
    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        let children = graph.successors(node);
        for (i, &s1) in children.iter().enumerate() {
            for &s2 in &children[i + 1..] {
                if s1 == s2 || identity[&s1] != identity[&s2] {
                    continue;
                }
                let (occ1, occ2) = align_subtrees(&graph, &identity, s1, s2);
                record_pair(&mut graph, &identity, &mut raw, s1, &occ1, &occ2);
            }
        }
        stack.extend(children);
    }

    let patterns: Vec<(Fingerprint, RawPattern)> = if options.combine {
        merge_patterns(raw.into_iter().collect())
    } else {
        raw.into_iter().collect()
    };

    // Drop patterns with no evidence of size-dependent duplication.
    let mut surviving: Vec<(Fingerprint, RawPattern)> = patterns
        .into_iter()
        .filter(|(_, pattern)| {
            if options.include_trivial || sizes.len() <= 1 {
                return true;
            }
            let freqs = pattern_frequencies(&pattern.root_types, type_freqs, sizes.len());
            freqs.iter().any(|&f| f != freqs[0])
        })
        .collect();
    surviving.sort_by(|a, b| a.1.size.cmp(&b.1.size).then_with(|| a.0.cmp(&b.0)));

    let freq_vectors: Vec<Vec<u64>> = surviving
        .iter()
        .map(|(_, p)| pattern_frequencies(&p.root_types, type_freqs, sizes.len()))
        .collect();

    let mut microstructures: Vec<Microstructure> = surviving
        .into_iter()
        .enumerate()
        .map(|(i, (hash, pattern))| Microstructure {
            name: format!("microstructure_{i}"),
            hash,
            root_types: pattern.root_types,
            size: pattern.size,
            occurrences: pattern.occurrences,
            frequencies: sizes.iter().copied().zip(freq_vectors[i].iter().copied()).collect(),
            correlations: BTreeMap::new(),
            simple: true,
        })
        .collect();

    for i in 0..microstructures.len() {
        for j in 0..microstructures.len() {
            if i == j {
                continue;
            }
            let name = microstructures[j].name.clone();
            let r = pearson(&freq_vectors[i], &freq_vectors[j]);
            microstructures[i].correlations.insert(name, r);
        }
    }

    mark_simple(&mut microstructures, &graph);

    debug!(
        base = graph.name(),
        patterns = microstructures.len(),
        "Detection on base graph complete"
    );
    BaseEntry {
        name: graph.name().to_string(),
        node_count: graph.node_count(),
        graph_file: format!("base_graph_{anchor_index}.json"),
        microstructures,
        graph,
    }
}

fn identity_map(graph: &TaskGraph) -> HashMap<NodeIndex, Fingerprint> {
    graph
        .node_indices()
        .filter_map(|idx| {
            graph
                .node(idx)
                .identity_hash
                .clone()
                .map(|hash| (idx, hash))
        })
        .collect()
}

/// Walk two hash-equal sibling subtrees in lockstep and return the node
/// sets visited on each side.
///
/// Implemented as an explicit worklist of node pairs with a visited set
/// keyed by the pair, so deep workflows cannot overflow the stack and
/// malformed input cannot loop. At each step both sides' children are
/// sorted by `(identity_hash, id)`, the total order resolving ties among
/// equal hashes, and paired positionally; a branch ends when
/// the two frontier nodes coincide (shared descendant reached) or when no
/// same-hash child pair remains.
fn align_subtrees(
    graph: &TaskGraph,
    identity: &HashMap<NodeIndex, Fingerprint>,
    s1: NodeIndex,
    s2: NodeIndex,
) -> (BTreeSet<NodeIndex>, BTreeSet<NodeIndex>) {
    let mut occ1 = BTreeSet::new();
    let mut occ2 = BTreeSet::new();
    let mut seen: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    let mut stack = vec![(s1, s2)];

    while let Some((a, b)) = stack.pop() {
        if a == b || !seen.insert((a, b)) {
            continue;
        }
        occ1.insert(a);
        occ2.insert(b);

        let children_a = sorted_children(graph, identity, a);
        let children_b = sorted_children(graph, identity, b);
        for (ca, cb) in children_a.into_iter().zip(children_b) {
            if identity[&ca] == identity[&cb] {
                stack.push((ca, cb));
            }
        }
    }
    (occ1, occ2)
}

fn sorted_children(
    graph: &TaskGraph,
    identity: &HashMap<NodeIndex, Fingerprint>,
    node: NodeIndex,
) -> Vec<NodeIndex> {
    let mut children = graph.successors(node);
    children.sort_by(|x, y| {
        identity[x]
            .cmp(&identity[y])
            .then_with(|| graph.node(*x).id.cmp(&graph.node(*y).id))
    });
    children
}

/// Record an aligned pair as two occurrences of one pattern, keeping each
/// pattern's occurrence list pairwise disjoint, and mark membership on the
/// base graph nodes.
fn record_pair(
    graph: &mut TaskGraph,
    identity: &HashMap<NodeIndex, Fingerprint>,
    raw: &mut BTreeMap<Fingerprint, RawPattern>,
    root: NodeIndex,
    occ1: &BTreeSet<NodeIndex>,
    occ2: &BTreeSet<NodeIndex>,
) {
    if occ1.is_empty() {
        return;
    }
    let hash = combine_hashes(occ1.iter().map(|idx| &identity[idx]));
    // Both sibling roots share a type, so either names the pattern.
    let root_type = graph.node(root).task_type.clone();

    let pattern = raw.entry(hash.clone()).or_insert_with(|| RawPattern {
        size: occ1.len(),
        root_types: BTreeSet::new(),
        occurrences: Vec::new(),
    });
    pattern.root_types.insert(root_type);

    for occ in [occ1, occ2] {
        let ids: BTreeSet<TaskId> = occ.iter().map(|&idx| graph.node(idx).id.clone()).collect();
        let disjoint = pattern
            .occurrences
            .iter()
            .all(|existing| existing.intersection(&ids).next().is_none());
        if disjoint {
            pattern.occurrences.push(ids);
        }
    }

    for &idx in occ1.iter().chain(occ2) {
        graph.node_mut(idx).microstructures.insert(hash.clone());
    }
}

/// True when the two sets have at least one element in common but neither
/// contains the other.
fn partial_overlap<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> bool {
    let inter: BTreeSet<&T> = a.intersection(b).collect();
    !inter.is_empty() && inter.len() != a.len() && inter.len() != b.len()
}

/// Unify patterns whose occurrence node sets partially intersect across the
/// family: such patterns are facets of one larger repeating substructure.
/// The composite's occurrences are the unions of all mutually-intersecting
/// combinations of the parts' occurrences.
fn merge_patterns(
    patterns: Vec<(Fingerprint, RawPattern)>,
) -> Vec<(Fingerprint, RawPattern)> {
    let mut merged: Vec<(Fingerprint, RawPattern)> = Vec::new();

    for (hash, pattern) in patterns {
        let flat: BTreeSet<TaskId> = pattern.occurrences.iter().flatten().cloned().collect();
        let overlapping: Vec<usize> = merged
            .iter()
            .enumerate()
            .filter(|(_, (_, other))| {
                let other_flat: BTreeSet<TaskId> =
                    other.occurrences.iter().flatten().cloned().collect();
                partial_overlap(&flat, &other_flat)
            })
            .map(|(i, _)| i)
            .collect();

        if overlapping.is_empty() {
            merged.push((hash, pattern));
            continue;
        }

        // Cartesian product over this pattern's occurrences and every
        // overlapping pattern's occurrences; keep combinations where all
        // parts mutually intersect.
        let mut lists: Vec<&Vec<BTreeSet<TaskId>>> = vec![&pattern.occurrences];
        for &i in &overlapping {
            lists.push(&merged[i].1.occurrences);
        }
        let mut unions: Vec<BTreeSet<TaskId>> = Vec::new();
        for combo in cartesian(&lists) {
            let mutually_intersecting = combo.iter().enumerate().all(|(i, a)| {
                combo[i + 1..]
                    .iter()
                    .all(|b| a.intersection(b).next().is_some())
            });
            if mutually_intersecting {
                let union: BTreeSet<TaskId> = combo.iter().flat_map(|s| s.iter().cloned()).collect();
                if !unions.contains(&union) {
                    unions.push(union);
                }
            }
        }

        if unions.is_empty() {
            // Overlap detected but no combination is mutually intersecting;
            // keep the pattern separate rather than inventing an empty composite.
            merged.push((hash, pattern));
            continue;
        }

        let mut hashes: Vec<&Fingerprint> = vec![&hash];
        let mut root_types = pattern.root_types.clone();
        for &i in &overlapping {
            hashes.push(&merged[i].0);
            root_types.extend(merged[i].1.root_types.iter().cloned());
        }
        let composite_hash = combine_hashes(hashes.iter().copied());
        let composite = RawPattern {
            size: unions[0].len(),
            root_types,
            occurrences: unions,
        };

        for &i in overlapping.iter().rev() {
            merged.remove(i);
        }
        merged.push((composite_hash, composite));
    }

    merged
}

/// All combinations picking one element from each list.
fn cartesian<'a>(lists: &[&'a Vec<BTreeSet<TaskId>>]) -> Vec<Vec<&'a BTreeSet<TaskId>>> {
    let mut combos: Vec<Vec<&BTreeSet<TaskId>>> = vec![Vec::new()];
    for list in lists {
        let mut next = Vec::with_capacity(combos.len() * list.len());
        for combo in &combos {
            for item in list.iter() {
                let mut extended = combo.clone();
                extended.push(item);
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

/// Pearson correlation of two equally sized count vectors. Degenerate
/// (constant) vectors correlate as 0 so the catalogue stays JSON-clean.
#[allow(clippy::cast_precision_loss)]
fn pearson(a: &[u64], b: &[u64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<u64>() as f64 / n;
    let mean_b = b.iter().sum::<u64>() as f64 / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// A pattern is simple iff the identity-hash set of its first occurrence
/// does not partially intersect any other surviving pattern's; only simple
/// patterns are eligible for duplication unless the caller opts into
/// complex mode.
fn mark_simple(microstructures: &mut [Microstructure], graph: &TaskGraph) {
    let hash_sets: Vec<BTreeSet<Fingerprint>> = microstructures
        .iter()
        .map(|ms| {
            ms.occurrences.first().map_or_else(BTreeSet::new, |occ| {
                occ.iter()
                    .filter_map(|id| graph.index_of(id))
                    .filter_map(|idx| graph.node(idx).identity_hash.clone())
                    .collect()
            })
        })
        .collect();

    for (i, ms) in microstructures.iter_mut().enumerate() {
        ms.simple = hash_sets
            .iter()
            .enumerate()
            .all(|(j, other)| i == j || !partial_overlap(&hash_sets[i], other));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
