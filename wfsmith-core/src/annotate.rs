// Fingerprinting annotator: two constrained breadth-first passes over a
// DAG assigning every node a topological level plus top-down, bottom-up,
// and combined identity hashes.
//
// Each pass is a topological sort, not a naive BFS: a node is enqueued only
// once every neighbor in the traversal direction has already been
// processed. If a pass terminates with unvisited nodes the graph has a
// cycle and annotation fails before any hash is written back.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::stable_graph::NodeIndex;
use tracing::debug;

use crate::error::AnnotateError;
use crate::graph::TaskGraph;
use crate::hash::{Fingerprint, combine_hashes, type_hash};

/// Assign `level`, `top_down_hash`, `bottom_up_hash`, and `identity_hash`
/// to every node of `graph`.
///
/// Two nodes receive equal identity hashes iff their recursive ancestor and
/// descendant neighborhoods are structurally identical by task type. This is
/// the structural-equivalence relation the detector and synthesis engine
/// rely on; it is not a full isomorphism test.
pub fn annotate(graph: &mut TaskGraph) -> Result<(), AnnotateError> {
    let total = graph.node_count();

    // Forward pass: roots at level 1, hash over predecessor hashes.
    let mut top_down: HashMap<NodeIndex, Fingerprint> = HashMap::new();
    let mut levels: HashMap<NodeIndex, u32> = HashMap::new();
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut queue: VecDeque<(NodeIndex, u32)> = graph
        .node_indices()
        .filter(|&idx| graph.in_degree(idx) == 0)
        .map(|idx| (idx, 1))
        .collect();

    while let Some((cur, level)) = queue.pop_front() {
        if !visited.insert(cur) {
            continue;
        }
        levels.insert(cur, level);
        let preds = graph.predecessors(cur);
        // Every predecessor was processed before cur became eligible.
        let hash = type_hash(&graph.node(cur).task_type, preds.iter().map(|p| &top_down[p]));
        top_down.insert(cur, hash);

        for child in graph.successors(cur) {
            let ready = !visited.contains(&child)
                && graph.predecessors(child).iter().all(|p| visited.contains(p));
            if ready {
                queue.push_back((child, level + 1));
            }
        }
    }

    if visited.len() != total {
        return Err(AnnotateError::CyclicGraph {
            unvisited: total - visited.len(),
        });
    }

    // Backward pass: symmetric, seeded from the sinks.
    let mut bottom_up: HashMap<NodeIndex, Fingerprint> = HashMap::new();
    visited.clear();
    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|&idx| graph.out_degree(idx) == 0)
        .collect();

    while let Some(cur) = queue.pop_front() {
        if !visited.insert(cur) {
            continue;
        }
        let succs = graph.successors(cur);
        let hash = type_hash(&graph.node(cur).task_type, succs.iter().map(|s| &bottom_up[s]));
        bottom_up.insert(cur, hash);

        for parent in graph.predecessors(cur) {
            let ready = !visited.contains(&parent)
                && graph.successors(parent).iter().all(|s| visited.contains(s));
            if ready {
                queue.push_back(parent);
            }
        }
    }

    if visited.len() != total {
        return Err(AnnotateError::CyclicGraph {
            unvisited: total - visited.len(),
        });
    }

    // Both passes completed; write the annotations back.
    let indices: Vec<NodeIndex> = graph.node_indices().collect();
    for idx in indices {
        let td = top_down[&idx].clone();
        let bu = bottom_up[&idx].clone();
        let identity = combine_hashes([&td, &bu]);
        let node = graph.node_mut(idx);
        node.level = levels[&idx];
        node.top_down_hash = Some(td);
        node.bottom_up_hash = Some(bu);
        node.identity_hash = Some(identity);
    }

    debug!(
        name = graph.name(),
        nodes = total,
        "Annotated graph with structural fingerprints"
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{TaskId, TaskNode};

    fn identity(g: &TaskGraph, id: &str) -> Fingerprint {
        let idx = g.index_of(&TaskId::new(id)).unwrap();
        g.node(idx).identity_hash.clone().unwrap()
    }

    /// SRC → A → B1 → DST, A → B2 → DST with B1/B2 the same type.
    fn two_branch() -> TaskGraph {
        let mut g = TaskGraph::new("two_branch");
        let a = g.add_task(TaskNode::new("a_ID1", "a"));
        let b1 = g.add_task(TaskNode::new("b_ID1", "b"));
        let b2 = g.add_task(TaskNode::new("b_ID2", "b"));
        g.add_edge(a, b1);
        g.add_edge(a, b2);
        g.connect_sentinels();
        g
    }

    #[test]
    fn identical_branches_share_identity_hash() {
        let mut g = two_branch();
        annotate(&mut g).unwrap();
        assert_eq!(identity(&g, "b_ID1"), identity(&g, "b_ID2"));
        assert_ne!(identity(&g, "a_ID1"), identity(&g, "b_ID1"));
    }

    #[test]
    fn annotation_is_deterministic() {
        let mut g1 = two_branch();
        annotate(&mut g1).unwrap();
        let mut g2 = two_branch();
        annotate(&mut g2).unwrap();
        for id in ["SRC", "DST", "a_ID1", "b_ID1", "b_ID2"] {
            assert_eq!(identity(&g1, id), identity(&g2, id), "hash mismatch for {id}");
        }
    }

    #[test]
    fn insertion_order_does_not_affect_hashes() {
        let mut g = TaskGraph::new("reordered");
        let b2 = g.add_task(TaskNode::new("b_ID2", "b"));
        let b1 = g.add_task(TaskNode::new("b_ID1", "b"));
        let a = g.add_task(TaskNode::new("a_ID1", "a"));
        g.add_edge(a, b2);
        g.add_edge(a, b1);
        g.connect_sentinels();
        annotate(&mut g).unwrap();

        let mut reference = two_branch();
        annotate(&mut reference).unwrap();
        assert_eq!(identity(&g, "b_ID1"), identity(&reference, "b_ID1"));
        assert_eq!(identity(&g, "a_ID1"), identity(&reference, "a_ID1"));
    }

    #[test]
    fn levels_follow_topological_depth() {
        let mut g = TaskGraph::new("chain");
        let a = g.add_task(TaskNode::new("a_ID1", "a"));
        let b = g.add_task(TaskNode::new("b_ID1", "b"));
        g.add_edge(a, b);
        g.connect_sentinels();
        annotate(&mut g).unwrap();

        let level = |id: &str| g.node(g.index_of(&TaskId::new(id)).unwrap()).level;
        assert_eq!(level("SRC"), 1);
        assert_eq!(level("a_ID1"), 2);
        assert_eq!(level("b_ID1"), 3);
        assert_eq!(level("DST"), 4);
    }

    #[test]
    fn deep_identical_subtrees_match_recursively() {
        // Two identical 2-level branches under one root: the branch roots
        // and their children must pairwise agree on identity hashes.
        let mut g = TaskGraph::new("deep");
        let root = g.add_task(TaskNode::new("root_ID1", "root"));
        for branch in 1..=2 {
            let mid = g.add_task(TaskNode::new(format!("mid_ID{branch}"), "mid"));
            g.add_edge(root, mid);
            for leaf in 1..=2 {
                let l = g.add_task(TaskNode::new(format!("leaf_ID{branch}{leaf}"), "leaf"));
                g.add_edge(mid, l);
            }
        }
        g.connect_sentinels();
        annotate(&mut g).unwrap();

        assert_eq!(identity(&g, "mid_ID1"), identity(&g, "mid_ID2"));
        assert_eq!(identity(&g, "leaf_ID11"), identity(&g, "leaf_ID21"));
        assert_eq!(identity(&g, "leaf_ID11"), identity(&g, "leaf_ID12"));
    }

    #[test]
    fn different_descendants_break_equivalence() {
        // b1 leads to an extra stage, b2 ends immediately: different
        // bottom-up structure, so the identity hashes differ.
        let mut g = TaskGraph::new("asym");
        let a = g.add_task(TaskNode::new("a_ID1", "a"));
        let b1 = g.add_task(TaskNode::new("b_ID1", "b"));
        let b2 = g.add_task(TaskNode::new("b_ID2", "b"));
        let c = g.add_task(TaskNode::new("c_ID1", "c"));
        g.add_edge(a, b1);
        g.add_edge(a, b2);
        g.add_edge(b1, c);
        g.connect_sentinels();
        annotate(&mut g).unwrap();
        assert_ne!(identity(&g, "b_ID1"), identity(&g, "b_ID2"));
    }

    #[test]
    fn cyclic_graph_is_rejected() {
        let mut g = TaskGraph::new("cyclic");
        let a = g.add_task(TaskNode::new("a_ID1", "a"));
        let b = g.add_task(TaskNode::new("b_ID1", "b"));
        g.add_edge(a, b);
        g.add_edge(b, a);
        let err = annotate(&mut g).unwrap_err();
        assert!(matches!(err, AnnotateError::CyclicGraph { unvisited: 2 }));
    }

    #[test]
    fn sentinel_only_graph_annotates() {
        let mut g = TaskGraph::new("empty");
        annotate(&mut g).unwrap();
        assert!(g.is_annotated());
    }

    #[test]
    fn rerunning_annotation_is_idempotent() {
        let mut g = two_branch();
        annotate(&mut g).unwrap();
        let first = identity(&g, "b_ID1");
        annotate(&mut g).unwrap();
        assert_eq!(identity(&g, "b_ID1"), first);
    }
}
