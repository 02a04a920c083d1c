// Task graph model: a DAG of typed tasks with synthetic SRC/DST sentinels.
//
// Backed by a petgraph `StableDiGraph` with a `TaskId` ↔ `NodeIndex` map so
// node identity survives arbitrary insertion order and cloning. Persisted as
// a flat node list plus an edge list, which reloads without re-annotation.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};

use crate::hash::Fingerprint;

/// Name of the synthetic single-source sentinel.
pub const SRC: &str = "SRC";
/// Name of the synthetic single-sink sentinel.
pub const DST: &str = "DST";

/// Unique identifier of a task within one graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One task in a workflow graph, with its structural annotations.
///
/// `task_type` groups tasks into classes (pipeline stage names); `id`
/// disambiguates instances within a type. Hash fields are `None` until the
/// annotator has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub top_down_hash: Option<Fingerprint>,
    #[serde(default)]
    pub bottom_up_hash: Option<Fingerprint>,
    #[serde(default)]
    pub identity_hash: Option<Fingerprint>,
    /// Hashes of the microstructures this node participates in.
    #[serde(default, rename = "microstructure_memberships")]
    pub microstructures: BTreeSet<Fingerprint>,
    /// Back-reference to the origin node, set on synthetic clones.
    #[serde(default)]
    pub duplicate_of: Option<TaskId>,
}

impl TaskNode {
    pub fn new(id: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(id),
            task_type: task_type.into(),
            level: 0,
            top_down_hash: None,
            bottom_up_hash: None,
            identity_hash: None,
            microstructures: BTreeSet::new(),
            duplicate_of: None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.task_type == SRC || self.task_type == DST
    }

    /// True once this node carries a fresh clone's origin marker.
    pub fn is_synthetic(&self) -> bool {
        self.duplicate_of.is_some()
    }
}

/// A directed acyclic workflow graph with exactly one synthetic source and
/// one synthetic sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "GraphDoc", from = "GraphDoc")]
pub struct TaskGraph {
    name: String,
    graph: StableDiGraph<TaskNode, ()>,
    ids: HashMap<TaskId, NodeIndex>,
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new("unnamed")
    }
}

impl TaskGraph {
    /// Create an empty graph containing only the `SRC` and `DST` sentinels.
    pub fn new(name: impl Into<String>) -> Self {
        let mut g = Self {
            name: name.into(),
            graph: StableDiGraph::new(),
            ids: HashMap::new(),
        };
        g.add_task(TaskNode::new(SRC, SRC));
        g.add_task(TaskNode::new(DST, DST));
        g
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Total node count, sentinels included.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Insert a task. The id must be unique within the graph.
    pub fn add_task(&mut self, node: TaskNode) -> NodeIndex {
        debug_assert!(
            !self.ids.contains_key(&node.id),
            "duplicate task id: {}",
            node.id
        );
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.ids.insert(id, idx);
        idx
    }

    /// Add a directed edge, deduplicating parallel edges.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        self.graph.update_edge(from, to, ());
    }

    pub fn index_of(&self, id: &TaskId) -> Option<NodeIndex> {
        self.ids.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &TaskNode {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut TaskNode {
        &mut self.graph[idx]
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn predecessors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(idx, Direction::Incoming).collect()
    }

    pub fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(idx, Direction::Outgoing).collect()
    }

    pub fn in_degree(&self, idx: NodeIndex) -> usize {
        self.graph.neighbors_directed(idx, Direction::Incoming).count()
    }

    pub fn out_degree(&self, idx: NodeIndex) -> usize {
        self.graph.neighbors_directed(idx, Direction::Outgoing).count()
    }

    pub fn contains_edge(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.graph.find_edge(from, to).is_some()
    }

    pub fn src_index(&self) -> NodeIndex {
        self.ids[&TaskId::new(SRC)]
    }

    pub fn dst_index(&self) -> NodeIndex {
        self.ids[&TaskId::new(DST)]
    }

    /// Connect every parentless task from `SRC` and every childless task to
    /// `DST`, guaranteeing a single source and sink with no isolated nodes.
    pub fn connect_sentinels(&mut self) {
        let src = self.src_index();
        let dst = self.dst_index();
        let indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        for idx in indices {
            if idx == src || idx == dst {
                continue;
            }
            if self.in_degree(idx) == 0 {
                self.add_edge(src, idx);
            }
            if self.out_degree(idx) == 0 {
                self.add_edge(idx, dst);
            }
        }
    }

    /// True once every node carries an identity hash.
    pub fn is_annotated(&self) -> bool {
        self.graph
            .node_indices()
            .all(|idx| self.graph[idx].identity_hash.is_some())
    }

    /// Node ids of all synthetic (cloned) nodes.
    pub fn synthetic_tasks(&self) -> BTreeSet<TaskId> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].is_synthetic())
            .map(|idx| self.graph[idx].id.clone())
            .collect()
    }

    /// Edge list by task id, sorted for stable output.
    pub fn edge_ids(&self) -> Vec<(TaskId, TaskId)> {
        let mut edges: Vec<(TaskId, TaskId)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (self.graph[a].id.clone(), self.graph[b].id.clone()))
            .collect();
        edges.sort();
        edges
    }
}

// ── Persistence representation ────────────────────────────────────────

/// Flat serialized form of a [`TaskGraph`]: node attributes plus an edge
/// list, exactly reloadable without re-running annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphDoc {
    name: String,
    nodes: Vec<TaskNode>,
    edges: Vec<(TaskId, TaskId)>,
}

impl From<TaskGraph> for GraphDoc {
    fn from(g: TaskGraph) -> Self {
        let mut nodes: Vec<TaskNode> = g
            .graph
            .node_indices()
            .map(|idx| g.graph[idx].clone())
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let edges = g.edge_ids();
        Self {
            name: g.name,
            nodes,
            edges,
        }
    }
}

impl From<GraphDoc> for TaskGraph {
    fn from(doc: GraphDoc) -> Self {
        let mut g = TaskGraph {
            name: doc.name,
            graph: StableDiGraph::new(),
            ids: HashMap::new(),
        };
        let mut has_src = false;
        let mut has_dst = false;
        for node in doc.nodes {
            has_src |= node.id.as_str() == SRC;
            has_dst |= node.id.as_str() == DST;
            g.add_task(node);
        }
        // Documents produced by wfsmith always carry the sentinels; guard
        // against hand-edited input.
        if !has_src {
            g.add_task(TaskNode::new(SRC, SRC));
        }
        if !has_dst {
            g.add_task(TaskNode::new(DST, DST));
        }
        for (from, to) in doc.edges {
            if let (Some(a), Some(b)) = (g.index_of(&from), g.index_of(&to)) {
                g.add_edge(a, b);
            }
        }
        g
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
