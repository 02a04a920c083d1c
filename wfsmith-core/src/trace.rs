// Decode a raw workflow trace (WfCommons-style JSON job list) into a
// [`TaskGraph`]: one node per job, one edge per parent reference, then
// SRC/DST sentinel wiring.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::TraceError;
use crate::graph::{DST, SRC, TaskGraph, TaskNode};

/// Marker separating a job's type from its instance id in trace job names,
/// e.g. `individuals_ID0000001`.
const ID_MARKER: &str = "_ID";

#[derive(Debug, Deserialize)]
struct TraceDoc {
    name: String,
    workflow: WorkflowDoc,
}

#[derive(Debug, Deserialize)]
struct WorkflowDoc {
    jobs: Vec<JobDoc>,
}

#[derive(Debug, Deserialize)]
struct JobDoc {
    name: String,
    #[serde(default)]
    parents: Vec<String>,
}

/// Split a job name into `(type, instance id)`.
///
/// Names carrying the `_ID` marker split there; anything else is treated as
/// a whole-name type with a caller-supplied running counter.
fn split_job_name(name: &str, counter: &mut u64) -> (String, String) {
    if let Some(pos) = name.rfind(ID_MARKER) {
        let (task_type, id) = name.split_at(pos);
        let id = id[ID_MARKER.len()..].to_string();
        if !task_type.is_empty() && !id.is_empty() {
            return (task_type.to_string(), id);
        }
    }
    let id = counter.to_string();
    *counter += 1;
    (name.to_string(), id)
}

/// Decode a trace document from JSON text.
pub fn decode_trace(json: &str) -> Result<TaskGraph, TraceError> {
    let doc: TraceDoc = serde_json::from_str(json)?;
    let mut graph = TaskGraph::new(doc.name);

    let mut counter = 0u64;
    for job in &doc.workflow.jobs {
        if job.name == SRC || job.name == DST {
            return Err(TraceError::ReservedName(job.name.clone()));
        }
        if graph.index_of(&job.name.as_str().into()).is_some() {
            return Err(TraceError::DuplicateJob(job.name.clone()));
        }
        let (task_type, _instance) = split_job_name(&job.name, &mut counter);
        graph.add_task(TaskNode::new(job.name.as_str(), task_type));
    }

    for job in &doc.workflow.jobs {
        let Some(child) = graph.index_of(&job.name.as_str().into()) else {
            continue; // added above
        };
        for parent in &job.parents {
            let parent_idx = graph.index_of(&parent.as_str().into()).ok_or_else(|| {
                TraceError::UnknownParent {
                    job: job.name.clone(),
                    parent: parent.clone(),
                }
            })?;
            graph.add_edge(parent_idx, child);
        }
    }

    graph.connect_sentinels();
    debug!(
        name = graph.name(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Decoded trace"
    );
    Ok(graph)
}

/// Load and decode a trace file. The graph keeps the file stem as its name
/// so family members stay distinguishable.
pub fn load_trace(path: &Path) -> Result<TaskGraph, TraceError> {
    let json = std::fs::read_to_string(path)?;
    let mut graph = decode_trace(&json)?;
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        graph.set_name(stem);
    }
    Ok(graph)
}

// ── Tests ─────────────────────────────────────────────────────────────
