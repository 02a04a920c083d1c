// Persisted analysis output: the microstructure catalogue plus the
// annotated base graphs it was recorded against.
//
// On disk a catalogue is a directory containing `catalog.json` (records
// with stable field names) and one `base_graph_<n>.json` per anchor, each
// an exactly-reloadable annotated [`TaskGraph`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;
use crate::graph::{TaskGraph, TaskId};
use crate::hash::Fingerprint;

/// File name of the catalogue index inside a catalogue directory.
pub const CATALOG_FILE: &str = "catalog.json";

/// A recurring structural pattern and everything the synthesis engine
/// needs to clone it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Microstructure {
    /// Stable display name (`microstructure_<i>` in size order).
    pub name: String,
    /// Order-independent combination of the member identity hashes.
    pub hash: Fingerprint,
    /// Task types of the sibling roots the pattern was discovered under.
    pub root_types: BTreeSet<String>,
    /// Node count of one occurrence.
    pub size: usize,
    /// Concrete node subsets realizing the pattern in the base graph;
    /// pairwise disjoint.
    pub occurrences: Vec<BTreeSet<TaskId>>,
    /// Per real-trace size, how many occurrences were observed.
    #[serde(rename = "frequency_by_graph_size")]
    pub frequencies: Vec<(usize, u64)>,
    /// Pearson correlation against every other surviving pattern's
    /// frequency vector, keyed by pattern name.
    pub correlations: BTreeMap<String, f64>,
    /// True iff the pattern's type-hash set does not partially overlap any
    /// other surviving pattern's (no ambiguous nesting).
    pub simple: bool,
}

/// One interpolation anchor: a base graph and its detected patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseEntry {
    /// Trace name of the base graph.
    pub name: String,
    /// Node count of the base graph, sentinels included.
    pub node_count: usize,
    /// File holding the annotated base graph, relative to the catalogue
    /// directory.
    pub graph_file: String,
    pub microstructures: Vec<Microstructure>,
    /// The annotated base graph itself; persisted separately.
    #[serde(skip)]
    pub graph: TaskGraph,
}

/// Catalogue of base graphs for one workflow family.
///
/// Multiple base graphs (the smallest real traces, increasing in size) may
/// coexist to give the synthesis engine several interpolation anchors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Workflow family name.
    pub workflow: String,
    /// Node counts of every analyzed real trace, ascending.
    pub sizes: Vec<usize>,
    /// Anchors in ascending node-count order.
    pub bases: Vec<BaseEntry>,
}

impl Catalog {
    /// The smallest available base graph, the default synthesis anchor.
    pub fn smallest_base(&self) -> Option<&BaseEntry> {
        self.bases.iter().min_by_key(|b| b.node_count)
    }

    /// Resolve a base by name, falling back to the smallest.
    pub fn base(&self, name: Option<&str>) -> Result<&BaseEntry, CatalogError> {
        match name {
            Some(n) => self
                .bases
                .iter()
                .find(|b| b.name == n)
                .ok_or_else(|| CatalogError::BaseNotFound(n.to_string())),
            None => self
                .smallest_base()
                .ok_or_else(|| CatalogError::BaseNotFound("<empty catalogue>".to_string())),
        }
    }

    /// Write the catalogue directory: `catalog.json` plus one graph file
    /// per base.
    pub fn save(&self, dir: &Path) -> Result<(), CatalogError> {
        std::fs::create_dir_all(dir)?;
        let index = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CATALOG_FILE), index)?;
        for base in &self.bases {
            let graph_json = serde_json::to_string_pretty(&base.graph)?;
            std::fs::write(dir.join(&base.graph_file), graph_json)?;
        }
        info!(
            dir = %dir.display(),
            bases = self.bases.len(),
            "Saved catalogue"
        );
        Ok(())
    }

    /// Reload a catalogue directory, including every base graph, without
    /// re-running annotation.
    pub fn load(dir: &Path) -> Result<Self, CatalogError> {
        let index = std::fs::read_to_string(dir.join(CATALOG_FILE))?;
        let mut catalog: Self = serde_json::from_str(&index)?;
        for base in &mut catalog.bases {
            let graph_json = std::fs::read_to_string(dir.join(&base.graph_file))?;
            base.graph = serde_json::from_str(&graph_json)?;
        }
        Ok(catalog)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
