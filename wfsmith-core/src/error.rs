/// Top-level wfsmith error type.
///
/// All fallible operations in `wfsmith-core` return
/// [`Result<T, WfsmithError>`](Result). Each variant wraps a phase-specific
/// error enum, allowing callers to match on the error source without losing
/// type information.
#[derive(thiserror::Error, Debug)]
pub enum WfsmithError {
    /// Error decoding a raw workflow trace into a task graph.
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    /// Error during structural fingerprinting.
    #[error("Annotation error: {0}")]
    Annotate(#[from] AnnotateError),

    /// Error during microstructure detection.
    #[error("Detection error: {0}")]
    Detect(#[from] DetectError),

    /// Error during synthetic graph growth.
    #[error("Synthesis error: {0}")]
    Synthesize(#[from] SynthesizeError),

    /// Error persisting or reloading a catalogue.
    #[error("Catalogue error: {0}")]
    Catalog(#[from] CatalogError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors decoding workflow traces.
#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    /// Trace JSON could not be parsed.
    #[error("Malformed trace: {0}")]
    Json(#[from] serde_json::Error),

    /// A job lists a parent that does not appear in the trace.
    #[error("Job '{job}' references unknown parent '{parent}'")]
    UnknownParent {
        /// Name of the job with the dangling reference.
        job: String,
        /// The missing parent name.
        parent: String,
    },

    /// Two jobs in the trace share a name; node ids must be unique.
    #[error("Duplicate job name '{0}'")]
    DuplicateJob(String),

    /// A job uses a name reserved for the sentinel nodes.
    #[error("Job name '{0}' is reserved for a sentinel node")]
    ReservedName(String),

    /// Filesystem I/O error reading a trace file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the fingerprinting annotator.
#[derive(thiserror::Error, Debug)]
pub enum AnnotateError {
    /// The graph contains a cycle; a finite topological order does not
    /// exist, so fingerprints cannot be assigned.
    #[error("Graph contains a cycle ({unvisited} nodes unreachable in topological order)")]
    CyclicGraph {
        /// Number of nodes the constrained traversal never reached.
        unvisited: usize,
    },
}

/// Errors from the microstructure detector.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    /// The detector was given no graphs to learn from.
    #[error("Empty graph family: nothing to learn from")]
    EmptyFamily,

    /// A graph in the family was not annotated before detection.
    #[error("Graph '{0}' has no fingerprints; run annotation first")]
    Unannotated(String),
}

/// Errors from the duplication / synthesis engine.
///
/// Growth works on an internal copy of the base graph, so a failed
/// synthesis never leaves a partially-grown graph visible to the caller.
#[derive(thiserror::Error, Debug)]
pub enum SynthesizeError {
    /// The engine only grows graphs.
    #[error("Cannot shrink: target {target} is below base graph size {base}")]
    ShrinkRequest {
        /// Requested node count.
        target: usize,
        /// Node count of the chosen base graph.
        base: usize,
    },

    /// No microstructure is eligible under the requested mode.
    #[error("No eligible microstructures (allow_complex = {allow_complex})")]
    NoEligiblePatterns {
        /// Whether complex patterns were permitted.
        allow_complex: bool,
    },

    /// A frequency table has no samples, so not even constant
    /// extrapolation is possible.
    #[error("Frequency table for '{pattern}' has no samples")]
    InterpolationDomain {
        /// Name of the pattern with the empty table.
        pattern: String,
    },

    /// A recorded occurrence references a node missing from the base graph.
    #[error("Occurrence node '{0}' not present in base graph")]
    MissingOccurrenceNode(String),
}

/// Errors persisting or reloading catalogues and base graphs.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested base graph is not in the catalogue.
    #[error("Base graph not found: {0}")]
    BaseNotFound(String),
}

/// Errors in wfsmith configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Convenience alias for `Result<T, WfsmithError>`.
pub type Result<T> = std::result::Result<T, WfsmithError>;
