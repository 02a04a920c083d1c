//! Shared fixtures for wfsmith integration tests: synthetic workflow-trace
//! families written as WfCommons-style JSON files.

use std::io;
use std::path::Path;

use serde_json::json;

/// A fan-shaped trace: `prepare` fans out to `width` parallel `sample`
/// tasks which all feed one `merge`.
pub fn fan_trace(name: &str, width: usize) -> serde_json::Value {
    let mut jobs = vec![json!({"name": "prepare_ID0000", "parents": []})];
    let mut sample_names = Vec::with_capacity(width);
    for i in 1..=width {
        let sample = format!("sample_ID{i:04}");
        jobs.push(json!({"name": sample, "parents": ["prepare_ID0000"]}));
        sample_names.push(sample);
    }
    jobs.push(json!({"name": "merge_ID0000", "parents": sample_names}));
    json!({"name": name, "workflow": {"jobs": jobs}})
}

/// Write one trace file per width into `dir`, named `trace_<width>.json`.
///
/// Node counts: `width + 4` (prepare, merge, and the two sentinels come on
/// top of the samples).
pub fn write_fan_family(dir: &Path, widths: &[usize]) -> io::Result<()> {
    for &width in widths {
        let trace = fan_trace(&format!("trace_{width}"), width);
        let path = dir.join(format!("trace_{width}.json"));
        std::fs::write(path, serde_json::to_string_pretty(&trace)?)?;
    }
    Ok(())
}

/// A deeper trace: `prepare` fans out to `width` chains of
/// `align -> sort`, all merging into one `collect` task.
pub fn chain_trace(name: &str, width: usize) -> serde_json::Value {
    let mut jobs = vec![json!({"name": "prepare_ID0000", "parents": []})];
    let mut sort_names = Vec::with_capacity(width);
    for i in 1..=width {
        let align = format!("align_ID{i:04}");
        let sort = format!("sort_ID{i:04}");
        jobs.push(json!({"name": align, "parents": ["prepare_ID0000"]}));
        jobs.push(json!({"name": sort, "parents": [align]}));
        sort_names.push(sort);
    }
    jobs.push(json!({"name": "collect_ID0000", "parents": sort_names}));
    json!({"name": name, "workflow": {"jobs": jobs}})
}

/// Write one chain trace file per width into `dir`.
///
/// Node counts: `2 * width + 4`.
pub fn write_chain_family(dir: &Path, widths: &[usize]) -> io::Result<()> {
    for &width in widths {
        let trace = chain_trace(&format!("trace_{width}"), width);
        let path = dir.join(format!("trace_{width}.json"));
        std::fs::write(path, serde_json::to_string_pretty(&trace)?)?;
    }
    Ok(())
}
