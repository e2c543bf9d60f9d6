//! JSON output formatting

use serde::Serialize;
use serde_json::{json, Value};
use voxsim_core::{IngestReport, QueryOutcome};

/// Ranked answer to one query
#[derive(Debug, Serialize)]
pub struct QueryOutput {
    pub query: String,
    /// `[identity, score]` pairs, best first
    pub similar_files: Vec<(String, f64)>,
}

impl QueryOutput {
    pub fn new(query: impl Into<String>, outcome: &QueryOutcome) -> Self {
        if !outcome.skipped.is_empty() {
            log::info!("{} corpus entries were skipped", outcome.skipped.len());
        }
        Self {
            query: query.into(),
            similar_files: outcome
                .hits
                .iter()
                .map(|hit| (hit.identity.clone(), hit.score))
                .collect(),
        }
    }
}

/// Summary of a corpus build
pub fn build_report(root: &str, store_format: &str, report: &IngestReport) -> Value {
    json!({
        "status": report.status(),
        "corpus": root,
        "store_format": store_format,
        "processed": report.processed,
        "failed": report.failed,
        "diagnostics": report.diagnostics,
        "elapsed_seconds": report.elapsed_seconds,
    })
}

/// Structured form of a failure, tagged with the core error kind when known
pub fn error_report(err: &anyhow::Error) -> Value {
    let kind = err
        .downcast_ref::<voxsim_core::Error>()
        .map(|e| e.kind())
        .unwrap_or("internal");
    json!({
        "error": {
            "kind": kind,
            "message": format!("{:#}", err),
        }
    })
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}
