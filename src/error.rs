use serde::Serialize;
use thiserror::Error;

/// A cluster-assignment line that does not have exactly two
/// tab-separated fields. Aborts parsing: a single bad line means the
/// input came from a different tool or column layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Malformed cluster input at line {line}: \
     expected 2 tab-separated fields, found {found}"
)]
pub struct MalformedInputError {
    pub line: usize,
    pub found: usize,
}

/// A cluster member that is absent from the genome catalog.
/// Recoverable: only the offending cluster is excluded.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error(r#"Cluster "{cluster_id}" references unknown sequence "{sequence_id}""#)]
pub struct UnknownSequenceError {
    pub cluster_id: String,
    pub sequence_id: String,
}

/// An external program that ran but exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(r#""{invocation}" failed ({}): {stderr}"#, exit_status(.code))]
pub struct ExternalToolError {
    pub invocation: String,
    pub code: Option<i32>,
    pub stderr: String,
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
