//! Execution mode of a pipeline run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How documents reach the search index for one run.
///
/// Selected once per run and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Every unit writes straight to a live index cluster.
    Direct,
    /// Documents go through the compute framework's output stage and an
    /// external shard build/merge step.
    DistributedOutput,
    /// Nothing is written anywhere.
    DryRun,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::DistributedOutput => "distributed-output",
            Self::DryRun => "dry-run",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
