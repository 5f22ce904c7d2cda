//! Worker isolation and run-slot configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// How a pipeline run is isolated from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    /// Dedicated OS thread with its own runtime
    Thread,
    /// Child `quanteye worker` process
    Process,
}

impl FromStr for WorkerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thread" => Ok(WorkerKind::Thread),
            "process" => Ok(WorkerKind::Process),
            _ => anyhow::bail!("Invalid QUANTEYE_WORKER: {}. Must be 'thread' or 'process'", s),
        }
    }
}

/// What a trigger does while another run holds the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentionPolicy {
    /// Answer `Busy` immediately
    #[default]
    Reject,
    /// Wait for the active run, then start
    Queue,
}

impl FromStr for ContentionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(ContentionPolicy::Reject),
            "queue" => Ok(ContentionPolicy::Queue),
            _ => anyhow::bail!(
                "Invalid QUANTEYE_CONTENTION: {}. Must be 'reject' or 'queue'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerEnvConfig {
    pub kind: WorkerKind,
    pub contention: ContentionPolicy,
    /// Process workers only; the child is killed past this
    pub timeout_secs: Option<u64>,
    /// Executable spawned by the process worker; defaults to the current one
    pub executable: Option<PathBuf>,
}

impl Default for WorkerEnvConfig {
    fn default() -> Self {
        Self {
            kind: WorkerKind::Thread,
            contention: ContentionPolicy::Reject,
            timeout_secs: None,
            executable: None,
        }
    }
}

impl WorkerEnvConfig {
    pub(crate) fn from_vars(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let kind = match var("QUANTEYE_WORKER") {
            Some(raw) => WorkerKind::from_str(&raw)?,
            None => WorkerKind::Thread,
        };
        let contention = match var("QUANTEYE_CONTENTION") {
            Some(raw) => ContentionPolicy::from_str(&raw)?,
            None => ContentionPolicy::default(),
        };
        let timeout_secs = var("QUANTEYE_WORKER_TIMEOUT_SECS")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .context("Failed to parse QUANTEYE_WORKER_TIMEOUT_SECS")?;

        Ok(Self {
            kind,
            contention,
            timeout_secs,
            executable: var("QUANTEYE_WORKER_EXE").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_defaults() {
        let config = WorkerEnvConfig::from_vars(&|_| None).unwrap();
        assert_eq!(config, WorkerEnvConfig::default());
    }

    #[test]
    fn test_worker_overrides() {
        let config = WorkerEnvConfig::from_vars(&|key| match key {
            "QUANTEYE_WORKER" => Some("Process".to_string()),
            "QUANTEYE_CONTENTION" => Some("queue".to_string()),
            "QUANTEYE_WORKER_TIMEOUT_SECS" => Some("90".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.kind, WorkerKind::Process);
        assert_eq!(config.contention, ContentionPolicy::Queue);
        assert_eq!(config.timeout_secs, Some(90));
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        let result = WorkerEnvConfig::from_vars(&|key| {
            (key == "QUANTEYE_WORKER_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
