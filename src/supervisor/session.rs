use std::{path::PathBuf, time::SystemTime};

use serde::Serialize;
use uuid::Uuid;

use super::process::ManagedProcess;

/// The active pair of managed processes. Owned exclusively by the
/// supervisor; dropping it kills whatever is still running.
#[derive(Debug)]
pub(crate) struct ServiceSession {
    pub(crate) id: Uuid,
    pub(crate) started_at: SystemTime,
    pub(crate) ingest: ManagedProcess,
    pub(crate) transcoders: Vec<ManagedProcess>,
    pub(crate) targets: Vec<String>,
    pub(crate) config_path: PathBuf,
}

impl ServiceSession {
    pub(crate) fn handle_count(&self) -> usize {
        1 + self.transcoders.len()
    }

    pub(crate) fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            started_at: self.started_at,
            ingest_pid: self.ingest.pid,
            transcoder_pids: self.transcoders.iter().filter_map(|t| t.pid).collect(),
            targets: self.targets.clone(),
            handle_count: self.handle_count(),
        }
    }

    /// First tracked process found to have exited, if any.
    pub(crate) fn first_exit(&mut self) -> Option<ProcessExit> {
        std::iter::once(&mut self.ingest)
            .chain(self.transcoders.iter_mut())
            .find_map(|process| {
                process.exited().map(|status| ProcessExit {
                    role: process.role,
                    pid: process.pid,
                    status: status.to_string(),
                })
            })
    }
}

/// Read-only view of a session for callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: SystemTime,
    pub ingest_pid: Option<u32>,
    pub transcoder_pids: Vec<u32>,
    pub targets: Vec<String>,
    pub handle_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessExit {
    pub role: &'static str,
    pub pid: Option<u32>,
    pub status: String,
}
