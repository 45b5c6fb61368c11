//! Session supervisor: owns the ingest server and transcoder processes and
//! moves them through `Stopped → Starting → Running → Stopping → Stopped`.
//!
//! `start` and `stop` are serialized through one async mutex and each runs on
//! its own task, so a caller dropping its future cannot leave a half-started
//! or half-stopped session behind.

mod command;
mod process;
mod session;
mod state;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::{
    config::{SupervisorConfig, process_stem, resolve_executable},
    error::AppError,
    layout::RelayLayout,
    render::{RelayTemplate, RelayTemplateFields, render, write_config},
    stream::{SanitizedConfig, StreamConfig},
};

pub use command::{ingest_args, ingest_stop_args, transcode_args};
pub use session::{ProcessExit, SessionInfo};
pub use state::SessionState;

use process::ManagedProcess;
use session::ServiceSession;

const INGEST_ROLE: &str = "ingest";
const TRANSCODER_ROLE: &str = "transcoder";

#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

struct Shared {
    config: Arc<SupervisorConfig>,
    layout: RelayLayout,
    session: Mutex<Option<ServiceSession>>,
    state_tx: watch::Sender<SessionState>,
}

impl Supervisor {
    pub async fn new(config: SupervisorConfig) -> Result<Self, AppError> {
        let layout = RelayLayout::initialize(&config.root_dir).await?;
        let (state_tx, _) = watch::channel(SessionState::Stopped);

        tracing::debug!(
            root = %layout.root_dir().display(),
            ingest = %config.ingest_binary.display(),
            transcoder = %config.transcoder_binary.display(),
            "supervisor initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config: Arc::new(config),
                layout,
                session: Mutex::new(None),
                state_tx,
            }),
        })
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.shared.config
    }

    pub fn layout(&self) -> &RelayLayout {
        &self.shared.layout
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Starts a session for `config`, replacing any active one. Either both
    /// processes are confirmed alive and the state is `Running`, or nothing
    /// is left running and the state is `Stopped`.
    pub async fn start(&self, config: &StreamConfig) -> Result<SessionInfo, AppError> {
        let shared = Arc::clone(&self.shared);
        let config = config.clone();
        tokio::spawn(async move { shared.start(config).await })
            .await
            .map_err(|err| AppError::launch(format!("start task failed: {err}")))?
    }

    /// Stops the active session. A no-op when nothing is running; individual
    /// failures are logged and never surfaced.
    pub async fn stop(&self) {
        let shared = Arc::clone(&self.shared);
        if let Err(err) = tokio::spawn(async move { shared.stop().await }).await {
            tracing::error!(?err, "stop task failed");
        }
    }

    pub async fn snapshot(&self) -> Option<SessionInfo> {
        self.shared.session.lock().await.as_ref().map(ServiceSession::info)
    }

    /// Polls the tracked processes. If one has exited the remaining ones are
    /// torn down and the exit is returned.
    pub async fn check_health(&self) -> Option<ProcessExit> {
        let shared = Arc::clone(&self.shared);
        match tokio::spawn(async move { shared.check_health().await }).await {
            Ok(exit) => exit,
            Err(err) => {
                tracing::error!(?err, "health check task failed");
                None
            }
        }
    }
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::info!(from = %previous, to = %state, "session state changed");
        }
    }

    async fn start(&self, config: StreamConfig) -> Result<SessionInfo, AppError> {
        let mut guard = self.session.lock().await;

        if let Some(active) = guard.take() {
            tracing::info!(session = %active.id, "replacing active session");
            self.set_state(SessionState::Stopping);
            self.teardown(active).await;
        }

        self.set_state(SessionState::Starting);
        match self.launch(&config).await {
            Ok(session) => {
                let info = session.info();
                tracing::info!(
                    session = %info.id,
                    ingest_pid = ?info.ingest_pid,
                    transcoder_pids = ?info.transcoder_pids,
                    targets = ?info.targets,
                    "session running"
                );
                *guard = Some(session);
                self.set_state(SessionState::Running);
                Ok(info)
            }
            Err(err) => {
                tracing::error!(code = err.code(), error = %err, "session start failed");
                self.set_state(SessionState::Stopped);
                Err(err)
            }
        }
    }

    async fn launch(&self, config: &StreamConfig) -> Result<ServiceSession, AppError> {
        let sanitized = config.sanitize()?;

        let config_path = self.layout.rendered_config_path();
        let template =
            RelayTemplate::resolve(self.config.template_path.as_deref(), &self.layout).await?;
        let rendered = render(&RelayTemplateFields::new(&sanitized, &self.layout), &template);
        write_config(&config_path, &rendered).await?;

        self.layout.clear_stale_pid().await;

        let ingest_binary = require_executable(&self.config.ingest_binary)?;
        let transcoder_binary = require_executable(&self.config.transcoder_binary)?;
        let working_dir = self.layout.root_dir();

        let mut ingest = process::spawn(
            INGEST_ROLE,
            &ingest_binary,
            ingest_args(&working_dir, &config_path),
            &working_dir,
        )
        .await?;

        tokio::time::sleep(self.config.startup_grace).await;
        if let Err(err) = ingest.ensure_alive() {
            self.rollback(None, ingest, &config_path).await;
            return Err(err);
        }

        let transcoder = process::spawn(
            TRANSCODER_ROLE,
            &transcoder_binary,
            transcode_args(&sanitized),
            &working_dir,
        )
        .await;
        let mut transcoder = match transcoder {
            Ok(transcoder) => transcoder,
            Err(err) => {
                self.rollback(None, ingest, &config_path).await;
                return Err(err);
            }
        };

        tokio::time::sleep(self.config.startup_grace).await;
        if let Err(err) = transcoder
            .ensure_alive()
            .and_then(|()| ingest.ensure_alive())
        {
            self.rollback(Some(transcoder), ingest, &config_path).await;
            return Err(err);
        }

        Ok(ServiceSession {
            id: Uuid::new_v4(),
            started_at: SystemTime::now(),
            ingest,
            transcoders: vec![transcoder],
            targets: target_labels(&sanitized),
            config_path,
        })
    }

    /// Undoes a partial start with the same shutdown path a running session
    /// gets, so children of the ingest server do not outlive the failure.
    async fn rollback(
        &self,
        transcoder: Option<ManagedProcess>,
        mut ingest: ManagedProcess,
        config_path: &Path,
    ) {
        tracing::warn!("rolling back partial start");
        if let Some(mut transcoder) = transcoder {
            process::terminate_gracefully(&mut transcoder, self.config.stop_timeout).await;
        }
        self.shutdown_ingest(&mut ingest, config_path).await;
        self.sweep(&ingest.binary).await;
        self.layout.clear_stale_pid().await;
    }

    async fn stop(&self) {
        let mut guard = self.session.lock().await;
        let Some(active) = guard.take() else {
            tracing::debug!("stop requested with no active session");
            return;
        };

        self.set_state(SessionState::Stopping);
        self.teardown(active).await;
        self.set_state(SessionState::Stopped);
    }

    async fn check_health(&self) -> Option<ProcessExit> {
        let mut guard = self.session.lock().await;
        let exit = guard.as_mut()?.first_exit()?;
        let active = guard.take()?;

        tracing::error!(
            session = %active.id,
            role = exit.role,
            pid = ?exit.pid,
            status = %exit.status,
            "managed process exited unexpectedly, stopping session"
        );

        self.set_state(SessionState::Stopping);
        self.teardown(active).await;
        self.set_state(SessionState::Stopped);
        Some(exit)
    }

    async fn teardown(&self, session: ServiceSession) {
        let ServiceSession {
            id,
            mut ingest,
            transcoders,
            config_path,
            ..
        } = session;
        let stop_timeout = self.config.stop_timeout;

        for mut transcoder in transcoders {
            process::terminate_gracefully(&mut transcoder, stop_timeout).await;
        }

        self.shutdown_ingest(&mut ingest, &config_path).await;
        self.sweep(&ingest.binary).await;

        self.layout.clear_stale_pid().await;
        tracing::info!(session = %id, "session torn down");
    }

    /// Graceful stop command, bounded wait, then kill.
    async fn shutdown_ingest(&self, ingest: &mut ManagedProcess, config_path: &Path) {
        if let Some(status) = ingest.exited() {
            tracing::debug!(%status, "ingest server already exited");
            return;
        }

        let stop_timeout = self.config.stop_timeout;
        let result = process::stop_ingest(
            &ingest.binary,
            &self.layout.root_dir(),
            config_path,
            stop_timeout,
        )
        .await;

        match result {
            Ok(()) => {
                if !process::wait_for_exit(ingest, stop_timeout).await {
                    tracing::warn!(pid = ?ingest.pid, "ingest server still running after stop command");
                    process::force_kill(ingest).await;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "ingest stop command failed, killing");
                process::force_kill(ingest).await;
            }
        }
    }

    async fn sweep(&self, ingest_binary: &Path) {
        if !self.config.sweep_orphans {
            return;
        }
        let stems = [
            process_stem(ingest_binary),
            process_stem(&self.config.transcoder_binary),
        ];
        let killed = process::sweep_orphans(stems.into_iter().flatten().collect()).await;
        if killed > 0 {
            tracing::warn!(killed, "swept lingering processes");
        }
    }
}

fn require_executable(binary: &Path) -> Result<PathBuf, AppError> {
    resolve_executable(binary)
        .ok_or_else(|| AppError::dependency(format!("{} not found", binary.display())))
}

fn target_labels(config: &SanitizedConfig) -> Vec<String> {
    config.targets.iter().map(|t| t.label.clone()).collect()
}
