use crate::error::{Error, Result};
use crate::provision::{ProgressCallback, Provisioner};
use crate::server::classifier::{ClassifiedRecord, LogClassifier};
use crate::server::config::{ServerConfig, SERVER_PROPERTIES};
use crate::server::events::{LogEntry, ServerEvent, Severity};
use crate::server::properties::PropertiesStore;
use crate::server::state::ServerState;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Mutex};

/// Supervises one external server process: owns the lifecycle state machine,
/// spawns and stops the child, wires classifier output to state transitions
/// and to the outward event stream, and composes provisioner, resolver and
/// properties store.
///
/// One child process and one state value per instance. State is carried in a
/// watch channel; compound check-then-set transitions go through
/// `Inner::transition`, which serializes them, so the command handlers and
/// the asynchronous output-reader task never interleave half-applied
/// transitions.
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    config: Mutex<ServerConfig>,
    provisioner: Provisioner,
    state_tx: watch::Sender<ServerState>,
    events: mpsc::UnboundedSender<ServerEvent>,
    stdin: Mutex<Option<tokio::process::ChildStdin>>,
    properties: Mutex<Option<PropertiesStore>>,
}

impl ProcessSupervisor {
    /// Build a supervisor and hand back its event stream. Events are FIFO;
    /// dropping the receiver silently discards further events.
    pub fn new(
        config: ServerConfig,
        provisioner: Provisioner,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ServerState::Stopped);

        let supervisor = Self {
            inner: Arc::new(Inner {
                config: Mutex::new(config),
                provisioner,
                state_tx,
                events: events_tx,
                stdin: Mutex::new(None),
                properties: Mutex::new(None),
            }),
        };
        (supervisor, events_rx)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.inner.state_tx.borrow()
    }

    /// Watch stream of state transitions, for callers that want to await a
    /// particular state.
    pub fn state_stream(&self) -> watch::Receiver<ServerState> {
        self.inner.state_tx.subscribe()
    }

    /// Snapshot of the launch configuration (including a lazily resolved
    /// version once provisioning has run).
    pub async fn config(&self) -> ServerConfig {
        self.inner.config.lock().await.clone()
    }

    /// Ensure the artifact, spawn the server process and attach the log
    /// classifier. Legal only from `Stopped` or `Crashed`. Any failure along
    /// the way leaves the supervisor in `Crashed` and surfaces the error.
    pub async fn start(&self) -> Result<()> {
        if self
            .inner
            .transition(|s| s.can_start().then_some(ServerState::Starting))
            .is_none()
        {
            return Err(Error::IllegalState {
                operation: "start",
                state: self.state(),
            });
        }

        match self.start_inner().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.inner.transition(|_| Some(ServerState::Crashed));
                self.inner
                    .emit_message(Severity::Error, format!("Start failed: {}", err));
                Err(err)
            }
        }
    }

    async fn start_inner(&self) -> Result<()> {
        let inner = &self.inner;
        let mut config = inner.config.lock().await;

        tokio::fs::create_dir_all(&config.install_dir).await?;

        inner.emit_message(Severity::Info, "Ensuring server artifact is present");
        let events = inner.events.clone();
        let progress: ProgressCallback = Arc::new(move |path, transferred, total| {
            let _ = events.send(ServerEvent::Download {
                path: path.to_path_buf(),
                transferred,
                total,
            });
        });
        inner
            .provisioner
            .ensure_artifact(&mut config, false, &progress)
            .await?;

        let jar = inner.provisioner.artifact_path(&config);
        log::info!("Starting server process for {:?}", jar);

        let mut command = tokio::process::Command::new(&config.java_path);
        command
            .args(config.jvm_args())
            .arg("-jar")
            .arg(&jar)
            .arg("nogui")
            .current_dir(&config.install_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(Error::Spawn)?;

        let stdout = child.stdout.take().ok_or_else(|| {
            Error::Spawn(std::io::Error::other("server stdout was not captured"))
        })?;
        let stderr = child.stderr.take();
        *inner.stdin.lock().await = child.stdin.take();
        *inner.properties.lock().await = None;
        drop(config);

        inner.emit_message(Severity::Info, "Server process spawned");

        // stdout is the telemetry channel: chunks feed the classifier, records
        // drive transitions.
        let reader_inner = Arc::clone(inner);
        tokio::spawn(async move {
            let mut classifier = LogClassifier::new();
            let mut stdout = stdout;
            let mut buf = [0u8; 4096];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        for record in classifier.push_chunk(&buf[..n]) {
                            reader_inner.apply_record(record).await;
                        }
                    }
                    Err(e) => {
                        log::warn!("Server stdout read failed: {}", e);
                        break;
                    }
                }
            }
            for record in classifier.finish() {
                reader_inner.apply_record(record).await;
            }
        });

        // stderr carries JVM noise, not server records; forward it unclassified.
        if let Some(stderr) = stderr {
            let stderr_inner = Arc::clone(inner);
            tokio::spawn(async move {
                let mut lines = tokio::io::BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    stderr_inner.emit_message(Severity::Error, line);
                }
            });
        }

        // Exit monitor: a zero exit while Stopping is a clean stop, anything
        // else (non-zero, signal, or an exit the state machine did not expect)
        // is a crash.
        let monitor_inner = Arc::clone(inner);
        tokio::spawn(async move {
            let status = child.wait().await;
            *monitor_inner.stdin.lock().await = None;

            match status {
                Ok(status) => {
                    let clean = status.code() == Some(0);
                    monitor_inner.transition(|state| {
                        Some(if clean && state == ServerState::Stopping {
                            ServerState::Stopped
                        } else {
                            ServerState::Crashed
                        })
                    });
                    monitor_inner.emit_message(
                        if clean { Severity::Info } else { Severity::Error },
                        format!("Server process exited ({})", status),
                    );
                }
                Err(e) => {
                    monitor_inner.transition(|_| Some(ServerState::Crashed));
                    monitor_inner.emit_message(
                        Severity::Error,
                        format!("Failed to wait for server process: {}", e),
                    );
                }
            }
        });

        Ok(())
    }

    /// Write a command line to the server's stdin. Legal only while Running.
    /// The resulting state change (if any) is observed asynchronously through
    /// the event stream.
    pub async fn execute(&self, command: &str) -> Result<()> {
        let state = self.state();
        if !state.can_execute() {
            return Err(Error::IllegalState {
                operation: "execute",
                state,
            });
        }
        self.write_line("execute", command).await
    }

    /// Ask the server to stop by sending its `stop` command. Does not wait
    /// for the transition; watch the event stream or `state_stream()`.
    pub async fn stop(&self) -> Result<()> {
        let state = self.state();
        if !state.can_execute() {
            return Err(Error::IllegalState {
                operation: "stop",
                state,
            });
        }
        self.inner
            .emit_message(Severity::Info, "Sending stop command");
        self.write_line("stop", "stop").await
    }

    /// Convenience shutdown: a no-op when the server is already down
    /// (Stopped/Crashed), otherwise waits — on a condition, not a spin — for
    /// the state to become stoppable and issues `stop`.
    pub async fn quit(&self) -> Result<()> {
        let mut rx = self.inner.state_tx.subscribe();
        if rx.borrow_and_update().can_start() {
            return Ok(());
        }

        let state = match rx.wait_for(|s| s.can_execute() || s.can_start()).await {
            Ok(state) => *state,
            // The sender lives in Inner, so the channel can only close while
            // tearing down; nothing left to stop then.
            Err(_) => return Ok(()),
        };

        if state.can_start() {
            return Ok(());
        }
        self.stop().await
    }

    /// Rewrite `eula.txt` to the given acceptance value. Does not restart the
    /// process.
    pub async fn accept_eula(&self, accept: bool) -> Result<bool> {
        let install_dir = self.inner.config.lock().await.install_dir.clone();
        crate::server::eula::accept_eula(&install_dir, accept).await
    }

    /// Read a server property. The store is attached when the server reaches
    /// Running and loads its file on first access.
    pub async fn property(&self, name: &str) -> Result<Option<String>> {
        let mut guard = self.inner.properties.lock().await;
        match guard.as_mut() {
            Some(store) => store.get(name).await,
            None => Err(Error::IllegalState {
                operation: "property",
                state: self.state(),
            }),
        }
    }

    /// Replace existing server property values in place; unknown keys are
    /// dropped, and their names returned.
    pub async fn set_properties(&self, pairs: &[(String, String)]) -> Result<Vec<String>> {
        let mut guard = self.inner.properties.lock().await;
        match guard.as_mut() {
            Some(store) => store.set_many(pairs).await,
            None => Err(Error::IllegalState {
                operation: "set_properties",
                state: self.state(),
            }),
        }
    }

    /// Check the on-disk artifact identity against the configured version.
    pub async fn validate_version(&self) -> Result<bool> {
        let config = self.inner.config.lock().await.clone();
        self.inner.provisioner.validate_version(&config).await
    }

    async fn write_line(&self, operation: &'static str, line: &str) -> Result<()> {
        let mut guard = self.inner.stdin.lock().await;
        let stdin = guard.as_mut().ok_or_else(|| Error::IllegalState {
            operation,
            state: self.state(),
        })?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }
}

impl Inner {
    /// Apply a compound check-then-set transition atomically. Returns the new
    /// state when one was applied; emits the state event and log line.
    fn transition(
        &self,
        compute: impl FnOnce(ServerState) -> Option<ServerState>,
    ) -> Option<ServerState> {
        let mut applied = None;
        self.state_tx.send_if_modified(|state| {
            if let Some(next) = compute(*state) {
                if next != *state {
                    *state = next;
                    applied = Some(next);
                    return true;
                }
            }
            false
        });

        if let Some(next) = applied {
            log::info!("Server state: {}", next);
            let _ = self.events.send(ServerEvent::StateUpdate(next));
        }
        applied
    }

    fn emit_message(&self, severity: Severity, text: impl Into<String>) {
        let entry = LogEntry::new(severity, text);
        log::debug!("[server] {} {}", entry.severity, entry.text);
        let _ = self.events.send(ServerEvent::Message(entry));
    }

    /// Apply one classified record: forward it as a message, then act on its
    /// signals.
    async fn apply_record(self: &Arc<Self>, record: ClassifiedRecord) {
        let signals = record.signals;
        let _ = self.events.send(ServerEvent::Message(record.entry));

        if signals.ready {
            // The properties file exists once the server is up; attach the
            // store lazily, it reads the file on first access. The lock is
            // held across the transition so a caller that observes Running
            // cannot find the store missing.
            let path = self
                .config
                .lock()
                .await
                .install_dir
                .join(SERVER_PROPERTIES);
            let mut properties = self.properties.lock().await;
            let became_running = self
                .transition(|s| (s == ServerState::Starting).then_some(ServerState::Running))
                .is_some();
            if became_running {
                *properties = Some(PropertiesStore::new(path));
            }
        }

        if signals.stopping {
            self.transition(|s| {
                matches!(s, ServerState::Running | ServerState::Starting)
                    .then_some(ServerState::Stopping)
            });
        }

        if signals.eula_required {
            log::warn!("Server requires EULA acceptance before it will run");
            let _ = self.events.send(ServerEvent::Eula);
            // The process exits on its own after printing the prompt; treat
            // the attempt as winding down.
            self.transition(|s| {
                (!matches!(s, ServerState::Stopped | ServerState::Crashed))
                    .then_some(ServerState::Stopping)
            });
        }
    }
}
