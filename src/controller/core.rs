// Controller Thread
//
// Owns the miner session and serializes every state transition. User
// commands, environment triggers and output-stream notices all arrive as
// ControlEvents on one channel; process exit is detected by polling.

use super::session::MiningSession;
use crate::config::MinerConfig;
use crate::error::MinerError;
use crate::event::Emitter;
use crate::identity::WorkerIdentityStore;
use crate::notification::{presence_text, ForegroundPresence, PRESENCE_TITLE};
use crate::process::{spawn_miner, start_output_reader, MinerArgs, StreamKind};
use crate::staging::is_executable;
use crate::types::{ControllerState, EnvironmentSample, StartOutcome, StopOutcome};
use std::process::{Child, ExitStatus};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

pub type SharedState = Arc<Mutex<ControllerState>>;

/// Requests handled by the controller thread
#[derive(Debug)]
pub enum ControlEvent {
    Start(Sender<Result<StartOutcome, MinerError>>),
    Stop(Sender<StopOutcome>),
    EnvironmentTrigger(EnvironmentSample),
    OutputClosed { session: u64, stream: StreamKind, failed: bool },
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
enum StopReason {
    User,
    Environment(EnvironmentSample),
    Shutdown,
}

/// Cloneable client of the controller thread
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    sender: Sender<ControlEvent>,
    state: SharedState,
}

impl ControllerHandle {
    pub(crate) fn new(sender: Sender<ControlEvent>, state: SharedState) -> Self {
        Self { sender, state }
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self) -> Result<StartOutcome, MinerError> {
        let (reply, response) = channel();
        self.send(ControlEvent::Start(reply))?;
        response.recv().map_err(|_| MinerError::ControllerUnavailable)?
    }

    pub fn stop(&self) -> Result<StopOutcome, MinerError> {
        let (reply, response) = channel();
        self.send(ControlEvent::Stop(reply))?;
        response.recv().map_err(|_| MinerError::ControllerUnavailable)
    }

    /// Start when idle, stop otherwise
    pub fn toggle(&self) -> Result<ControllerState, MinerError> {
        if self.state() == ControllerState::Idle {
            self.start()?;
        } else {
            self.stop()?;
        }
        Ok(self.state())
    }

    /// Ask for an auto-pause. Ignored unless the miner is running when the
    /// controller handles it.
    pub fn environment_trigger(&self, sample: EnvironmentSample) -> Result<(), MinerError> {
        self.send(ControlEvent::EnvironmentTrigger(sample))
    }

    fn send(&self, event: ControlEvent) -> Result<(), MinerError> {
        self.sender.send(event).map_err(|_| MinerError::ControllerUnavailable)
    }
}

/// Owner of the controller thread. Dropping it stops any running miner.
pub struct MinerController {
    handle: ControllerHandle,
    thread: Option<thread::JoinHandle<()>>,
}

impl MinerController {
    pub fn start(config: MinerConfig, emitter: Emitter, presence: Arc<dyn ForegroundPresence>) -> Self {
        let (sender, receiver) = channel();
        let state: SharedState = Arc::new(Mutex::new(ControllerState::Idle));
        let handle = ControllerHandle::new(sender.clone(), state.clone());

        let supervisor = Supervisor {
            identity: WorkerIdentityStore::new(&config.data_dir, config.device_model.clone()),
            args: MinerArgs::from_config(&config),
            config,
            emitter,
            presence,
            state,
            events: sender,
            session: None,
            next_session_id: 1,
        };

        let thread = thread::spawn(move || supervisor.run(receiver));

        Self {
            handle,
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if let Some(thread) = self.thread.take() {
            if self.handle.sender.send(ControlEvent::Shutdown).is_err() {
                tracing::warn!("Controller already gone at shutdown");
            }
            if thread.join().is_err() {
                tracing::error!("Controller thread panicked");
            }
        }
    }
}

impl Drop for MinerController {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

struct Supervisor {
    config: MinerConfig,
    identity: WorkerIdentityStore,
    args: MinerArgs,
    emitter: Emitter,
    presence: Arc<dyn ForegroundPresence>,
    state: SharedState,
    events: Sender<ControlEvent>,
    session: Option<MiningSession>,
    next_session_id: u64,
}

impl Supervisor {
    fn run(mut self, receiver: Receiver<ControlEvent>) {
        tracing::info!(exe = %self.config.executable_path().display(), "Controller started");
        let poll = self.config.exit_poll_interval();
        let mut last_poll = Instant::now();

        loop {
            // A busy event stream must not postpone exit detection
            let wait = poll.saturating_sub(last_poll.elapsed());
            match receiver.recv_timeout(wait) {
                Ok(ControlEvent::Start(reply)) => {
                    let result = self.handle_start();
                    let _ = reply.send(result);
                }
                Ok(ControlEvent::Stop(reply)) => {
                    let outcome = self.handle_stop();
                    let _ = reply.send(outcome);
                }
                Ok(ControlEvent::EnvironmentTrigger(sample)) => {
                    self.handle_environment(sample);
                }
                Ok(ControlEvent::OutputClosed { session, stream, failed }) => {
                    self.handle_output_closed(session, stream, failed);
                }
                Ok(ControlEvent::Shutdown) => {
                    self.stop_session(StopReason::Shutdown);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.stop_session(StopReason::Shutdown);
                    break;
                }
            }

            if last_poll.elapsed() >= poll {
                self.check_exit();
                last_poll = Instant::now();
            }
        }

        tracing::info!("Controller shut down");
    }

    fn current_state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, new_state: ControllerState) {
        let old_state = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, new_state)
        };
        if old_state != new_state {
            tracing::info!(from = %old_state, to = %new_state, "Controller state change");
            self.emitter.state(new_state);
        }
    }

    fn handle_start(&mut self) -> Result<StartOutcome, MinerError> {
        let state = self.current_state();
        if self.session.is_some() || state != ControllerState::Idle {
            if state.is_stopping() {
                tracing::info!(%state, "Start ignored, miner is stopping");
            } else {
                tracing::info!(%state, "Start ignored, miner already active");
            }
            return Ok(StartOutcome::AlreadyRunning);
        }

        let exe = self.config.executable_path();
        if !is_executable(&exe) {
            let err = MinerError::ExecutableMissing { path: exe };
            tracing::warn!(error = %err, "Cannot start miner");
            self.emitter.line(err.user_message());
            return Err(err);
        }

        self.set_state(ControllerState::Starting);
        match self.launch(&exe) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::error!(error = %err, "Miner start failed");
                self.emitter.line(err.user_message());
                self.set_state(ControllerState::Idle);
                Err(err)
            }
        }
    }

    fn launch(&mut self, exe: &std::path::Path) -> Result<StartOutcome, MinerError> {
        let worker = self.identity.get_or_create()?;
        let args = self.args.to_args(&worker);

        self.emitter.line("Starting miner...");
        let mut child = spawn_miner(exe, &args, &self.config.data_dir)?;

        let id = self.next_session_id;
        self.next_session_id += 1;

        let readers = self.start_readers(id, &mut child);
        let session = MiningSession::new(id, worker.clone(), child, readers);
        let pid = session.pid();
        self.session = Some(session);

        self.set_state(ControllerState::Running);
        self.presence.announce(PRESENCE_TITLE, &presence_text(&worker));
        tracing::info!(pid, worker = %worker, session = id, "Miner running");

        Ok(StartOutcome::Started { pid, worker })
    }

    fn start_readers(&self, session: u64, child: &mut Child) -> Vec<thread::JoinHandle<()>> {
        let mut readers = Vec::with_capacity(2);

        if let Some(stdout) = child.stdout.take() {
            readers.push(start_output_reader(
                stdout,
                StreamKind::Stdout,
                self.emitter.clone(),
                self.close_notifier(session),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(start_output_reader(
                stderr,
                StreamKind::Stderr,
                self.emitter.clone(),
                self.close_notifier(session),
            ));
        }

        readers
    }

    fn close_notifier(&self, session: u64) -> impl FnOnce(StreamKind, Option<MinerError>) + Send + 'static {
        let events = self.events.clone();
        move |stream, error| {
            let event = ControlEvent::OutputClosed {
                session,
                stream,
                failed: error.is_some(),
            };
            if events.send(event).is_err() {
                tracing::debug!(session, stream = stream.as_str(), "Controller gone, output close not delivered");
            }
        }
    }

    fn handle_stop(&mut self) -> StopOutcome {
        if self.session.is_none() {
            tracing::info!("Stop ignored, miner not running");
            return StopOutcome::NotRunning;
        }
        self.stop_session(StopReason::User)
    }

    fn handle_environment(&mut self, sample: EnvironmentSample) {
        if self.current_state() != ControllerState::Running {
            tracing::debug!(state = %self.current_state(), %sample, "Environment trigger ignored");
            return;
        }
        tracing::warn!(
            battery = sample.battery_percent,
            temperature = sample.temperature_celsius,
            "Auto-pausing miner"
        );
        self.stop_session(StopReason::Environment(sample));
    }

    fn handle_output_closed(&mut self, session: u64, stream: StreamKind, failed: bool) {
        let current = self.session.as_ref().map(|s| s.id);
        if current != Some(session) {
            tracing::debug!(session, stream = stream.as_str(), "Output close from finished session");
            return;
        }
        if failed {
            tracing::warn!(session, stream = stream.as_str(), "Output stream failed, relying on exit polling");
        }
        self.check_exit();
    }

    fn check_exit(&mut self) {
        if self.current_state() != ControllerState::Running {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let pid = session.pid();
        match session.try_exit_status() {
            Ok(Some(status)) => self.handle_unexpected_exit(status),
            Ok(None) => {}
            Err(e) => tracing::warn!(pid, error = %e, "Failed to poll miner process"),
        }
    }

    fn handle_unexpected_exit(&mut self, status: ExitStatus) {
        if let Some(mut session) = self.session.take() {
            tracing::error!(
                pid = session.pid(),
                ?status,
                uptime_secs = session.uptime().as_secs(),
                "Miner process exited unexpectedly"
            );
            // Leader already exited: this clears its process group, reaps and
            // joins the readers
            let _ = session.finish(self.config.termination_grace());
        }

        self.set_state(ControllerState::Idle);
        self.presence.cancel();
        self.emitter.line("Miner stopped.");
        self.emitter.line(MinerError::UnexpectedExit(status).user_message());
    }

    fn stop_session(&mut self, reason: StopReason) -> StopOutcome {
        let Some(mut session) = self.session.take() else {
            return StopOutcome::NotRunning;
        };

        self.set_state(match reason {
            StopReason::Environment(_) => ControllerState::StoppingAuto,
            StopReason::User | StopReason::Shutdown => ControllerState::StoppingUser,
        });

        match session.finish(self.config.termination_grace()) {
            Ok(status) => tracing::info!(
                pid = session.pid(),
                worker = %session.worker,
                ?status,
                ?reason,
                "Miner stopped"
            ),
            Err(e) => tracing::error!(pid = session.pid(), error = %e, "Failed to stop miner cleanly"),
        }
        drop(session);

        self.set_state(ControllerState::Idle);
        self.presence.cancel();
        self.emitter.line("Miner stopped.");

        if let StopReason::Environment(sample) = reason {
            self.emitter
                .line(format!("Auto-paused: Battery low or temperature high ({}).", sample));
        }

        StopOutcome::Stopped
    }
}
