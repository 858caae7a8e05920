// Event Emitter Module
//
// Presenter dispatch thread
// - Status and subprocess output lines
// - Controller state changes
// - Environment samples (battery/temperature display)
//
// Producers never block on the presenter: events go through an unbounded
// queue and a dedicated thread delivers them in arrival order.

use crate::types::{ControllerState, EnvironmentSample};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

/// Consumer of everything the user sees
pub trait StatusPresenter: Send {
    fn append_line(&mut self, line: &str);

    fn state_changed(&mut self, _state: ControllerState) {}

    fn environment_sampled(&mut self, _sample: &EnvironmentSample) {}
}

#[derive(Debug, Clone)]
pub enum PresenterEvent {
    Line(String),
    State(ControllerState),
    Sample(EnvironmentSample),
}

/// Cloneable producer side of the presenter queue
#[derive(Debug, Clone)]
pub struct Emitter {
    sender: Sender<PresenterEvent>,
}

impl Emitter {
    pub fn line(&self, line: impl Into<String>) {
        self.emit(PresenterEvent::Line(line.into()));
    }

    pub fn state(&self, state: ControllerState) {
        self.emit(PresenterEvent::State(state));
    }

    pub fn sample(&self, sample: EnvironmentSample) {
        self.emit(PresenterEvent::Sample(sample));
    }

    fn emit(&self, event: PresenterEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::warn!(event = ?e.0, "Presenter queue closed, dropping event");
        }
    }
}

/// Start the presenter dispatch thread. It exits once every `Emitter`
/// clone has been dropped and the queue is drained.
pub fn start_emitter(presenter: Box<dyn StatusPresenter>) -> (Emitter, thread::JoinHandle<()>) {
    let (sender, receiver) = channel();
    let handle = thread::spawn(move || run_dispatch(receiver, presenter));
    (Emitter { sender }, handle)
}

fn run_dispatch(receiver: Receiver<PresenterEvent>, mut presenter: Box<dyn StatusPresenter>) {
    let mut delivered: u64 = 0;

    for event in receiver {
        match event {
            PresenterEvent::Line(line) => presenter.append_line(&line),
            PresenterEvent::State(state) => presenter.state_changed(state),
            PresenterEvent::Sample(sample) => presenter.environment_sampled(&sample),
        }
        delivered += 1;
    }

    tracing::debug!(delivered, "Presenter queue closed, shutting down");
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Presenter that records everything it receives
    #[derive(Clone, Default)]
    pub struct RecordingPresenter {
        pub lines: Arc<Mutex<Vec<String>>>,
        pub states: Arc<Mutex<Vec<ControllerState>>>,
        pub samples: Arc<Mutex<Vec<EnvironmentSample>>>,
    }

    impl RecordingPresenter {
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        pub fn states(&self) -> Vec<ControllerState> {
            self.states.lock().unwrap().clone()
        }

        pub fn has_line_containing(&self, needle: &str) -> bool {
            let needle = needle.to_lowercase();
            self.lines().iter().any(|l| l.to_lowercase().contains(&needle))
        }
    }

    impl StatusPresenter for RecordingPresenter {
        fn append_line(&mut self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }

        fn state_changed(&mut self, state: ControllerState) {
            self.states.lock().unwrap().push(state);
        }

        fn environment_sampled(&mut self, sample: &EnvironmentSample) {
            self.samples.lock().unwrap().push(*sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingPresenter;
    use super::*;

    #[test]
    fn test_events_delivered_in_order() {
        let presenter = RecordingPresenter::default();
        let (emitter, handle) = start_emitter(Box::new(presenter.clone()));

        emitter.line("first");
        emitter.state(ControllerState::Running);
        emitter.line("second");
        emitter.sample(EnvironmentSample::new(50.0, 30));
        drop(emitter);
        handle.join().unwrap();

        assert_eq!(presenter.lines(), vec!["first", "second"]);
        assert_eq!(presenter.states(), vec![ControllerState::Running]);
        assert_eq!(presenter.samples.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_emit_after_shutdown_does_not_panic() {
        let (sender, receiver) = channel();
        drop(receiver);
        let emitter = Emitter { sender };
        emitter.line("nobody is listening");
    }
}
