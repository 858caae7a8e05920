// Environment Monitor Thread
//
// Re-samples the battery whenever its sysfs files change (notify poll
// watcher with content comparison) and on a heartbeat. Samples go to the
// presenter; samples that break the threshold policy pause the miner.

use super::battery::BatterySource;
use crate::config::MinerConfig;
use crate::controller::ControllerHandle;
use crate::event::Emitter;
use crate::types::{ControllerState, EnvironmentSample};
use notify::{Config, Event, PollWatcher, RecursiveMode, Watcher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAKE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub min_battery_percent: f32,
    pub max_temperature_celsius: i32,
}

impl ThresholdPolicy {
    pub fn from_config(config: &MinerConfig) -> Self {
        Self {
            min_battery_percent: config.min_battery_percent,
            max_temperature_celsius: config.max_temperature_celsius,
        }
    }

    /// Battery strictly below the minimum or temperature strictly above the maximum
    pub fn is_breached(&self, sample: &EnvironmentSample) -> bool {
        sample.battery_percent < self.min_battery_percent
            || sample.temperature_celsius > self.max_temperature_celsius
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::from_config(&MinerConfig::default())
    }
}

pub struct EnvironmentMonitor {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl EnvironmentMonitor {
    pub fn start(
        source: Box<dyn BatterySource>,
        policy: ThresholdPolicy,
        controller: ControllerHandle,
        emitter: Emitter,
        interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let thread = thread::spawn(move || {
            run_monitor(source, policy, controller, emitter, interval, stop_flag);
        });

        Self {
            stop,
            thread: Some(thread),
        }
    }

    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Environment monitor thread panicked");
            }
        }
    }
}

impl Drop for EnvironmentMonitor {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

fn run_monitor(
    mut source: Box<dyn BatterySource>,
    policy: ThresholdPolicy,
    controller: ControllerHandle,
    emitter: Emitter,
    interval: Duration,
    stop: Arc<AtomicBool>,
) {
    let (tx, rx) = channel();
    // Keep the watcher alive for the whole loop
    let _watcher = watch_battery(source.as_ref(), tx, interval);

    tracing::info!(
        min_battery = policy.min_battery_percent,
        max_temperature = policy.max_temperature_celsius,
        interval_ms = interval.as_millis() as u64,
        "Environment monitor started"
    );

    let mut last_sample: Option<Instant> = None;

    while !stop.load(Ordering::SeqCst) {
        let changed = wait_for_change(&rx);
        let heartbeat_due = last_sample.map_or(true, |t| t.elapsed() >= interval);
        if !changed && !heartbeat_due {
            continue;
        }
        last_sample = Some(Instant::now());

        let Some(sample) = source.read_sample() else {
            tracing::debug!("Battery reading unavailable");
            continue;
        };

        if !handle_sample(sample, &policy, &controller, &emitter) {
            tracing::info!("Controller gone, stopping environment monitor");
            break;
        }
    }

    tracing::info!("Environment monitor stopped");
}

fn watch_battery(
    source: &dyn BatterySource,
    tx: std::sync::mpsc::Sender<notify::Result<Event>>,
    interval: Duration,
) -> Option<PollWatcher> {
    let paths = source.watch_paths();
    if paths.is_empty() {
        tracing::info!("No battery files to watch, using heartbeat only");
        return None;
    }

    // sysfs attributes do not update mtime, so contents are compared
    let config = Config::default()
        .with_poll_interval(interval.min(Duration::from_secs(1)))
        .with_compare_contents(true);

    let mut watcher = match PollWatcher::new(tx, config) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(error = %e, "Battery watcher unavailable, using heartbeat only");
            return None;
        }
    };

    for path in &paths {
        if let Err(e) = watcher.watch(path, RecursiveMode::NonRecursive) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to watch battery file");
        }
    }

    Some(watcher)
}

/// Wait briefly for a watcher event. True if a battery file changed.
fn wait_for_change(rx: &Receiver<notify::Result<Event>>) -> bool {
    match rx.recv_timeout(WAKE_INTERVAL) {
        Ok(Ok(event)) => {
            // Drain the burst so one change means one sample
            while rx.try_recv().is_ok() {}
            tracing::trace!(paths = ?event.paths, "Battery files changed");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Battery watch error");
            false
        }
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
    }
}

/// Publish a sample and pause the miner if it breaks the policy.
/// Returns false once the controller is gone.
pub fn handle_sample(
    sample: EnvironmentSample,
    policy: &ThresholdPolicy,
    controller: &ControllerHandle,
    emitter: &Emitter,
) -> bool {
    emitter.sample(sample);

    if !policy.is_breached(&sample) || controller.state() != ControllerState::Running {
        return true;
    }

    tracing::warn!(%sample, "Environment threshold breached while mining");
    controller.environment_trigger(sample).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControlEvent;
    use crate::event::emitter::test_support::RecordingPresenter;
    use crate::event::start_emitter;
    use std::sync::mpsc::Sender;
    use std::sync::Mutex;

    fn fake_controller(state: ControllerState) -> (ControllerHandle, Receiver<ControlEvent>) {
        let (sender, receiver) = channel();
        let handle = ControllerHandle::new(sender, Arc::new(Mutex::new(state)));
        (handle, receiver)
    }

    fn triggers(receiver: &Receiver<ControlEvent>) -> Vec<EnvironmentSample> {
        receiver
            .try_iter()
            .filter_map(|event| match event {
                ControlEvent::EnvironmentTrigger(sample) => Some(sample),
                _ => None,
            })
            .collect()
    }

    struct ScriptedBattery {
        readings: Vec<EnvironmentSample>,
        done: Sender<()>,
    }

    impl BatterySource for ScriptedBattery {
        fn read_sample(&mut self) -> Option<EnvironmentSample> {
            if self.readings.is_empty() {
                let _ = self.done.send(());
                return None;
            }
            Some(self.readings.remove(0))
        }
    }

    #[test]
    fn test_policy_trips() {
        let policy = ThresholdPolicy::default();
        assert!(policy.is_breached(&EnvironmentSample::new(15.0, 25)));
        assert!(policy.is_breached(&EnvironmentSample::new(80.0, 45)));
        assert!(policy.is_breached(&EnvironmentSample::new(5.0, 60)));
    }

    #[test]
    fn test_policy_boundaries_do_not_trip() {
        let policy = ThresholdPolicy::default();
        assert!(!policy.is_breached(&EnvironmentSample::new(20.0, 40)));
        assert!(!policy.is_breached(&EnvironmentSample::new(100.0, 0)));
    }

    #[test]
    fn test_policy_from_config() {
        let config = MinerConfig {
            min_battery_percent: 50.0,
            max_temperature_celsius: 35,
            ..MinerConfig::default()
        };
        let policy = ThresholdPolicy::from_config(&config);
        assert!(policy.is_breached(&EnvironmentSample::new(45.0, 30)));
        assert!(policy.is_breached(&EnvironmentSample::new(90.0, 36)));
    }

    #[test]
    fn test_trigger_only_while_running() {
        let presenter = RecordingPresenter::default();
        let (emitter, _dispatch) = start_emitter(Box::new(presenter.clone()));
        let policy = ThresholdPolicy::default();
        let low = EnvironmentSample::new(15.0, 25);

        for state in [
            ControllerState::Idle,
            ControllerState::Starting,
            ControllerState::StoppingAuto,
            ControllerState::StoppingUser,
        ] {
            let (handle, receiver) = fake_controller(state);
            assert!(handle_sample(low, &policy, &handle, &emitter));
            assert!(triggers(&receiver).is_empty(), "triggered in {}", state);
        }

        let (handle, receiver) = fake_controller(ControllerState::Running);
        assert!(handle_sample(low, &policy, &handle, &emitter));
        assert_eq!(triggers(&receiver), vec![low]);
    }

    #[test]
    fn test_healthy_sample_never_triggers() {
        let (emitter, _dispatch) = start_emitter(Box::new(RecordingPresenter::default()));
        let (handle, receiver) = fake_controller(ControllerState::Running);

        assert!(handle_sample(EnvironmentSample::new(87.0, 31), &ThresholdPolicy::default(), &handle, &emitter));
        assert!(triggers(&receiver).is_empty());
    }

    #[test]
    fn test_gone_controller_stops_monitor() {
        let (emitter, _dispatch) = start_emitter(Box::new(RecordingPresenter::default()));
        let (handle, receiver) = fake_controller(ControllerState::Running);
        drop(receiver);

        let keep_going = handle_sample(EnvironmentSample::new(10.0, 20), &ThresholdPolicy::default(), &handle, &emitter);
        assert!(!keep_going);
    }

    #[test]
    fn test_monitor_publishes_and_triggers() {
        let presenter = RecordingPresenter::default();
        let (emitter, _dispatch) = start_emitter(Box::new(presenter.clone()));
        let (handle, receiver) = fake_controller(ControllerState::Running);
        let (done_tx, done_rx) = channel();

        let source = ScriptedBattery {
            readings: vec![EnvironmentSample::new(90.0, 30), EnvironmentSample::new(80.0, 45)],
            done: done_tx,
        };
        let monitor = EnvironmentMonitor::start(
            Box::new(source),
            ThresholdPolicy::default(),
            handle,
            emitter,
            Duration::from_millis(20),
        );

        done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        monitor.stop();

        assert_eq!(triggers(&receiver), vec![EnvironmentSample::new(80.0, 45)]);
        let deadline = Instant::now() + Duration::from_secs(5);
        while presenter.samples.lock().unwrap().len() < 2 {
            assert!(Instant::now() < deadline, "samples not delivered");
            thread::sleep(Duration::from_millis(10));
        }
    }
}
