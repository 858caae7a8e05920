// MobileMiner Type Definitions
//
// Shared data structures passed between the controller, the environment
// monitor and the presenter.

use std::fmt;

/// Lifecycle state of the miner process controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Starting,
    Running,
    StoppingAuto,  // Environmental trigger (battery/thermal)
    StoppingUser,
}

impl ControllerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Starting => "starting",
            ControllerState::Running => "running",
            ControllerState::StoppingAuto => "stopping-auto",
            ControllerState::StoppingUser => "stopping-user",
        }
    }

    pub fn is_stopping(&self) -> bool {
        matches!(self, ControllerState::StoppingAuto | ControllerState::StoppingUser)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One battery reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentSample {
    pub battery_percent: f32,      // 0-100
    pub temperature_celsius: i32,
}

impl EnvironmentSample {
    pub fn new(battery_percent: f32, temperature_celsius: i32) -> Self {
        Self {
            battery_percent,
            temperature_celsius,
        }
    }
}

impl fmt::Display for EnvironmentSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Battery: {:.0}% | Temp: {}°C", self.battery_percent, self.temperature_celsius)
    }
}

/// Durable worker label appended to the wallet address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerIdentity(String);

impl WorkerIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32, worker: WorkerIdentity },
    AlreadyRunning,
}

/// Result of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}
