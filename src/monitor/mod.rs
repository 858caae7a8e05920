// Monitor Module - Battery and thermal watching
//
// This module samples the power supply and auto-pauses the miner when the
// device runs low or hot

pub mod battery;
pub mod environment;

pub use battery::{BatterySource, SysfsBattery};
pub use environment::{EnvironmentMonitor, ThresholdPolicy};
