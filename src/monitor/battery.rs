// Battery Source
//
// Reads battery level and temperature from the power_supply sysfs class
// (Linux and Android expose the same layout).

use crate::types::EnvironmentSample;
use std::fs;
use std::path::{Path, PathBuf};
use sysinfo::Components;

/// Anything that can produce battery readings
pub trait BatterySource: Send {
    /// Current reading, or None when the battery cannot be read right now
    fn read_sample(&mut self) -> Option<EnvironmentSample>;

    /// Files whose changes signal a new reading
    fn watch_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

pub struct SysfsBattery {
    root: PathBuf,
    supply_dir: Option<PathBuf>,
    components: Components,
}

impl SysfsBattery {
    pub fn new(power_supply_root: &Path) -> Self {
        let supply_dir = find_battery_dir(power_supply_root);
        match &supply_dir {
            Some(dir) => tracing::info!(path = %dir.display(), "Using battery"),
            None => tracing::warn!(root = %power_supply_root.display(), "No battery found"),
        }

        Self {
            root: power_supply_root.to_path_buf(),
            supply_dir,
            components: Components::new_with_refreshed_list(),
        }
    }

    fn battery_dir(&mut self) -> Option<PathBuf> {
        if self.supply_dir.is_none() {
            self.supply_dir = find_battery_dir(&self.root);
        }
        self.supply_dir.clone()
    }

    /// Hottest thermal zone, used when the battery has no temp sensor
    fn component_temperature(&mut self) -> Option<i32> {
        self.components.refresh();
        let mut hottest: Option<f32> = None;
        for component in &self.components {
            let temp = component.temperature();
            if temp.is_finite() && hottest.map_or(true, |h| temp > h) {
                hottest = Some(temp);
            }
        }
        hottest.map(|t| t.round() as i32)
    }
}

impl BatterySource for SysfsBattery {
    fn read_sample(&mut self) -> Option<EnvironmentSample> {
        let dir = self.battery_dir()?;
        let battery_percent = read_percent(&dir)?;
        let temperature_celsius = read_battery_temperature(&dir)
            .or_else(|| self.component_temperature())
            .unwrap_or(0);

        Some(EnvironmentSample::new(battery_percent, temperature_celsius))
    }

    fn watch_paths(&self) -> Vec<PathBuf> {
        match &self.supply_dir {
            Some(dir) => ["capacity", "temp"]
                .iter()
                .map(|name| dir.join(name))
                .filter(|path| path.exists())
                .collect(),
            None => Vec::new(),
        }
    }
}

/// First power supply whose type is "Battery"
fn find_battery_dir(root: &Path) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    entries
        .into_iter()
        .find(|dir| read_trimmed(&dir.join("type")).as_deref() == Some("Battery"))
}

/// Charge level in percent: `capacity`, else now/full counters
fn read_percent(dir: &Path) -> Option<f32> {
    if let Some(capacity) = read_number(&dir.join("capacity")) {
        return Some(capacity.clamp(0.0, 100.0) as f32);
    }

    for (now, full) in [("charge_now", "charge_full"), ("energy_now", "energy_full")] {
        let level = read_number(&dir.join(now));
        let scale = read_number(&dir.join(full));
        if let (Some(level), Some(scale)) = (level, scale) {
            if scale > 0.0 {
                return Some((level * 100.0 / scale).clamp(0.0, 100.0) as f32);
            }
        }
    }

    None
}

/// `temp` is reported in tenths of a degree Celsius
fn read_battery_temperature(dir: &Path) -> Option<i32> {
    read_number(&dir.join("temp")).map(|tenths| (tenths / 10.0) as i32)
}

fn read_number(path: &Path) -> Option<f64> {
    read_trimmed(path)?.parse().ok()
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_supply(root: &Path, name: &str, kind: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("type"), format!("{}\n", kind)).unwrap();
        for (file, value) in files {
            fs::write(dir.join(file), format!("{}\n", value)).unwrap();
        }
        dir
    }

    #[test]
    fn test_reads_capacity_and_temp() {
        let temp_dir = TempDir::new().unwrap();
        fake_supply(temp_dir.path(), "AC", "Mains", &[("online", "1")]);
        fake_supply(temp_dir.path(), "battery", "Battery", &[("capacity", "15"), ("temp", "253")]);

        let mut battery = SysfsBattery::new(temp_dir.path());
        let sample = battery.read_sample().unwrap();

        assert_eq!(sample.battery_percent, 15.0);
        assert_eq!(sample.temperature_celsius, 25);
        assert_eq!(battery.watch_paths().len(), 2);
    }

    #[test]
    fn test_level_over_scale_fallback() {
        let temp_dir = TempDir::new().unwrap();
        fake_supply(
            temp_dir.path(),
            "BAT0",
            "Battery",
            &[("charge_now", "1500000"), ("charge_full", "3000000"), ("temp", "410")],
        );

        let mut battery = SysfsBattery::new(temp_dir.path());
        let sample = battery.read_sample().unwrap();

        assert_eq!(sample.battery_percent, 50.0);
        assert_eq!(sample.temperature_celsius, 41);
    }

    #[test]
    fn test_no_battery_means_no_sample() {
        let temp_dir = TempDir::new().unwrap();
        fake_supply(temp_dir.path(), "AC", "Mains", &[("online", "1")]);

        let mut battery = SysfsBattery::new(temp_dir.path());
        assert!(battery.read_sample().is_none());
        assert!(battery.watch_paths().is_empty());
    }

    #[test]
    fn test_unreadable_capacity_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        fake_supply(temp_dir.path(), "battery", "Battery", &[("capacity", "n/a")]);

        let mut battery = SysfsBattery::new(temp_dir.path());
        assert!(battery.read_sample().is_none());
    }
}
