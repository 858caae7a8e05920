// Device Model Detection
//
// Order: config override, DMI product name, host name, fixed fallback

use std::fs;
use std::path::Path;
use sysinfo::System;

const DMI_PRODUCT_NAME: &str = "/sys/devices/virtual/dmi/id/product_name";
const FALLBACK_MODEL: &str = "unknown-device";

/// Model name as reported by the device, before hyphenation
pub fn device_model(override_model: Option<&str>) -> String {
    if let Some(model) = override_model.map(str::trim).filter(|m| !m.is_empty()) {
        return model.to_string();
    }

    if let Some(model) = read_dmi_product_name(Path::new(DMI_PRODUCT_NAME)) {
        return model;
    }

    System::host_name()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_MODEL.to_string())
}

fn read_dmi_product_name(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_override_wins() {
        assert_eq!(device_model(Some("Pixel 7 Pro")), "Pixel 7 Pro");
    }

    #[test]
    fn test_blank_override_falls_through() {
        assert!(!device_model(Some("   ")).is_empty());
    }

    #[test]
    fn test_dmi_file_is_trimmed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("product_name");
        fs::write(&path, "ThinkPad X1 Carbon\n").unwrap();
        assert_eq!(read_dmi_product_name(&path).as_deref(), Some("ThinkPad X1 Carbon"));
    }
}
