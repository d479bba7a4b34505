//! Relative pointer discovery (evdev 0.13.2 compatible)

use evdev::{Device, EventType, KeyCode, RelativeAxisCode};

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
}

/// A device qualifies when it reports REL_X/REL_Y and has a left button.
pub fn is_pointer(dev: &Device) -> bool {
    let has_rel = dev.supported_events().contains(EventType::RELATIVE);
    let has_axes = dev.supported_relative_axes().is_some_and(|a| {
        a.contains(RelativeAxisCode::REL_X) && a.contains(RelativeAxisCode::REL_Y)
    });
    let has_button = dev
        .supported_keys()
        .is_some_and(|k| k.contains(KeyCode::BTN_LEFT));
    has_rel && has_axes && has_button
}

pub fn discover_pointers() -> Vec<DeviceInfo> {
    let mut out = vec![];
    if let Ok(rd) = std::fs::read_dir("/dev/input") {
        for e in rd.flatten() {
            let p = e.path();
            let is_event_node = p
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.starts_with("event"));
            if !is_event_node {
                continue;
            }
            if let Ok(dev) = Device::open(&p) {
                if is_pointer(&dev) {
                    out.push(DeviceInfo {
                        path: p.display().to_string(),
                        name: dev.name().unwrap_or("unknown").to_string(),
                    });
                }
            }
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}
