use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use glam::DVec2;
use log::{info, warn};
use serde::{Deserialize, Deserializer};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::host::dispatch::parse_action;
use crate::input;
use crate::layout::KeyboardLayout;
use crate::sim::{ReleasePolicy, SimParams};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Motion {
    pub initial_heading: f64,
    pub rotation_speed: f64,
    pub sensitivity: f64,
    pub max_speed: f64,
    pub position_scale: f64,
    pub pulse_ms: u64,
}

impl Default for Motion {
    fn default() -> Self {
        let p = SimParams::default();
        Self {
            initial_heading: p.initial_heading,
            rotation_speed: p.rotation_speed,
            sensitivity: p.sensitivity,
            max_speed: p.max_speed,
            position_scale: p.position_scale,
            pulse_ms: p.pulse_ms as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    pub width: f64,
    pub height: f64,
}

impl Default for Field {
    fn default() -> Self {
        Self {
            width: 320.0,
            height: 520.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayoutSpec {
    pub key_width: f64,
    pub key_height: f64,
    #[serde(default)]
    pub header_height: f64,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub velocity_on_release: ReleasePolicy,
    pub reset_position_on_engage: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub motion: Motion,
    #[serde(default)]
    pub field: Field,
    pub layout: LayoutSpec,
    #[serde(default)]
    pub policy: Policy,

    // Accept nested/dotted tables and flatten them into "a.b" -> "value"
    #[serde(default, deserialize_with = "deserialize_bindings_flat")]
    pub bindings: HashMap<String, String>,
}

impl Profile {
    /// The profile shipped with the binary.
    pub fn bundled() -> Result<Self> {
        Self::parse(default_profile_text(), Path::new("<bundled default.toml>"))
    }

    pub fn parse(txt: &str, origin: &Path) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)
            .map_err(|e| anyhow!("failed to parse {}: {e}", origin.display()))?;
        validate_profile(&profile).with_context(|| format!("invalid {}", origin.display()))?;
        Ok(profile)
    }

    pub fn sim_params(&self) -> SimParams {
        SimParams {
            initial_heading: self.motion.initial_heading,
            rotation_speed: self.motion.rotation_speed,
            sensitivity: self.motion.sensitivity,
            max_speed: self.motion.max_speed,
            position_scale: self.motion.position_scale,
            pulse_ms: self.motion.pulse_ms as f64,
            field: DVec2::new(self.field.width, self.field.height),
            velocity_on_release: self.policy.velocity_on_release,
            reset_position_on_engage: self.policy.reset_position_on_engage,
        }
    }

    pub fn keyboard_layout(&self) -> Result<KeyboardLayout> {
        let l = &self.layout;
        Ok(KeyboardLayout::new(
            l.rows.clone(),
            DVec2::new(l.key_width, l.key_height),
            l.header_height,
        )?)
    }
}

// --------- custom bindings deserializer (tolerant) ----------
fn deserialize_bindings_flat<'de, D>(
    de: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    let table = match val {
        toml::Value::Table(t) => t,
        other => {
            return Err(serde::de::Error::custom(format!(
                "bindings must be a table, got {:?}",
                other.type_str()
            )));
        }
    };

    let mut out = HashMap::new();
    flatten_table("", &table, &mut out).map_err(serde::de::Error::custom)?;
    Ok(out)
}

fn flatten_table(
    prefix: &str,
    table: &toml::value::Table,
    out: &mut HashMap<String, String>,
) -> std::result::Result<(), String> {
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Table(sub) => {
                flatten_table(&key, sub, out)?;
            }
            other => {
                return Err(format!(
                    "binding '{}' value must be a string, got {}",
                    key,
                    other.type_str()
                ));
            }
        }
    }
    Ok(())
}
// ------------------------------------------------------------

/// Profiles on disk plus the name of the active one.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub active_name: String,
    pub profile: Profile,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("calcdrift"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ProfileStore {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir()?;
        Self::open(&cfgdir)
    }

    /// Open (and seed if needed) a store rooted at `cfgdir`.
    pub fn open(cfgdir: &Path) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)
            .map_err(|e| anyhow!("failed to create {}: {e}", profdir.display()))?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }

    pub fn active_path(&self) -> PathBuf {
        self.profile_path(&self.active_name)
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    /// Load `name` for this run without touching the active pointer.
    pub fn select(&mut self, name: &str) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, name)?;
        self.active_name = name.to_string();
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profile_path(name);
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        self.select(name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        let devices: Vec<String> = input::discover_pointers()
            .into_iter()
            .map(|d| format!("{} ({})", d.name, d.path))
            .collect();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "devices": devices,
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn load_profile(dir: &Path, name: &str) -> Result<Profile> {
    let path = dir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::parse(&txt, &path)
}

fn validate_profile(p: &Profile) -> Result<()> {
    let m = &p.motion;
    if m.pulse_ms == 0 {
        return Err(anyhow!("motion.pulse_ms must be a positive duration"));
    }
    if !(m.max_speed > 0.0) {
        return Err(anyhow!("motion.max_speed must be positive"));
    }
    for (name, v) in [
        ("motion.initial_heading", m.initial_heading),
        ("motion.rotation_speed", m.rotation_speed),
        ("motion.sensitivity", m.sensitivity),
        ("motion.position_scale", m.position_scale),
    ] {
        if !v.is_finite() {
            return Err(anyhow!("{name} must be a finite number"));
        }
    }
    if !(p.field.width > 0.0 && p.field.height > 0.0) {
        return Err(anyhow!("field dimensions must be positive"));
    }

    let layout = p.keyboard_layout()?;
    let covered = layout.grid_size() + DVec2::new(0.0, layout.header_height());
    if covered != DVec2::new(p.field.width, p.field.height) {
        warn!(
            "{}x{} key layout covers {}x{} but field is {}x{}",
            layout.rows(),
            layout.cols(),
            covered.x,
            covered.y,
            p.field.width,
            p.field.height
        );
    }

    let targets = layout.targets();
    for (k, v) in &p.bindings {
        if k.trim().is_empty() {
            return Err(anyhow!("empty binding key"));
        }
        parse_action(v).map_err(|e| anyhow!("binding '{k}': {e}"))?;
        if !targets.contains(&k.as_str()) {
            warn!("binding '{k}' does not match any key in the layout");
        }
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}
