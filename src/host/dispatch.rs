use anyhow::{Result, anyhow};
use log::{info, warn};
use std::collections::HashMap;

use crate::actions::{self, ActivationSink, UinputSink};

/// Parsed right-hand side of a `[bindings]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Key(String),
    Mouse(String),
    Log,
}

pub fn parse_action(raw: &str) -> Result<Action> {
    let raw = raw.trim();
    if raw == "log" {
        return Ok(Action::Log);
    }
    if let Some(rest) = raw.strip_prefix("key:") {
        actions::parse_chord(rest)?;
        return Ok(Action::Key(rest.trim().to_string()));
    }
    if let Some(rest) = raw.strip_prefix("mouse:") {
        let button = rest.trim().to_ascii_lowercase();
        if !matches!(button.as_str(), "left" | "right" | "middle") {
            return Err(anyhow!("unknown mouse button in '{raw}'"));
        }
        return Ok(Action::Mouse(button));
    }
    Err(anyhow!("invalid action '{raw}'"))
}

/// Turns an activated key id into the input bound to it in the profile.
pub struct BindingDispatcher {
    bindings: HashMap<String, String>,
    sink: UinputSink,
    last: Option<(String, Action)>,
}

impl BindingDispatcher {
    pub fn new(bindings: HashMap<String, String>, sink: UinputSink) -> Self {
        Self {
            bindings,
            sink,
            last: None,
        }
    }

    pub fn set_bindings(&mut self, bindings: HashMap<String, String>) {
        self.bindings = bindings;
    }

    /// Most recent dispatched (target, action) pair.
    pub fn last(&self) -> Option<&(String, Action)> {
        self.last.as_ref()
    }
}

impl ActivationSink for BindingDispatcher {
    fn activate(&mut self, target: &str) -> Result<()> {
        let Some(raw) = self.bindings.get(target) else {
            warn!("no binding for {target}");
            return Ok(());
        };
        let action = parse_action(raw).map_err(|e| anyhow!("binding {target}: {e}"))?;
        match &action {
            Action::Key(chord) => self.sink.key_chord(chord)?,
            Action::Mouse(button) => self.sink.click_mouse(button)?,
            Action::Log => info!("{target} pressed"),
        }
        self.last = Some((target.to_string(), action));
        Ok(())
    }
}
