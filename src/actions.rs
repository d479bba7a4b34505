use anyhow::{Result, anyhow};
use log::{info, warn};

/// Receives the key id picked by an activation.
pub trait ActivationSink {
    fn activate(&mut self, target: &str) -> Result<()>;
}

/// Virtual keyboard/mouse used to press calculator keys in whatever
/// application has focus.
pub struct UinputSink {
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self { linux: None })
        }
    }

    pub fn noop() -> Self {
        Self { linux: None }
    }

    pub fn is_noop(&self) -> bool {
        self.linux.is_none()
    }

    pub fn click_mouse(&mut self, which: &str) -> Result<()> {
        let button = which.trim().to_ascii_lowercase();
        if !matches!(button.as_str(), "left" | "right" | "middle") {
            return Err(anyhow!("unknown mouse button: {which}"));
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.click(&button)?;
        }
        Ok(())
    }

    /// Send a chord like "SHIFT+EQUAL" or a single "7"
    pub fn key_chord(&mut self, chord: &str) -> Result<()> {
        let parts = parse_chord(chord)?;
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            let mut keys = Vec::with_capacity(parts.len());
            for p in &parts {
                keys.push(map_key(p)?);
            }
            // press in order
            for k in &keys {
                dev.key_send(*k, 1)?;
            }
            dev.sync()?;
            // release in reverse
            for k in keys.iter().rev() {
                dev.key_send(*k, 0)?;
            }
            dev.sync()?;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = parts;
        Ok(())
    }
}

/// Split and normalize a chord, rejecting tokens the virtual keyboard
/// does not register.
pub fn parse_chord(chord: &str) -> Result<Vec<String>> {
    let parts: Vec<String> = chord
        .split('+')
        .map(|s| s.trim().to_ascii_uppercase())
        .collect();
    for p in &parts {
        if !KEY_TOKENS.contains(&p.as_str()) {
            return Err(anyhow!("unsupported key token: '{p}' in '{chord}'"));
        }
    }
    Ok(parts)
}

const KEY_TOKENS: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "CTRL", "CONTROL", "ALT", "SHIFT",
    "SUPER", "META", "TAB", "MINUS", "EQUAL", "DOT", "PERIOD", "SLASH", "ENTER", "ESC",
];

/// Logs activations instead of emitting input; used by `replay` and dry runs.
#[derive(Debug, Default)]
pub struct LogSink {
    pub count: usize,
}

impl ActivationSink for LogSink {
    fn activate(&mut self, target: &str) -> Result<()> {
        self.count += 1;
        info!("activated {target} (#{})", self.count);
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn map_key(tok: &str) -> Result<uinput::event::keyboard::Key> {
    use uinput::event::keyboard::Key as K;
    let k = match tok {
        "0" => K::_0,
        "1" => K::_1,
        "2" => K::_2,
        "3" => K::_3,
        "4" => K::_4,
        "5" => K::_5,
        "6" => K::_6,
        "7" => K::_7,
        "8" => K::_8,
        "9" => K::_9,
        "CTRL" | "CONTROL" => K::LeftControl,
        "ALT" => K::LeftAlt,
        "SHIFT" => K::LeftShift,
        "SUPER" | "META" => K::LeftMeta,
        "TAB" => K::Tab,
        "MINUS" => K::Minus,
        "EQUAL" => K::Equal,
        "DOT" | "PERIOD" => K::Dot,
        "SLASH" => K::Slash,
        "ENTER" => K::Enter,
        "ESC" => K::Esc,
        other => return Err(anyhow!("unsupported key token: {other}")),
    };
    Ok(k)
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::{controller::Mouse, keyboard::Key as K, relative};

        let mut builder = uinput::default()?
            .name("calcdrift virtual keypad")?
            // relative axes so the device is classified as a pointer
            .event(relative::Position::X)?
            .event(relative::Position::Y)?
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?;
        for key in [
            K::_0,
            K::_1,
            K::_2,
            K::_3,
            K::_4,
            K::_5,
            K::_6,
            K::_7,
            K::_8,
            K::_9,
            K::LeftControl,
            K::LeftAlt,
            K::LeftShift,
            K::LeftMeta,
            K::Tab,
            K::Minus,
            K::Equal,
            K::Dot,
            K::Slash,
            K::Enter,
            K::Esc,
        ] {
            builder = builder.event(key)?;
        }
        let dev = builder.create()?;

        info!("uinput: created virtual device");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn key_send(&mut self, key: uinput::event::keyboard::Key, val: i32) -> Result<()> {
        self.dev.send(key, val)?;
        Ok(())
    }

    fn click(&mut self, which: &str) -> Result<()> {
        use uinput::event::controller::Mouse;
        let button = match which {
            "right" => Mouse::Right,
            "middle" => Mouse::Middle,
            _ => Mouse::Left,
        };
        self.dev.send(button, 1)?;
        self.sync()?;
        self.dev.send(button, 0)?;
        self.sync()
    }
}
