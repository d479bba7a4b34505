use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use notify::{RecursiveMode, Watcher};
use std::{
    io,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
    time::{Duration, Instant},
};

use evdev::{Device, EventType, KeyCode, RelativeAxisCode, SynchronizationCode};

use super::dispatch::BindingDispatcher;
use crate::actions::UinputSink;
use crate::config::ProfileStore;
use crate::input;
use crate::sim::{MovementEvent, Simulation};

/// ~60 Hz animation cadence.
const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Movement(MovementEvent),
    Activate,
    ToggleCapture,
}

/// Folds raw evdev events into host events. Relative motion is summed until
/// SYN_REPORT so one report becomes one movement sample.
#[derive(Debug, Default)]
pub struct EventAccumulator {
    dx: i32,
    dy: i32,
}

impl EventAccumulator {
    pub fn feed(&mut self, ty: EventType, code: u16, value: i32) -> Option<HostEvent> {
        if ty == EventType::RELATIVE {
            if code == RelativeAxisCode::REL_X.0 {
                self.dx += value;
            } else if code == RelativeAxisCode::REL_Y.0 {
                self.dy += value;
            }
        } else if ty == EventType::KEY && value == 1 {
            // presses only; releases and autorepeat are ignored
            if code == KeyCode::BTN_LEFT.0 {
                return Some(HostEvent::Activate);
            }
            if code == KeyCode::BTN_RIGHT.0 {
                return Some(HostEvent::ToggleCapture);
            }
        } else if ty == EventType::SYNCHRONIZATION && code == SynchronizationCode::SYN_REPORT.0 {
            if self.dx != 0 || self.dy != 0 {
                let ev = MovementEvent {
                    dx: self.dx as f64,
                    dy: self.dy as f64,
                };
                self.dx = 0;
                self.dy = 0;
                return Some(HostEvent::Movement(ev));
            }
        }
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub device: Option<String>,
    pub dry_run: bool,
}

fn open_device(path: Option<&str>) -> Result<(Device, String)> {
    let path = match path {
        Some(p) => p.to_string(),
        None => input::discover_pointers()
            .into_iter()
            .next()
            .map(|d| {
                info!("using pointer '{}' at {}", d.name, d.path);
                d.path
            })
            .ok_or_else(|| anyhow!("no relative pointer devices found (try `calcdrift doctor`)"))?,
    };
    let dev = Device::open(&path).map_err(|e| anyhow!("failed to open {path}: {e}"))?;
    if !input::is_pointer(&dev) {
        warn!("{path} does not look like a relative pointer");
    }
    Ok((dev, path))
}

/// Grab or release the device and report the outcome as capture status.
fn set_capture(dev: &mut Device, sim: &mut Simulation, want: bool) {
    let res = if want { dev.grab() } else { dev.ungrab() };
    match res {
        Ok(()) => {
            sim.set_lock_status(want);
        }
        Err(e) => {
            let verb = if want { "grab" } else { "release" };
            warn!("could not {verb} pointer: {e}");
        }
    }
}

fn is_profile_change(ev: &notify::Event, active: &Path) -> bool {
    (ev.kind.is_modify() || ev.kind.is_create()) && ev.paths.iter().any(|p| p == active)
}

pub fn run_pipeline(mut store: ProfileStore, opts: PipelineOptions) -> Result<()> {
    let (mut dev, path) = open_device(opts.device.as_deref())?;
    dev.set_nonblocking(true)?;

    let profile = store.profile.clone();
    let mut sim = Simulation::new(profile.sim_params(), profile.keyboard_layout()?);
    let sink = if opts.dry_run {
        UinputSink::noop()
    } else {
        UinputSink::new().unwrap_or_else(|e| {
            warn!("uinput unavailable: {e}");
            UinputSink::noop()
        })
    };
    if sink.is_noop() {
        info!("activations are only logged");
    }
    let mut dispatcher = BindingDispatcher::new(profile.bindings.clone(), sink);

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.clone())?;

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })?;
    watcher.watch(&store.profiles_dir, RecursiveMode::NonRecursive)?;

    sim.subscribe_lock(|locked| {
        info!("capture {}", if locked { "on" } else { "off" });
    });
    set_capture(&mut dev, &mut sim, true);
    info!("running on {path}; right button toggles capture, left button activates");

    let start = Instant::now();
    let mut next_frame = Duration::ZERO;
    let mut acc = EventAccumulator::default();
    let mut hovered: Option<String> = None;
    let mut result = Ok(());

    while !shutdown.load(Ordering::Relaxed) {
        let mut pending = Vec::new();
        match dev.fetch_events() {
            Ok(events) => {
                for ev in events {
                    if let Some(h) = acc.feed(ev.event_type(), ev.code(), ev.value()) {
                        pending.push(h);
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                result = Err(anyhow!("reading {path} failed: {e}"));
                break;
            }
        }
        let any_event = !pending.is_empty();

        for h in pending {
            match h {
                HostEvent::Movement(m) => {
                    sim.report_movement_at(m, start.elapsed().as_secs_f64() * 1000.0);
                }
                HostEvent::Activate => {
                    if sim.is_locked() {
                        match sim.activate(&mut dispatcher) {
                            Ok(Some(_)) => {
                                if let Some((target, action)) = dispatcher.last() {
                                    debug!("{target} -> {action:?}");
                                }
                            }
                            Ok(None) => {}
                            Err(e) => error!("activation failed: {e}"),
                        }
                    }
                }
                HostEvent::ToggleCapture => {
                    let want = !sim.is_locked();
                    set_capture(&mut dev, &mut sim, want);
                }
            }
        }

        while let Ok(res) = rx.try_recv() {
            match res {
                Ok(ev) if is_profile_change(&ev, &store.active_path()) => match store.reload() {
                    Ok(()) => {
                        let p = &store.profile;
                        match p.keyboard_layout() {
                            Ok(layout) => {
                                sim.retune(p.sim_params(), layout);
                                dispatcher.set_bindings(p.bindings.clone());
                                info!("profile '{}' reloaded", store.active_name);
                            }
                            Err(e) => error!("reload failed: {e}"),
                        }
                    }
                    Err(e) => error!("reload failed, keeping last good profile: {e:#}"),
                },
                Ok(_) => {}
                Err(e) => warn!("profile watcher error: {e}"),
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= next_frame {
            sim.tick(elapsed.as_secs_f64() * 1000.0);
            next_frame = elapsed + FRAME_INTERVAL;
            if sim.resolved_target() != hovered.as_deref() {
                hovered = sim.resolved_target().map(str::to_string);
                debug!("hovering {}", hovered.as_deref().unwrap_or("nothing"));
            }
        }

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }

    if sim.is_locked() {
        set_capture(&mut dev, &mut sim, false);
    }
    info!("pipeline stopped");
    result
}
