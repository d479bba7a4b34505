//! Headless driver: feeds a JSON-lines event script through a simulation.
//!
//! One event per line:
//!
//! ```text
//! {"lock": true}
//! {"move": {"dx": 0, "dy": -10}}
//! {"move": {"dx": 0, "dy": -10, "at": 20.5}}
//! {"frame": 16.0}
//! "activate"
//! ```
//!
//! A move without `at` is stamped with the latest frame time.
//! Blank lines and lines starting with `#` are skipped. Every frame that
//! moves the pointer writes a JSON snapshot line to the output.

use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::io::{BufRead, Write};

use crate::actions::ActivationSink;
use crate::sim::{MovementEvent, Simulation};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayEvent {
    Lock(bool),
    Move(TimedMove),
    Frame(f64),
    Activate,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimedMove {
    #[serde(flatten)]
    pub movement: MovementEvent,
    #[serde(default)]
    pub at: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub frames: usize,
    pub activations: usize,
}

pub fn run_replay<R, W, S>(
    script: R,
    sim: &mut Simulation,
    sink: &mut S,
    mut out: W,
) -> Result<ReplaySummary>
where
    R: BufRead,
    W: Write,
    S: ActivationSink + ?Sized,
{
    let mut summary = ReplaySummary::default();
    let mut last_frame: Option<f64> = None;

    for (idx, line) in script.lines().enumerate() {
        let lineno = idx + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let ev: ReplayEvent = serde_json::from_str(trimmed)
            .map_err(|e| anyhow!("line {lineno}: {e}"))?;
        summary.events += 1;

        match ev {
            ReplayEvent::Lock(locked) => {
                sim.set_lock_status(locked);
            }
            ReplayEvent::Move(TimedMove { movement, at }) => match at {
                Some(at) => {
                    sim.report_movement_at(movement, at);
                }
                None => {
                    sim.report_movement(movement);
                }
            },
            ReplayEvent::Frame(elapsed) => {
                if last_frame.is_some_and(|prev| elapsed < prev) {
                    return Err(anyhow!(
                        "line {lineno}: frame time {elapsed} goes backwards"
                    ));
                }
                last_frame = Some(elapsed);
                summary.frames += 1;
                if sim.tick(elapsed) {
                    writeln!(out, "{}", serde_json::to_string(&sim.snapshot())?)?;
                }
            }
            ReplayEvent::Activate => {
                if sim.activate(sink)?.is_some() {
                    summary.activations += 1;
                }
            }
        }
    }
    Ok(summary)
}
