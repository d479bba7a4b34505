use anyhow::{Result, anyhow};
use log::info;
use pico_args::Arguments;
use std::{env, fs::File, io::BufReader};

use crate::actions::LogSink;
use crate::config::ProfileStore;
use crate::host::{pipeline, replay};
use crate::input;
use crate::sim::Simulation;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // Options shared by several subcommands; pico-args wants them taken
    // before the free arguments.
    let profile: Option<String> = pargs.opt_value_from_str("--profile")?;
    let device: Option<String> = pargs.opt_value_from_str("--device")?;
    let dry_run = pargs.contains("--dry-run");

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => {
            let store = open_store(profile.as_deref())?;
            info!(
                "using profile {} ({})",
                store.active_name,
                store.profile.meta.name.as_deref().unwrap_or("unnamed")
            );
            pipeline::run_pipeline(store, pipeline::PipelineOptions { device, dry_run })
        }

        Some("replay") => {
            let path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: calcdrift replay <script.jsonl> [--profile NAME]"))?;
            let store = open_store(profile.as_deref())?;
            let p = &store.profile;
            let mut sim = Simulation::new(p.sim_params(), p.keyboard_layout()?);
            let file = File::open(&path).map_err(|e| anyhow!("failed to open {path}: {e}"))?;
            let mut sink = LogSink::default();
            let summary = replay::run_replay(
                BufReader::new(file),
                &mut sim,
                &mut sink,
                std::io::stdout().lock(),
            )?;
            info!(
                "replayed {} events ({} frames, {} activations)",
                summary.events, summary.frames, summary.activations
            );
            Ok(())
        }

        Some("devices") => {
            let devices = input::discover_pointers();
            if devices.is_empty() {
                println!("no relative pointer devices found");
            }
            for d in devices {
                println!("{}\t{}", d.path, d.name);
            }
            Ok(())
        }

        Some("profiles") => {
            let store = ProfileStore::load_or_install_default()?;
            for name in store.list_profiles() {
                let mark = if name == store.active_name { "*" } else { " " };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: calcdrift use <profile_name>"))?;
            let mut store = ProfileStore::load_or_install_default()?;
            store.set_active(&name)?;
            println!("ok: active profile is now {name}");
            Ok(())
        }

        Some("doctor") => {
            let store = ProfileStore::load_or_install_default()?;
            print_response(&store.doctor_report());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn open_store(profile: Option<&str>) -> Result<ProfileStore> {
    let mut store = ProfileStore::load_or_install_default()?;
    if let Some(name) = profile {
        store.select(name)?;
    }
    Ok(store)
}

fn print_help() {
    println!(
        r#"calcdrift — inertial pointer for a calculator keypad

USAGE:
  calcdrift help [command]                  Show general or command-specific help
  calcdrift run [--device PATH] [--dry-run] Capture a mouse and drive the pointer
  calcdrift replay <script.jsonl>           Run an event script headlessly
  calcdrift devices                         List relative pointer devices
  calcdrift profiles                        List profiles
  calcdrift use <name>                      Switch active profile
  calcdrift doctor                          Diagnose permissions/devices

OPTIONS:
  --profile NAME                            Use NAME for this run only

CONTROLS (run):
  mouse left/right                          Steer the heading
  push mouse away (negative dY)             Accelerate along the heading
  left button                               Press the key under the pointer
  right button                              Toggle capture

TIPS:
  - Profiles: ~/.config/calcdrift/profiles
  - Active profile pointer: ~/.config/calcdrift/active
  - RUST_LOG=trace shows every frame
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: calcdrift run [--device PATH] [--profile NAME] [--dry-run]\nGrabs the pointer and presses bound keys through uinput. The active profile is reloaded when its file changes."
        ),
        "replay" => println!(
            "usage: calcdrift replay <script.jsonl> [--profile NAME]\nLines: {{\"lock\":true}}, {{\"move\":{{\"dx\":0,\"dy\":-10,\"at\":20}}}} (at is optional), {{\"frame\":16}}, \"activate\".\nPrints a JSON snapshot for every frame that moves the pointer."
        ),
        "devices" => println!("usage: calcdrift devices\nLists devices with REL_X/REL_Y and a left button."),
        "profiles" => {
            println!("usage: calcdrift profiles\nLists available profiles; marks active with '*'.")
        }
        "use" => {
            println!("usage: calcdrift use <name>\nSwitches the active profile to <name>.")
        }
        "doctor" => println!(
            "usage: calcdrift doctor\nChecks uinput, input group membership and pointer devices."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
