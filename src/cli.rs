use anyhow::{Result, anyhow};
use log::warn;
use pico_args::Arguments;
use std::{
    env,
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
    process::Command,
};

use crate::actions::{IntentSink, JsonLinesSink, LogSink};
use crate::config::{DaemonConfigState, Profile};
use crate::ipc;
use crate::replay::{ReplayOptions, replay};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            match topic {
                Some(t) => print_subcmd_help(&t),
                None => print_help(),
            }
            Ok(())
        }

        Some("start") => {
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("arcanum: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => send("shutdown"),
        Some("status") => send("status"),
        Some("begin") => send("begin"),
        Some("reset") => send("reset"),
        Some("reload") => send("reload"),
        Some("list") => send("list"),
        Some("doctor") => send("doctor"),
        Some("layout") => send("layout"),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: arcanum use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op": "use", "profile": name}))?;
            print_response(&r);
            Ok(())
        }

        Some("design") => {
            let dir: String = pargs.free_from_str().unwrap_or_else(|_| "next".into());
            if dir != "next" && dir != "prev" {
                return Err(anyhow!("usage: arcanum design <next|prev>"));
            }
            let r = ipc::client_request(serde_json::json!({"op": "design", "dir": dir}))?;
            print_response(&r);
            Ok(())
        }

        Some("replay") => {
            let seed: Option<u64> = pargs.opt_value_from_str("--seed")?;
            let with_layout = pargs.contains("--layout");
            let intents: Option<PathBuf> = pargs.opt_value_from_str("--intents")?;
            let path: PathBuf = pargs.free_from_str().map_err(|_| {
                anyhow!("usage: arcanum replay <trace.jsonl> [--seed N] [--layout] [--intents FILE]")
            })?;
            let trace = BufReader::new(
                File::open(&path).map_err(|e| anyhow!("cannot open {}: {e}", path.display()))?,
            );
            let profile = active_profile();
            let mut sink = intent_sink(intents.as_deref())?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let summary = replay(
                &profile,
                trace,
                &mut out,
                sink.as_mut(),
                &ReplayOptions { seed, with_layout },
            )?;
            eprintln!(
                "replayed {} frames: {} transitions, {} intents, {} rejected",
                summary.frames, summary.transitions, summary.intents, summary.rejected
            );
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

fn send(op: &str) -> Result<()> {
    let r = ipc::client_request(serde_json::json!({ "op": op }))?;
    print_response(&r);
    Ok(())
}

/// Replay runs without a daemon, so it reads the profile tree directly.
fn active_profile() -> Profile {
    match DaemonConfigState::load_or_install_default() {
        Ok(cfg) => cfg.profile,
        Err(e) => {
            warn!("using built-in profile: {e}");
            Profile::default()
        }
    }
}

/// Intents go to a JSON-lines file for a sound/text collaborator when one
/// is named, otherwise to the log.
fn intent_sink(path: Option<&Path>) -> Result<Box<dyn IntentSink>> {
    match path {
        Some(p) => {
            let file =
                File::create(p).map_err(|e| anyhow!("cannot create {}: {e}", p.display()))?;
            Ok(Box::new(JsonLinesSink::new(file)))
        }
        None => Ok(Box::new(LogSink)),
    }
}

fn print_help() {
    println!(
        r#"arcanum: gesture-driven tarot reading engine

USAGE:
  arcanum help [command]                  Show general or command-specific help
  arcanum start                           Start the daemon
  arcanum stop                            Stop the daemon
  arcanum status                          Show reading state and lock countdown
  arcanum begin                           Leave the intro and stack the deck
  arcanum reset                           Return to the intro screen
  arcanum layout                          Print every card's transform
  arcanum design <next|prev>              Cycle the card-back design
  arcanum reload                          Reload active profile
  arcanum use <name>                      Switch active profile
  arcanum list                            List profiles
  arcanum doctor                          Diagnose config and socket
  arcanum replay <trace> [--seed N] [--layout] [--intents FILE]
                                          Run a recorded landmark trace offline

TIPS:
  - Profiles: ~/.config/arcanum/profiles
  - Active profile pointer: ~/.config/arcanum/active
  - Socket: ~/.local/run/arcanum.sock
  - RUST_LOG=debug for per-tick detail
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: arcanum start\nStarts the background daemon."),
        "stop" => println!("usage: arcanum stop\nStops the running daemon."),
        "status" => println!(
            "usage: arcanum status\nShows state, instruction, gesture, selected card and lock countdown."
        ),
        "begin" => println!("usage: arcanum begin\nMoves from the intro screen to the stacked deck."),
        "reset" => println!(
            "usage: arcanum reset\nReturns to the intro screen and reshuffles the scatter."
        ),
        "layout" => println!("usage: arcanum layout\nPrints the current transform of all 22 cards."),
        "design" => println!("usage: arcanum design <next|prev>\nCycles the card-back design."),
        "reload" => println!(
            "usage: arcanum reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: arcanum use <name>\nSwitches active profile to <name> and restarts the reading.")
        }
        "list" => println!("usage: arcanum list\nLists available profiles and the active one."),
        "doctor" => println!(
            "usage: arcanum doctor\nChecks the config tree, the active profile and the socket."
        ),
        "replay" => println!(
            "usage: arcanum replay <trace.jsonl> [--seed N] [--layout] [--intents FILE]\nFeeds a JSON-lines trace through a fresh session and prints one tick per frame.\n--intents writes every emitted intent to FILE as JSON lines."
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Intent;

    #[test]
    fn test_intents_file_sink() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("intents.jsonl");
        {
            let mut sink = intent_sink(Some(&path)).unwrap();
            sink.deliver(&Intent::PlayShuffleSound).unwrap();
            sink.deliver(&Intent::BeginInterpretation { card_id: 4 }).unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, [
            r#"{"intent":"PLAY_SHUFFLE_SOUND"}"#,
            r#"{"intent":"BEGIN_INTERPRETATION","card_id":4}"#,
        ]);
    }

    #[test]
    fn test_intents_file_in_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let err = intent_sink(Some(&tmp.path().join("nope").join("i.jsonl")))
            .err()
            .unwrap();
        assert!(err.to_string().contains("cannot create"));
    }
}
