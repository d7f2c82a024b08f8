/*
 * This file is part of Pinmap.
 *
 * Copyright (C) 2026 Pinmap contributors
 *
 * Pinmap is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Pinmap is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Pinmap. If not, see <https://www.gnu.org/licenses/>.
 */

use std::path::{Path, PathBuf};

use pinmap::batch::{convert_dir, convert_file, BatchOptions};
use pinmap::logger;
use pinmap::resonance::{build_report, load_csv_file};
use pinmap::wizard::{load_state, save_state, StateStore};

fn usage() -> ! {
    eprintln!("usage: pinmap <command> [options]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  boards <dir> [--out <dir>] [--source <str>] [--toolboard]");
    eprintln!("      convert every .cfg board file in <dir> to <id>.json");
    eprintln!("  board <file> [--source <str>] [--toolboard]");
    eprintln!("      convert one board file and print the JSON record");
    eprintln!("  resonance <csv>");
    eprintln!("      load a resonance CSV and print the ranked shaper report");
    eprintln!("  state get <key> | set <key> <value> | del <key> | list [prefix]");
    eprintln!("      read or update the wizard state store");
    eprintln!();
    eprintln!("global options: --logging (append JSON event lines to the log file)");
    std::process::exit(2);
}

fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter().position(|a| a == name).and_then(|i| args.get(i + 1)).cloned()
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--logging") {
        logger::init_logging();
        logger::log_event("startup", serde_json::json!({ "args": args }));
    }

    match args.get(1).map(|s| s.as_str()) {
        Some("boards") => {
            let Some(dir) = args.get(2).filter(|a| !a.starts_with("--")) else {
                usage();
            };
            let opts = BatchOptions {
                out_dir: flag_value(&args, "--out").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
                source: flag_value(&args, "--source").unwrap_or_default(),
                toolboard: args.iter().any(|a| a == "--toolboard"),
            };
            let report = convert_dir(Path::new(dir), &opts)?;
            for file in &report.processed {
                println!("processed {}", file);
            }
            for (file, reason) in &report.skipped {
                println!("skipped   {} ({})", file, reason);
            }
            println!(
                "{} board(s) converted, {} skipped",
                report.processed.len(),
                report.skipped.len()
            );
            Ok(())
        }
        Some("board") => {
            let Some(file) = args.get(2).filter(|a| !a.starts_with("--")) else {
                usage();
            };
            let opts = BatchOptions {
                out_dir: PathBuf::from("."),
                source: flag_value(&args, "--source").unwrap_or_default(),
                toolboard: args.iter().any(|a| a == "--toolboard"),
            };
            let board = convert_file(Path::new(file), &opts)?;
            println!("{}", serde_json::to_string_pretty(&board)?);
            Ok(())
        }
        Some("resonance") => {
            let Some(file) = args.get(2).filter(|a| !a.starts_with("--")) else {
                usage();
            };
            let samples = load_csv_file(Path::new(file))?;
            let report = build_report(&samples);
            logger::log_event(
                "resonance_report",
                serde_json::json!({
                    "file": file,
                    "samples": samples.len(),
                    "recommended": report.recommended,
                }),
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Some("state") => run_state_command(&args),
        _ => usage(),
    }
}

fn run_state_command(args: &[String]) -> anyhow::Result<()> {
    let mut store = load_state().unwrap_or_else(StateStore::new);
    match args.get(2).map(|s| s.as_str()) {
        Some("get") => {
            let Some(key) = args.get(3) else { usage() };
            match store.get(key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
                None => {
                    eprintln!("no value for {}", key);
                    std::process::exit(1);
                }
            }
        }
        Some("set") => {
            let (Some(key), Some(raw)) = (args.get(3), args.get(4)) else {
                usage()
            };
            // Accept JSON literals; anything unparseable is stored as a string.
            let value = serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.clone()));
            store.set(key, value)?;
            save_state(&store)?;
            logger::log_event("state_set", serde_json::json!({ "key": key }));
        }
        Some("del") => {
            let Some(key) = args.get(3) else { usage() };
            if store.remove(key).is_none() {
                eprintln!("no value for {}", key);
                std::process::exit(1);
            }
            save_state(&store)?;
            logger::log_event("state_del", serde_json::json!({ "key": key }));
        }
        Some("list") => {
            let keys: Vec<&str> = match args.get(3) {
                Some(prefix) => store.keys_with_prefix(prefix),
                None => store.values.keys().map(|k| k.as_str()).collect(),
            };
            for key in keys {
                println!("{}", key);
            }
        }
        _ => usage(),
    }
    Ok(())
}
