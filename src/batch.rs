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

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;

use crate::aliases::{load_alias_file, AliasError};
use crate::board::BoardRecord;
use crate::classify::classify;
use crate::logger;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Alias(#[from] AliasError),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub out_dir: PathBuf,
    pub source: String,
    pub toolboard: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            source: String::new(),
            toolboard: false,
        }
    }
}

/// Outcome of one directory run: which board files produced JSON and which
/// were skipped, with the reason. A skip never aborts the batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

/// Derive a human-readable board name from a config file path:
/// "btt-octopus-v1.1.cfg" -> "btt octopus v1.1".
pub fn board_name_from_path(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("board");
    stem.replace(['-', '_'], " ")
}

/// Single-driver alias present only on toolboard-class boards.
const TOOLBOARD_MARKER_ALIAS: &str = "MCU_TMCDRIVER_STEP";

/// Convert one board config file into its canonical record.
pub fn convert_file(path: &Path, opts: &BatchOptions) -> Result<BoardRecord, BatchError> {
    let aliases = load_alias_file(path)?;
    let name = board_name_from_path(path);
    let is_toolboard = opts.toolboard || aliases.contains_key(TOOLBOARD_MARKER_ALIAS);
    Ok(classify(&name, &opts.source, &aliases, is_toolboard))
}

/// Convert every `.cfg` file in a directory, writing `<id>.json` per board
/// into the output directory. Files are processed independently and in
/// sorted order for a stable report; unreadable or marker-less files are
/// recorded as skipped.
pub fn convert_dir(dir: &Path, opts: &BatchOptions) -> Result<BatchReport, BatchError> {
    if !dir.is_dir() {
        return Err(BatchError::NotADirectory(dir.to_path_buf()));
    }
    fs::create_dir_all(&opts.out_dir)?;

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("cfg"))
        .collect();
    paths.sort();

    let mut report = BatchReport::default();
    for path in paths {
        let display = path.file_name().and_then(|s| s.to_str()).unwrap_or("?").to_string();
        match convert_file(&path, opts) {
            Ok(board) => {
                let out_path = opts.out_dir.join(format!("{}.json", board.id));
                let json = serde_json::to_string_pretty(&board)
                    .unwrap_or_else(|_| "{}".to_string());
                fs::write(&out_path, json)?;
                logger::log_event(
                    "board_converted",
                    json!({
                        "file": display,
                        "id": board.id,
                        "motor_ports": board.motor_ports.len(),
                        "endstop_ports": board.endstop_ports.len(),
                    }),
                );
                report.processed.push(display);
            }
            Err(e) => {
                logger::log_event(
                    "board_skipped",
                    json!({ "file": display, "reason": e.to_string() }),
                );
                report.skipped.push((display, e.to_string()));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GOOD_CFG: &str = "\
[board_pins]
aliases:
    MCU_MOTOR0_STEP=PF13, MCU_MOTOR0_DIR=PF12, MCU_MOTOR0_UART=PC4,
    MCU_HE0=PA2, MCU_FAN0=PA8, MCU_TH0=PF4, MCU_STOP0=PG6
";

    fn options(dir: &TempDir) -> BatchOptions {
        BatchOptions {
            out_dir: dir.path().join("out"),
            source: "unit test".to_string(),
            toolboard: false,
        }
    }

    #[test]
    fn test_board_name_from_path() {
        assert_eq!(
            board_name_from_path(Path::new("/boards/btt-octopus-v1.1.cfg")),
            "btt octopus v1.1"
        );
        assert_eq!(board_name_from_path(Path::new("mks_monster8.cfg")), "mks monster8");
    }

    #[test]
    fn test_convert_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("btt-octopus-v1.1.cfg");
        fs::write(&path, GOOD_CFG).unwrap();

        let board = convert_file(&path, &options(&dir)).unwrap();
        assert_eq!(board.id, "btt-octopus-v1-1");
        assert_eq!(board.source, "unit test");
        assert!(board.motor_ports.contains_key("MOTOR_0"));
        assert!(board.heater_ports.contains_key("HE0"));
    }

    #[test]
    fn test_convert_file_auto_detects_toolboard() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("btt-ebb36.cfg");
        fs::write(&path, "aliases:\n    MCU_TMCDRIVER_STEP=PD0, MCU_TMCDRIVER_DIR=PD1\n")
            .unwrap();

        let board = convert_file(&path, &options(&dir)).unwrap();
        assert_eq!(board.mcu_name.as_deref(), Some("toolboard"));
        assert!(board.motor_ports.contains_key("EXTRUDER"));
    }

    #[test]
    fn test_convert_dir_reports_processed_and_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good-board.cfg"), GOOD_CFG).unwrap();
        fs::write(dir.path().join("no-aliases.cfg"), "[mcu]\nserial=/dev/ttyACM0\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a cfg").unwrap();

        let opts = options(&dir);
        let report = convert_dir(dir.path(), &opts).unwrap();
        assert_eq!(report.processed, vec!["good-board.cfg"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "no-aliases.cfg");

        let out = opts.out_dir.join("good-board.json");
        assert!(out.exists());
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(parsed["id"], "good-board");
        assert_eq!(parsed["motor_ports"]["MOTOR_0"]["uart_pin"], "PC4");
        assert_eq!(parsed["motor_ports"]["MOTOR_0"]["cs_pin"], "PC4");
    }

    #[test]
    fn test_convert_dir_rejects_non_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.cfg");
        fs::write(&file, GOOD_CFG).unwrap();
        assert!(matches!(
            convert_dir(&file, &options(&dir)),
            Err(BatchError::NotADirectory(_))
        ));
    }
}
