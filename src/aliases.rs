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

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Alias name -> physical pin designator. Read-only once built; iteration
/// order must never influence classification, so a BTreeMap keeps output
/// stable regardless of source ordering.
pub type AliasMap = BTreeMap<String, String>;

/// Marker line that opens the alias block inside a board config file.
pub const ALIAS_MARKER: &str = "aliases:";

#[derive(Error, Debug)]
pub enum AliasError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("no '{ALIAS_MARKER}' section in input")]
    MissingSection,
}

/// Extract the alias block from board config text.
///
/// The block starts at the fixed marker line and runs through the following
/// indented continuation lines. Pairs are `KEY=VALUE` tokens separated by
/// commas and/or whitespace; `#` starts a comment. Values beginning with `<`
/// are unresolved placeholders (power/ground markers and the like) and are
/// dropped here so the classifier never sees them.
pub fn parse_alias_block(text: &str) -> Result<AliasMap, AliasError> {
    let mut aliases = AliasMap::new();
    let mut in_block = false;
    let mut found_marker = false;

    for line in text.lines() {
        let stripped = strip_comment(line);
        if !in_block {
            let trimmed = stripped.trim_start();
            if let Some(rest) = trimmed.strip_prefix(ALIAS_MARKER) {
                in_block = true;
                found_marker = true;
                collect_pairs(rest, &mut aliases);
            }
            continue;
        }

        // Continuation lines are indented; anything else ends the block.
        if stripped.trim().is_empty() {
            continue;
        }
        if !stripped.starts_with(' ') && !stripped.starts_with('\t') {
            in_block = false;
            continue;
        }
        collect_pairs(stripped, &mut aliases);
    }

    if !found_marker {
        return Err(AliasError::MissingSection);
    }
    Ok(aliases)
}

pub fn load_alias_file(path: &Path) -> Result<AliasMap, AliasError> {
    let text = fs::read_to_string(path)?;
    parse_alias_block(&text)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn collect_pairs(fragment: &str, aliases: &mut AliasMap) {
    for token in fragment.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        if value.starts_with('<') {
            // unresolved placeholder, e.g. <GND> or <5V>
            continue;
        }
        aliases.insert(key.to_string(), value.to_string());
    }
}
