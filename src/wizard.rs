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
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid state key: {0}")]
    InvalidKey(String),
}

/// Wizard answers keyed by dot-delimited configuration paths, e.g.
/// `printer.kinematics` or `steppers.x.current`. The downstream template
/// engine reads this store together with the board JSON.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateStore {
    pub version: u32,
    pub values: BTreeMap<String, Value>,
}

impl StateStore {
    pub fn new() -> Self {
        Self { version: 1, values: BTreeMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<(), StateError> {
        if !is_valid_key(key) {
            return Err(StateError::InvalidKey(key.to_string()));
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// All keys under a dot-path prefix, e.g. prefix "steppers" matches
    /// "steppers.x.current" but not "steppers_old".
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.values
            .keys()
            .filter(|k| {
                k.as_str() == prefix
                    || (k.starts_with(prefix) && k[prefix.len()..].starts_with('.'))
            })
            .map(|k| k.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Keys are dot-separated segments of lowercase alphanumerics and
/// underscores; nothing else reaches the template engine.
pub fn is_valid_key(key: &str) -> bool {
    if key.is_empty() || key.len() > 128 {
        return false;
    }
    key.split('.').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    })
}

pub fn state_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("pinmap").join("state.json");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home).join(".config").join("pinmap").join("state.json");
    }
    PathBuf::from("/etc/pinmap/state.json")
}

pub fn load_state() -> Option<StateStore> {
    load_state_from(&state_path())
}

pub fn load_state_from(path: &Path) -> Option<StateStore> {
    let data = fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

/// Persist the store, keeping a `.bak` copy of the previous file so a bad
/// wizard run can be rolled back.
pub fn save_state(store: &StateStore) -> io::Result<()> {
    save_state_to(store, &state_path())
}

pub fn save_state_to(store: &StateStore, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if path.exists() {
        let backup = path.with_extension("json.bak");
        let _ = fs::copy(path, backup);
    }
    let json = serde_json::to_string_pretty(store).unwrap_or_else(|_| "{}".to_string());
    fs::write(path, json)
}
