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

use serde::{Deserialize, Serialize};

/// One addressable connector on a board. Role fields are absent (not null)
/// when the source alias map carried no pin for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortRecord {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir_pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uart_pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cs_pin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pwm: Option<bool>,
}

impl PortRecord {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_pin(label: impl Into<String>, pin: &str) -> Self {
        let mut port = Self::labeled(label);
        port.pin = Some(pin.to_string());
        port
    }

    pub fn pwm_output(label: impl Into<String>, pin: &str) -> Self {
        let mut port = Self::with_pin(label, pin);
        port.pwm = Some(true);
        port
    }
}

pub type PortMap = BTreeMap<String, PortRecord>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Manufacturer {
    BigTreeTech,
    Fysetc,
    Mellow,
    #[serde(rename = "LDO")]
    Ldo,
    Creality,
    #[serde(rename = "MKS")]
    Mks,
    Other,
}

/// Ordered vendor substrings checked against the lowercased board name.
/// First match wins.
const VENDOR_RULES: &[(&str, Manufacturer)] = &[
    ("bigtreetech", Manufacturer::BigTreeTech),
    ("btt", Manufacturer::BigTreeTech),
    ("fysetc", Manufacturer::Fysetc),
    ("mellow", Manufacturer::Mellow),
    ("fly", Manufacturer::Mellow),
    ("ldo", Manufacturer::Ldo),
    ("creality", Manufacturer::Creality),
    ("mks", Manufacturer::Mks),
    ("makerbase", Manufacturer::Mks),
];

pub fn infer_manufacturer(board_name: &str) -> Manufacturer {
    let name = board_name.to_ascii_lowercase();
    for (needle, vendor) in VENDOR_RULES {
        if name.contains(needle) {
            return *vendor;
        }
    }
    Manufacturer::Other
}

/// Lowercase-hyphenated id derived from a board name. Runs of
/// non-alphanumeric characters collapse into a single hyphen; a name with no
/// usable characters falls back to "board" so batch output stays addressable.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    if slug.is_empty() {
        return "board".to_string();
    }
    slug
}

/// Canonical output record for one board, fully determined by the alias map
/// plus the toolboard flag. Built once, serialized, discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardRecord {
    pub id: String,
    pub name: String,
    pub manufacturer: Manufacturer,
    pub source: String,
    pub motor_ports: PortMap,
    pub heater_ports: PortMap,
    pub fan_ports: PortMap,
    pub thermistor_ports: PortMap,
    pub endstop_ports: PortMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filament_ports: PortMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub misc_ports: PortMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcu_name: Option<String>,
}

impl BoardRecord {
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            id: slugify(name),
            name: name.to_string(),
            manufacturer: infer_manufacturer(name),
            source: source.to_string(),
            motor_ports: PortMap::new(),
            heater_ports: PortMap::new(),
            fan_ports: PortMap::new(),
            thermistor_ports: PortMap::new(),
            endstop_ports: PortMap::new(),
            filament_ports: PortMap::new(),
            misc_ports: PortMap::new(),
            mcu_name: None,
        }
    }
}
