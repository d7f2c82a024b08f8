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

use lazy_static::lazy_static;
use regex::Regex;

use crate::aliases::AliasMap;
use crate::board::{BoardRecord, PortMap, PortRecord};

/// Build the canonical board record from a raw alias map.
///
/// Pure and total: malformed or unknown alias keys are skipped, never
/// errors, and the output depends only on the key/value strings themselves,
/// not on map iteration order.
pub fn classify(name: &str, source: &str, aliases: &AliasMap, is_toolboard: bool) -> BoardRecord {
    let mut board = BoardRecord::new(name, source);
    board.motor_ports = motor_ports(aliases, is_toolboard);
    board.heater_ports = heater_ports(aliases);
    board.fan_ports = fan_ports(aliases);
    board.thermistor_ports = thermistor_ports(aliases);
    board.endstop_ports = endstop_ports(aliases);
    board.filament_ports = filament_ports(aliases);
    board.misc_ports = misc_ports(aliases);
    if is_toolboard {
        board.mcu_name = Some("toolboard".to_string());
    }
    board
}

fn strip_mcu(key: &str) -> &str {
    key.strip_prefix("MCU_").unwrap_or(key)
}

/// Extract the numeric middle of a key given fixed prefix and suffix,
/// e.g. ("STOP2", "STOP", "") -> 2 and ("DRIVE0_STOP", "DRIVE", "_STOP") -> 0.
fn extract_index(key: &str, prefix: &str, suffix: &str) -> Option<usize> {
    if key.starts_with(prefix) && key.ends_with(suffix) && key.len() > prefix.len() + suffix.len() {
        key[prefix.len()..key.len() - suffix.len()].parse().ok()
    } else {
        None
    }
}

// ============================================================================
// Motor ports
// ============================================================================

#[derive(Debug, Copy, Clone)]
enum MotorConvention {
    /// MOTORn / Mn / Sn / STEPPERn / DRIVEn
    Numbered,
    /// HV_STEPPERn high-voltage driver bank
    HighVoltage,
    /// XM_ / X_MOT_ / X_ fixed-axis slots
    Axis,
    /// En_ bare extruder slots
    Extruder,
}

lazy_static! {
    /// Ordered motor rule table, first pattern match wins per key. The order
    /// is load-bearing: numbered conventions come before HV_STEPPER, before
    /// DRIVE, before the axis-letter conventions, before bare En_ keys.
    static ref MOTOR_RULES: Vec<(Regex, MotorConvention)> = vec![
        (Regex::new(r"^MOTOR(\d+)_(.+)$").unwrap(), MotorConvention::Numbered),
        (Regex::new(r"^M(\d+)_(.+)$").unwrap(), MotorConvention::Numbered),
        (Regex::new(r"^S(\d+)_(.+)$").unwrap(), MotorConvention::Numbered),
        (Regex::new(r"^STEPPER(\d+)_(.+)$").unwrap(), MotorConvention::Numbered),
        (Regex::new(r"^HV_STEPPER(\d+)_(.+)$").unwrap(), MotorConvention::HighVoltage),
        (Regex::new(r"^DRIVE(\d+)_(.+)$").unwrap(), MotorConvention::Numbered),
        (Regex::new(r"^([XYZ])M_(.+)$").unwrap(), MotorConvention::Axis),
        (Regex::new(r"^([XYZ])_MOT_(.+)$").unwrap(), MotorConvention::Axis),
        (Regex::new(r"^([XYZ])_(.+)$").unwrap(), MotorConvention::Axis),
        (Regex::new(r"^E(\d+)_(.+)$").unwrap(), MotorConvention::Extruder),
    ];
}

/// Toolboards expose a single driver under these fixed alias names.
const TOOLBOARD_DRIVER_STEP: &str = "MCU_TMCDRIVER_STEP";
const TOOLBOARD_DRIVER_DIR: &str = "MCU_TMCDRIVER_DIR";
const TOOLBOARD_DRIVER_ENABLE: &str = "MCU_TMCDRIVER_ENABLE";
const TOOLBOARD_DRIVER_UART: &str = "MCU_TMCDRIVER_UART";

#[derive(Debug, Copy, Clone)]
enum MotorRole {
    Step,
    Dir,
    Enable,
    Uart,
    ChipSelect,
}

/// Fixed role table over the captured key suffix, lower-cased. Suffixes that
/// are not driver roles leave the key unmatched for this category.
fn parse_motor_role(suffix: &str) -> Option<MotorRole> {
    match suffix {
        "step" => Some(MotorRole::Step),
        "dir" => Some(MotorRole::Dir),
        "enable" | "en" => Some(MotorRole::Enable),
        "uart" => Some(MotorRole::Uart),
        "cs" | "cs_pdn" => Some(MotorRole::ChipSelect),
        _ => None,
    }
}

/// UART and chip-select share one physical wire on the supported driver
/// boards, so either role fills both fields.
fn apply_motor_role(port: &mut PortRecord, role: MotorRole, pin: &str) {
    match role {
        MotorRole::Step => port.step_pin = Some(pin.to_string()),
        MotorRole::Dir => port.dir_pin = Some(pin.to_string()),
        MotorRole::Enable => port.enable_pin = Some(pin.to_string()),
        MotorRole::Uart | MotorRole::ChipSelect => {
            port.uart_pin = Some(pin.to_string());
            port.cs_pin = Some(pin.to_string());
        }
    }
}

fn motor_port_identity(convention: MotorConvention, captured: &str) -> (String, String) {
    match convention {
        MotorConvention::Numbered => (format!("MOTOR_{}", captured), format!("Driver {}", captured)),
        MotorConvention::HighVoltage => {
            (format!("MOTOR_HV{}", captured), format!("Driver HV{}", captured))
        }
        MotorConvention::Axis => (format!("MOTOR_{}", captured), format!("{} Stepper", captured)),
        MotorConvention::Extruder => {
            (format!("MOTOR_E{}", captured), format!("Extruder E{}", captured))
        }
    }
}

pub fn motor_ports(aliases: &AliasMap, is_toolboard: bool) -> PortMap {
    // Single-driver toolboards bypass the general rule table entirely.
    if is_toolboard && aliases.contains_key(TOOLBOARD_DRIVER_STEP) {
        return toolboard_motor_port(aliases);
    }

    let mut ports = PortMap::new();
    for (key, pin) in aliases {
        let key = strip_mcu(key);
        for (pattern, convention) in MOTOR_RULES.iter() {
            let Some(caps) = pattern.captures(key) else {
                continue;
            };
            // First pattern match wins, even when the suffix turns out not
            // to be a driver role (e.g. M1_STOP belongs to the endstops).
            if let Some(role) = parse_motor_role(&caps[2].to_ascii_lowercase()) {
                let (id, label) = motor_port_identity(*convention, &caps[1]);
                let port = ports.entry(id).or_insert_with(|| PortRecord::labeled(label));
                apply_motor_role(port, role, pin);
            }
            break;
        }
    }
    ports
}

fn toolboard_motor_port(aliases: &AliasMap) -> PortMap {
    let mut port = PortRecord::labeled("Extruder");
    if let Some(pin) = aliases.get(TOOLBOARD_DRIVER_STEP) {
        port.step_pin = Some(pin.clone());
    }
    if let Some(pin) = aliases.get(TOOLBOARD_DRIVER_DIR) {
        port.dir_pin = Some(pin.clone());
    }
    if let Some(pin) = aliases.get(TOOLBOARD_DRIVER_ENABLE) {
        port.enable_pin = Some(pin.clone());
    }
    if let Some(pin) = aliases.get(TOOLBOARD_DRIVER_UART) {
        port.uart_pin = Some(pin.clone());
        port.cs_pin = Some(pin.clone());
    }
    let mut ports = PortMap::new();
    ports.insert("EXTRUDER".to_string(), port);
    ports
}

// ============================================================================
// Heater ports
// ============================================================================

const BED_HEATER_KEYS: &[&str] = &["BED", "HEATBED", "HEATER_BED", "HOT_BED"];
const HOTEND_HEATER_PREFIXES: &[&str] = &["HOTEND", "HEATER", "HEAT", "HE"];

pub fn heater_ports(aliases: &AliasMap) -> PortMap {
    let mut ports = PortMap::new();
    for (key, pin) in aliases {
        let key = strip_mcu(key);
        if BED_HEATER_KEYS.contains(&key) {
            ports.insert("BED".to_string(), PortRecord::pwm_output("Heated Bed", pin));
            continue;
        }
        for prefix in HOTEND_HEATER_PREFIXES {
            if let Some(idx) = extract_index(key, prefix, "") {
                ports.insert(
                    format!("HE{}", idx),
                    PortRecord::pwm_output(format!("Hotend {}", idx), pin),
                );
                break;
            }
        }
    }
    ports
}

// ============================================================================
// Fan ports
// ============================================================================

pub fn fan_ports(aliases: &AliasMap) -> PortMap {
    let mut ports = PortMap::new();
    for (key, pin) in aliases {
        let key = strip_mcu(key);
        if let Some(idx) = extract_index(key, "FAN", "") {
            ports.insert(format!("FAN{}", idx), PortRecord::pwm_output(format!("Fan {}", idx), pin));
        }
    }
    ports
}

// ============================================================================
// Thermistor ports
// ============================================================================

const BED_THERMISTOR_KEYS: &[&str] = &["TB", "THB", "T_BED"];
const THERMISTOR_PREFIXES: &[&str] = &["THERM", "TH", "T"];

pub fn thermistor_ports(aliases: &AliasMap) -> PortMap {
    let mut ports = PortMap::new();
    for (key, pin) in aliases {
        let key = strip_mcu(key);
        if BED_THERMISTOR_KEYS.contains(&key) {
            ports.insert("TB".to_string(), PortRecord::with_pin("Bed Thermistor", pin));
            continue;
        }
        for prefix in THERMISTOR_PREFIXES {
            if let Some(idx) = extract_index(key, prefix, "") {
                ports.insert(
                    format!("T{}", idx),
                    PortRecord::with_pin(format!("Thermistor {}", idx), pin),
                );
                break;
            }
        }
    }
    ports
}

// ============================================================================
// Endstop ports
// ============================================================================

const PROBE_KEYS: &[&str] =
    &["PROBE", "Z_PROBE", "ZPROBE", "IND_PROBE", "INDUCTIVE_PROBE", "BLTOUCH"];

fn axis_of(key: &str) -> Option<char> {
    let c = key.chars().next()?;
    matches!(c, 'X' | 'Y' | 'Z').then_some(c)
}

/// The ~12 endstop naming conventions, tried as one ordered chain. The key
/// shapes are disjoint, but ordering still matters: a DRIVEn_STOP key must
/// never fall through to the generic numbered STOP rule, and the dedicated
/// probe names must win over the numbered PROBE rule.
fn endstop_identity(key: &str) -> Option<(String, String)> {
    if let Some(n) = extract_index(key, "DRIVE", "_STOP") {
        return Some((format!("DRIVE{}_STOP", n), format!("Drive {} Endstop", n)));
    }
    if let Some(n) = extract_index(key, "M", "_STOP") {
        return Some((format!("M{}_STOP", n), format!("Motor {} Endstop", n)));
    }
    if let Some(rest) = key.strip_prefix("STOP_") {
        if rest.len() == 1 {
            if let Some(axis) = axis_of(rest) {
                return Some((format!("{}_STOP", axis), format!("{} Endstop", axis)));
            }
        }
    }
    if let Some(n) = extract_index(key, "STOP", "") {
        return Some((format!("STOP{}", n), format!("Endstop {}", n)));
    }
    if let Some(axis) = axis_of(key) {
        let rest = &key[1..];
        match rest {
            "_MIN" => return Some((format!("{}_MIN", axis), format!("{} Min", axis))),
            "_MAX" => return Some((format!("{}_MAX", axis), format!("{} Max", axis))),
            "STOP" | "_STOP" => {
                return Some((format!("{}_STOP", axis), format!("{} Endstop", axis)))
            }
            _ => {}
        }
    }
    for suffix in ["_STOP", "STOP"] {
        if let Some(n) = extract_index(key, "E", suffix) {
            return Some((format!("E{}_STOP", n), format!("Extruder {} Endstop", n)));
        }
    }
    if PROBE_KEYS.contains(&key) {
        return Some(("PROBE".to_string(), "Probe".to_string()));
    }
    if let Some(n) = extract_index(key, "PROBE", "") {
        return Some((format!("PROBE{}", n), format!("Probe {}", n)));
    }
    if let Some(n) = extract_index(key, "MIN", "") {
        return Some((format!("MIN{}", n), format!("Min {}", n)));
    }
    None
}

pub fn endstop_ports(aliases: &AliasMap) -> PortMap {
    let mut ports = PortMap::new();
    for (key, pin) in aliases {
        if let Some((id, label)) = endstop_identity(strip_mcu(key)) {
            ports.insert(id, PortRecord::with_pin(label, pin));
        }
    }
    ports
}

// ============================================================================
// Filament sensor ports
// ============================================================================

const FILAMENT_PREFIXES: &[&str] = &["FIL_DET_", "FIL_DET", "FILAMENT", "RUNOUT"];
const FILAMENT_BARE_KEYS: &[&str] = &["FIL_DET", "RUNOUT"];

pub fn filament_ports(aliases: &AliasMap) -> PortMap {
    let mut ports = PortMap::new();
    for (key, pin) in aliases {
        let key = strip_mcu(key);
        let idx = if FILAMENT_BARE_KEYS.contains(&key) {
            Some(0)
        } else {
            FILAMENT_PREFIXES.iter().find_map(|p| extract_index(key, p, ""))
        };
        if let Some(idx) = idx {
            ports.insert(
                format!("FIL_DET_{}", idx),
                PortRecord::with_pin(format!("Filament Sensor {}", idx), pin),
            );
        }
    }
    ports
}

// ============================================================================
// Misc ports
// ============================================================================

const MISC_RULES: &[(&[&str], &str, &str)] = &[
    (&["NEOPIXEL", "RGB", "RGBLED"], "NEOPIXEL", "Neopixel"),
    (&["SERVOS", "SERVO"], "SERVOS", "Servo"),
    (&["BEEPER", "BUZZER"], "BEEPER", "Beeper"),
    (&["PS_ON"], "PS_ON", "Power Supply Control"),
    (&["PWR_DET"], "PWR_DET", "Power Detect"),
];

pub fn misc_ports(aliases: &AliasMap) -> PortMap {
    let mut ports = PortMap::new();
    for (key, pin) in aliases {
        let key = strip_mcu(key);
        for (names, id, label) in MISC_RULES {
            if names.contains(&key) {
                ports.insert(id.to_string(), PortRecord::with_pin(*label, pin));
                break;
            }
        }
    }
    ports
}
