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

//! Pinmap - normalize 3D printer board definitions into canonical JSON
//!
//! This library classifies vendor-specific pin-alias names into a canonical
//! port schema, converts resonance-test CSV data into ranked input-shaper
//! reports, and manages the wizard state consumed by a firmware-config
//! generator.

pub mod aliases;
pub mod batch;
pub mod board;
pub mod classify;
pub mod logger;
pub mod resonance;
pub mod wizard;
