// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring for the trysite server binary.

pub mod jobs;
pub mod settings;
pub mod telemetry;
pub mod version;
