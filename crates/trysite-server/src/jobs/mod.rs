// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod pool_maintenance;

pub use pool_maintenance::PoolMaintenanceJob;
