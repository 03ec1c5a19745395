// ABOUTME: Library root re-exporting server modules for integration testing
// ABOUTME: Enables tests/ to access router, state, types, and handler modules
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 dravr.ai

pub mod api_types;
pub mod auth;
pub mod env;
pub mod proxy;
pub mod revoke;
pub mod router;
pub mod services;
pub mod sign;
pub mod state;
pub mod status;
