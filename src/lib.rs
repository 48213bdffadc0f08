//! FeedFish firmware library.
//!
//! Exposes the wake-cycle logic and its adapters for integration testing
//! and host simulation.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod retained;
pub mod retry;
pub mod scheduler;

pub mod adapters;
pub mod drivers;
pub mod sensors;
