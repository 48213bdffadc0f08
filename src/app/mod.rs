//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the rules of the wake cycle: the boot dispatcher,
//! the events it reports, and the telemetry it publishes.  All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
