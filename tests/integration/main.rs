//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific part of the
//! wake cycle against mock adapters.  All tests run on the host (x86_64)
//! with no real hardware required.

mod board_smoke_tests;
mod boot_cycle_tests;
mod low_battery_tests;
mod mock_device;
