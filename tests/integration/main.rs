//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host with no real
//! hardware required.

mod app_service_tests;
mod command_tests;
mod mock_hw;
mod runtime_scheduler_tests;
mod store_concurrency_tests;
