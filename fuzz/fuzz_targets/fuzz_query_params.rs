//! Fuzz target: query string → `AppCommand` → `ConfigStore`
//!
//! Whatever the query, a parsed command applied to the store must leave
//! every settings invariant intact, and a rejected one must change nothing.
//!
//! cargo fuzz run fuzz_query_params

#![no_main]

use ccsource::app::commands::{AppCommand, CommandRoute};
use ccsource::app::params::Params;
use ccsource::app::ports::SensorPort;
use ccsource::error::SensorError;
use ccsource::store::ConfigStore;
use libfuzzer_sys::fuzz_target;

struct NullSensor;

impl SensorPort for NullSensor {
    fn read_bus_voltage(&mut self) -> f32 {
        0.0
    }

    fn read_current(&mut self) -> f32 {
        0.0
    }

    fn calibrate(&mut self, max_amps: f32, _shunt_ohms: f32) -> Result<(), SensorError> {
        if max_amps > 0.0 {
            Ok(())
        } else {
            Err(SensorError::CalibrationRejected)
        }
    }
}

const ROUTES: [CommandRoute; 4] = [
    CommandRoute::ReadSnapshot,
    CommandRoute::SetTarget,
    CommandRoute::SetTunings,
    CommandRoute::SetAdvanced,
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(query) = core::str::from_utf8(rest) else {
        return;
    };
    let route = ROUTES[usize::from(selector) % ROUTES.len()];

    let store = ConfigStore::new(0.1);
    let before = store.snapshot();
    let params = Params::parse(query);

    let outcome = AppCommand::parse(route, &params)
        .map_err(ccsource::error::Error::from)
        .and_then(|cmd| cmd.apply(&store, &mut NullSensor));

    let after = store.snapshot();
    assert!(after.is_consistent(), "{after:?}");
    if outcome.is_err() {
        assert_eq!(after, before);
    }
});
