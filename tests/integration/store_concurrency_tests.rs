//! ConfigStore shared between a command thread and readers.
//!
//! Readers must never observe a half-applied update: gains are written
//! as a triple with equal values, and the ceiling/setpoint pair must keep
//! `setpoint <= max_limit` on every snapshot.

use std::sync::atomic::{AtomicBool, Ordering};

use ccsource::app::ports::SensorPort;
use ccsource::config::{Settings, Tunings};
use ccsource::error::SensorError;
use ccsource::store::{AdvancedUpdate, ConfigStore};

/// Sensor that accepts any range.
struct AcceptAll;

impl SensorPort for AcceptAll {
    fn read_bus_voltage(&mut self) -> f32 {
        0.0
    }

    fn read_current(&mut self) -> f32 {
        0.0
    }

    fn calibrate(&mut self, _max_amps: f32, _shunt_ohms: f32) -> Result<(), SensorError> {
        Ok(())
    }
}

const ROUNDS: u32 = 2_000;

fn check(s: &Settings) {
    assert!(s.is_consistent(), "inconsistent snapshot: {s:?}");
    assert!(s.setpoint_ma <= s.max_limit_ma, "{s:?}");
    let Tunings { kp, ki, kd } = s.tunings;
    assert!(kp == ki && ki == kd, "torn tunings: {kp} {ki} {kd}");
}

#[test]
fn readers_never_see_torn_updates() {
    let store = ConfigStore::with_settings(
        Settings {
            tunings: Tunings { kp: 1.0, ki: 1.0, kd: 1.0 },
            ..Settings::default()
        },
        0.1,
    );
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let mut sensor = AcceptAll;
            for i in 0..ROUNDS {
                let g = (i % 50) as f32;
                store
                    .set_tunings(Tunings { kp: g, ki: g, kd: g })
                    .unwrap();
                store.set_target((i % 700) as f32);
                let max = 50.0 + (i % 9) as f32 * 50.0;
                store
                    .set_advanced(
                        AdvancedUpdate {
                            max_limit_ma: Some(max),
                            interval_secs: Some(0.1 + (i % 5) as f32),
                        },
                        &mut sensor,
                    )
                    .unwrap();
            }
            done.store(true, Ordering::Release);
        });

        for _ in 0..3 {
            scope.spawn(|| {
                let mut seen = 0u32;
                while !done.load(Ordering::Acquire) || seen == 0 {
                    check(&store.snapshot());
                    seen += 1;
                }
            });
        }
    });

    check(&store.snapshot());
}

#[test]
fn concurrent_targets_respect_the_ceiling() {
    let store = ConfigStore::new(0.1);

    std::thread::scope(|scope| {
        for t in 0..4u32 {
            let store = &store;
            scope.spawn(move || {
                for i in 0..ROUNDS {
                    store.set_target((t * 1000 + i) as f32);
                    let s = store.snapshot();
                    assert!(s.setpoint_ma <= s.max_limit_ma);
                }
            });
        }
    });

    assert_eq!(store.snapshot().setpoint_ma, 500.0);
}

#[test]
fn transaction_is_exclusive() {
    let store = ConfigStore::new(0.1);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..ROUNDS {
                    store.transaction(|s| s.sample_interval_ms += 1);
                }
            });
        }
    });

    assert_eq!(store.snapshot().sample_interval_ms, 1000 + 4 * ROUNDS);
}
