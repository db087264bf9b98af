//! Baselines of normal machine behavior
//!
//! A baseline is computed once per profile (speed or trajectory) from
//! recordings of the machine running healthy, then shared read-only with
//! the anomaly engine.

mod loader;
mod record;
mod registry;

pub use loader::BaselineLoader;
pub use record::{
    BaselineRecord, RateBaseline, TemperatureBaseline, VibrationBaseline,
    DEFAULT_SAMPLING_RATE_HZ, MIN_SAMPLES_FOR_RATE,
};
pub use registry::{compare_profile_keys, ProfileKey, ProfileRegistry};
