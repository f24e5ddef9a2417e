//! Settings module
//!
//! Holds the user-tunable session parameters, their validation rules,
//! and best-effort persistence to a JSON file.

mod model;
mod store;
mod writer;

pub use model::{
    phase_seconds_in_range, SetClamp, Settings, MAX_PHASE_SECONDS, MIN_PHASE_SECONDS,
    PREP_SECONDS, SESSION_CAP_SECONDS,
};
pub use store::SettingsStore;
pub use writer::SettingsWriter;
