//! Generation lifecycle: pure session state plus the async controller that
//! drives it against the generation API.

pub mod controller;
pub mod effect;
pub mod error;
pub mod event;
pub mod registry;
pub mod state;
pub mod telemetry;
pub mod time;
