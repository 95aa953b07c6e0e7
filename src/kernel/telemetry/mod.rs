//! Generation telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer. The controller writes to it but
//! never reads it back when deciding a transition.
//!
//! # PRIVACY INVARIANT
//! Events carry session ids, states and counts only. Never recording ids,
//! audio URLs or server error text.

pub mod event;
pub mod metrics;
pub mod recorder;
