/// Cadence of status queries while a job is generating.
pub const POLL_INTERVAL_MS: u64 = 2_000;

/// Poll budget. 60 ticks at 2s is roughly two minutes of wall time.
pub const MAX_POLLS: u32 = 60;

/// Cadence of position autosaves while audio is playing.
pub const AUTOSAVE_INTERVAL_MS: u64 = 5_000;

const PROGRESS_STEP: u32 = 10;
const PROGRESS_CEILING: u32 = 90;

pub const PROGRESS_COMPLETE: u8 = 100;

/// Synthetic progress estimate for a job still generating.
///
/// The server exposes no real progress, so this only counts polls. It
/// saturates at 90 so that 100 is reserved for `Ready`.
pub fn synthetic_progress(poll_count: u32) -> u8 {
    poll_count
        .saturating_mul(PROGRESS_STEP)
        .min(PROGRESS_CEILING) as u8
}
