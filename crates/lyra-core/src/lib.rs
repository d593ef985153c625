//! Foundational low-level utilities shared across Lyra crates.
//!
//! Provides the wall-clock helpers used for message timestamps, conversation
//! bookkeeping, and hour-of-day routing signals.

pub mod time_utils;

pub use time_utils::{current_hour_of_day, current_unix_timestamp, current_unix_timestamp_ms};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_utils_round_trip_bounds() {
        let now_s = current_unix_timestamp();
        let now_ms = current_unix_timestamp_ms();
        let now_ms_s = now_ms / 1_000;
        assert!(now_ms_s >= now_s);
        assert!(now_ms_s <= now_s.saturating_add(1));
    }

    #[test]
    fn hour_of_day_is_in_range() {
        let hour = current_hour_of_day();
        assert!(hour <= 23);
    }
}
