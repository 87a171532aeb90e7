// SPDX-FileCopyrightText: 2026 Replyq Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hourly volume buckets.

use chrono::{DateTime, Duration, Utc};

/// Number of trailing hours in the volume view.
pub const HOURS_IN_VIEW: usize = 24;

/// Bucket label for the hour containing `at`, `YYYY-MM-DD-HH` in UTC.
pub fn hour_label(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d-%H").to_string()
}

/// Store key of the counter for the hour containing `at`.
pub fn volume_key(at: DateTime<Utc>) -> String {
    bucket_key(&hour_label(at))
}

/// Store key of the counter for an hour label.
pub fn bucket_key(label: &str) -> String {
    format!("processing:volume:{label}")
}

/// Labels of the trailing 24 hours, oldest first, ending at the hour of `now`.
pub fn trailing_hours(now: DateTime<Utc>) -> Vec<String> {
    (0..HOURS_IN_VIEW as i64)
        .rev()
        .map(|back| hour_label(now - Duration::hours(back)))
        .collect()
}
