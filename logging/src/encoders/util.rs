// src/encoders/util.rs
//! Timestamp rendering shared by layouts.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write;

/// `2024-03-09T22:05:07.123Z`
pub fn write_rfc3339(out: &mut String, timestamp: &DateTime<Utc>) {
  out.push_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true));
}

/// Renders with a chrono `strftime` format. A format chrono rejects leaves
/// `out` as it was.
pub fn write_strftime(out: &mut String, timestamp: &DateTime<Utc>, format: &str) {
  let len_before = out.len();
  if write!(out, "{}", timestamp.format(format)).is_err() {
    out.truncate(len_before);
  }
}
