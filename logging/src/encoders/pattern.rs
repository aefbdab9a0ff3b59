// src/encoders/pattern.rs

use super::{util, EventFormatter};
use crate::error::Result;
use crate::model::LogEvent;
use crate::scratch;

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;

pub const DEFAULT_PATTERN: &str = "%d %-5p [%t] %c - %m%n";

// `%[-][width]<letter>[{arg}]`, or the `%%` escape.
static CONVERSION_REGEX: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"%(?:(?P<width>-?\d+)?(?P<kind>[a-zA-Z])(?:\{(?P<arg>[^}]+)\})?|(?P<percent>%))")
    .expect("conversion regex is valid")
});

#[derive(Debug, PartialEq)]
enum Piece {
  Text(String),
  Convert(Conversion),
}

/// One `%` conversion. A negative width left-aligns.
#[derive(Debug, PartialEq)]
struct Conversion {
  kind: char,
  width: Option<i32>,
  arg: Option<String>,
}

/// Formats events according to a conversion pattern.
///
/// | Conversion | Output |
/// |-----------|--------|
/// | `%d`, `%d{fmt}` | timestamp (RFC 3339, or a chrono format) |
/// | `%p`, `%l` | level |
/// | `%c` | logger name |
/// | `%t` | thread name |
/// | `%T` | thread id |
/// | `%m` | message |
/// | `%e` | attached error |
/// | `%M` | marker |
/// | `%X`, `%X{key}` | all context data, or one key |
/// | `%x` | context stack |
/// | `%F`, `%L` | source file and line, when captured |
/// | `%n` | newline |
///
/// A width such as `%-5p` left-aligns and `%5p` right-aligns.
#[derive(Debug)]
pub struct PatternLayout {
  pieces: Vec<Piece>,
}

impl PatternLayout {
  pub fn new(pattern: &str) -> Self {
    Self {
      pieces: compile(pattern),
    }
  }

  fn render(&self, out: &mut String, event: &LogEvent) {
    for piece in &self.pieces {
      match piece {
        Piece::Text(text) => out.push_str(text),
        Piece::Convert(conversion) if conversion.kind == 'n' => out.push('\n'),
        Piece::Convert(conversion) => match conversion.width {
          None => write_conversion(out, conversion, event),
          Some(width) => scratch::with_buffer(|field| {
            write_conversion(field, conversion, event);
            pad(out, field, width);
          }),
        },
      }
    }
  }
}

impl Default for PatternLayout {
  fn default() -> Self {
    Self::new(DEFAULT_PATTERN)
  }
}

impl EventFormatter for PatternLayout {
  fn format_event(&self, event: &LogEvent) -> Result<Vec<u8>> {
    let mut line = String::with_capacity(128 + event.message.len());
    self.render(&mut line, event);
    if !line.ends_with('\n') {
      line.push('\n');
    }
    Ok(line.into_bytes())
  }
}

fn compile(pattern: &str) -> Vec<Piece> {
  let mut pieces = Vec::new();
  let mut text = String::new();
  let mut cursor = 0;

  for caps in CONVERSION_REGEX.captures_iter(pattern) {
    let Some(whole) = caps.get(0) else {
      continue;
    };
    text.push_str(&pattern[cursor..whole.start()]);
    cursor = whole.end();

    if caps.name("percent").is_some() {
      text.push('%');
      continue;
    }
    let Some(kind) = caps.name("kind").and_then(|m| m.as_str().chars().next()) else {
      continue;
    };
    if !text.is_empty() {
      pieces.push(Piece::Text(std::mem::take(&mut text)));
    }
    pieces.push(Piece::Convert(Conversion {
      kind,
      width: caps.name("width").and_then(|m| m.as_str().parse().ok()),
      arg: caps.name("arg").map(|m| m.as_str().to_string()),
    }));
  }

  text.push_str(&pattern[cursor..]);
  if !text.is_empty() {
    pieces.push(Piece::Text(text));
  }
  pieces
}

fn write_conversion(out: &mut String, conversion: &Conversion, event: &LogEvent) {
  let optional = |out: &mut String, value: Option<&str>| {
    if let Some(value) = value {
      out.push_str(value);
    }
  };

  match conversion.kind {
    'd' => match &conversion.arg {
      Some(format) => util::write_strftime(out, &event.timestamp, format),
      None => util::write_rfc3339(out, &event.timestamp),
    },
    'p' | 'l' => out.push_str(event.level.as_str()),
    'c' => out.push_str(&event.logger_name),
    'm' => out.push_str(&event.message),
    'e' => optional(out, event.error.as_deref()),
    'M' => optional(out, event.marker.as_ref().map(|m| m.name())),
    't' => optional(out, event.thread_name.as_deref()),
    'T' => optional(out, event.thread_id.as_deref()),
    'X' => write_context_data(out, conversion.arg.as_deref(), event),
    'x' => {
      for (i, entry) in event.context_stack.iter().enumerate() {
        if i > 0 {
          out.push(' ');
        }
        out.push_str(entry);
      }
    }
    'F' => optional(out, event.location.as_ref().map(|l| l.file)),
    'L' => {
      if let Some(location) = &event.location {
        let _ = write!(out, "{}", location.line);
      }
    }
    // Unknown conversions render nothing.
    _ => {}
  }
}

fn write_context_data(out: &mut String, key: Option<&str>, event: &LogEvent) {
  if let Some(key) = key {
    if let Some(value) = event.context_data.get(key) {
      let _ = write!(out, "{}", value);
    }
    return;
  }
  if event.context_data.is_empty() {
    return;
  }
  out.push('{');
  event.context_data.for_each_with_state(
    |key, value, written: &mut usize| {
      if *written > 0 {
        out.push_str(", ");
      }
      *written += 1;
      let _ = write!(out, "{}={}", key.unwrap_or(""), value);
    },
    &mut 0,
  );
  out.push('}');
}

fn pad(out: &mut String, field: &str, width: i32) {
  let target = width.unsigned_abs() as usize;
  if field.chars().count() >= target {
    out.push_str(field);
  } else if width < 0 {
    let _ = write!(out, "{:<target$}", field);
  } else {
    let _ = write!(out, "{:>target$}", field);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::level::Level;
  use crate::map::{ContextValue, StringMap};
  use crate::marker::Marker;
  use crate::model::Location;
  use chrono::{TimeZone, Utc};
  use pretty_assertions::assert_eq;
  use std::sync::Arc;

  fn event() -> LogEvent {
    let mut event = LogEvent::new(Level::Warn, "billing::invoice", "invoice 17 rejected");
    event.timestamp = Utc.with_ymd_and_hms(2024, 3, 9, 22, 5, 7).unwrap();
    event.thread_name = Some("worker-2".to_string());
    event.thread_id = Some("9".to_string());
    event
  }

  fn render(pattern: &str, event: &LogEvent) -> String {
    String::from_utf8(PatternLayout::new(pattern).format_event(event).unwrap()).unwrap()
  }

  #[test]
  fn default_pattern() {
    assert_eq!(
      render(DEFAULT_PATTERN, &event()),
      "2024-03-09T22:05:07.000Z WARN  [worker-2] billing::invoice - invoice 17 rejected\n"
    );
  }

  #[test]
  fn timestamp_format_argument() {
    assert_eq!(render("%d{%H:%M:%S} %m", &event()), "22:05:07 invoice 17 rejected\n");
  }

  #[test]
  fn widths_align_both_ways() {
    assert_eq!(render("<%7p|%-7p|%2c>", &event()), "<   WARN|WARN   |billing::invoice>\n");
  }

  #[test]
  fn percent_escape_and_unknown_conversion() {
    assert_eq!(render("50%% %q%T", &event()), "50% 9\n");
  }

  #[test]
  fn context_data_and_stack() {
    let mut event = event();
    let mut data = StringMap::new();
    data.put("tenant", ContextValue::from("acme")).unwrap();
    data.put("attempt", ContextValue::Int(3)).unwrap();
    data.freeze();
    event.context_data = Arc::new(data);
    event.context_stack = vec!["http".to_string(), "charge".to_string()];

    assert_eq!(render("%X", &event), "{attempt=3, tenant=acme}\n");
    assert_eq!(render("[%X{tenant}][%X{absent}]", &event), "[acme][]\n");
    assert_eq!(render("%x", &event), "http charge\n");
  }

  #[test]
  fn empty_context_renders_nothing() {
    assert_eq!(render("[%X][%x]", &event()), "[][]\n");
  }

  #[test]
  fn marker_error_and_location() {
    let mut event = event();
    event.marker = Some(Marker::new("AUDIT"));
    event.error = Some("card declined".to_string());
    event.location = Some(Location {
      file: "src/billing.rs",
      line: 88,
      column: 13,
    });
    assert_eq!(
      render("%M %e (%F:%L)", &event),
      "AUDIT card declined (src/billing.rs:88)\n"
    );
  }

  #[test]
  fn compile_merges_adjacent_text() {
    let layout = PatternLayout::new("a%%b %-4c");
    assert_eq!(
      layout.pieces,
      vec![
        Piece::Text("a%b ".to_string()),
        Piece::Convert(Conversion {
          kind: 'c',
          width: Some(-4),
          arg: None,
        }),
      ]
    );
  }
}
