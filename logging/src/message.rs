// src/message.rs

use std::fmt;

/// The payload of a log call.
///
/// Parameterized messages keep their arguments pre-rendered and substitute
/// them into `{}` placeholders only when formatted. A placeholder preceded by
/// a backslash (`\{}`) is emitted literally.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
  Simple(String),
  Parameterized { pattern: String, args: Vec<String> },
}

impl Message {
  pub fn simple(text: impl Into<String>) -> Self {
    Message::Simple(text.into())
  }

  pub fn parameterized(pattern: impl Into<String>, args: &[&dyn fmt::Display]) -> Self {
    Message::Parameterized {
      pattern: pattern.into(),
      args: args.iter().map(|a| a.to_string()).collect(),
    }
  }

  /// The unformatted pattern (or the text of a simple message).
  pub fn pattern(&self) -> &str {
    match self {
      Message::Simple(text) => text,
      Message::Parameterized { pattern, .. } => pattern,
    }
  }

  pub fn formatted(&self) -> String {
    match self {
      Message::Simple(text) => text.clone(),
      Message::Parameterized { pattern, args } => {
        let mut out = String::with_capacity(pattern.len() + args.len() * 8);
        format_into(&mut out, pattern, args);
        out
      }
    }
  }
}

fn format_into(out: &mut String, pattern: &str, args: &[String]) {
  let bytes = pattern.as_bytes();
  let mut next_arg = 0;
  let mut i = 0;
  let mut literal_start = 0;

  while i < bytes.len() {
    if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'{') && bytes.get(i + 2) == Some(&b'}') {
      out.push_str(&pattern[literal_start..i]);
      out.push_str("{}");
      i += 3;
      literal_start = i;
    } else if bytes[i] == b'{' && bytes.get(i + 1) == Some(&b'}') {
      out.push_str(&pattern[literal_start..i]);
      match args.get(next_arg) {
        Some(arg) => out.push_str(arg),
        None => out.push_str("{}"),
      }
      next_arg += 1;
      i += 2;
      literal_start = i;
    } else {
      i += 1;
    }
  }
  out.push_str(&pattern[literal_start..]);
}

impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Message::Simple(text) => f.write_str(text),
      Message::Parameterized { .. } => f.write_str(&self.formatted()),
    }
  }
}

impl From<&str> for Message {
  fn from(text: &str) -> Self {
    Message::Simple(text.to_string())
  }
}

impl From<String> for Message {
  fn from(text: String) -> Self {
    Message::Simple(text)
  }
}

impl From<fmt::Arguments<'_>> for Message {
  fn from(args: fmt::Arguments<'_>) -> Self {
    match args.as_str() {
      Some(s) => Message::Simple(s.to_string()),
      None => Message::Simple(args.to_string()),
    }
  }
}

/// Builds messages for a logger. Loggers are keyed by name and factory name,
/// so two loggers with the same name but different factories are distinct.
pub trait MessageFactory: Send + Sync + fmt::Debug {
  fn name(&self) -> &'static str;

  fn new_message(&self, pattern: &str, args: &[&dyn fmt::Display]) -> Message;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ParameterizedMessageFactory;

impl MessageFactory for ParameterizedMessageFactory {
  fn name(&self) -> &'static str {
    "parameterized"
  }

  fn new_message(&self, pattern: &str, args: &[&dyn fmt::Display]) -> Message {
    if args.is_empty() {
      Message::simple(pattern)
    } else {
      Message::parameterized(pattern, args)
    }
  }
}

/// Ignores arguments and treats the pattern as plain text.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleMessageFactory;

impl MessageFactory for SimpleMessageFactory {
  fn name(&self) -> &'static str {
    "simple"
  }

  fn new_message(&self, pattern: &str, _args: &[&dyn fmt::Display]) -> Message {
    Message::simple(pattern)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn substitutes_placeholders_in_order() {
    let msg = Message::parameterized("user {} logged in from {}", &[&"alice", &42]);
    assert_eq!(msg.formatted(), "user alice logged in from 42");
    assert_eq!(msg.pattern(), "user {} logged in from {}");
  }

  #[test]
  fn escaped_and_surplus_placeholders_stay_literal() {
    let msg = Message::parameterized("a \\{} b {} c {}", &[&1]);
    assert_eq!(msg.formatted(), "a {} b 1 c {}");
  }

  #[test]
  fn factories_differ_on_arguments() {
    let args: [&dyn fmt::Display; 1] = [&"x"];
    assert_eq!(
      ParameterizedMessageFactory.new_message("v={}", &args).formatted(),
      "v=x"
    );
    assert_eq!(
      SimpleMessageFactory.new_message("v={}", &args).formatted(),
      "v={}"
    );
  }

  #[test]
  fn from_arguments_uses_static_str_when_possible() {
    let msg = Message::from(format_args!("plain"));
    assert_eq!(msg, Message::Simple("plain".to_string()));
    let n = 3;
    assert_eq!(Message::from(format_args!("n={}", n)).formatted(), "n=3");
  }
}
