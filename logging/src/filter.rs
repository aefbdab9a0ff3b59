// src/filter.rs
//! Filters decide whether a call or event proceeds.
//!
//! `Accept` and `Deny` are final. `Neutral` defers to the next stage.

use crate::context::ThreadContext;
use crate::level::Level;
use crate::map::ContextValue;
use crate::marker::Marker;
use crate::model::LogEvent;

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterResult {
  Accept,
  Neutral,
  Deny,
}

/// What a filter can see of a call before an event has been built.
#[derive(Debug, Clone, Copy)]
pub struct FilterInput<'a> {
  pub logger_name: &'a str,
  pub level: Level,
  pub marker: Option<&'a Marker>,
  /// The unformatted message pattern.
  pub message: Option<&'a str>,
}

pub trait Filter: Send + Sync + fmt::Debug {
  fn filter(&self, input: &FilterInput<'_>) -> FilterResult;

  /// Filters a built event. Defaults to [`filter`](Self::filter) on the
  /// event's fields.
  fn filter_event(&self, event: &LogEvent) -> FilterResult {
    self.filter(&FilterInput {
      logger_name: &event.logger_name,
      level: event.level,
      marker: event.marker.as_ref(),
      message: Some(&event.message),
    })
  }
}

fn decide(matched: bool, on_match: FilterResult, on_mismatch: FilterResult) -> FilterResult {
  if matched {
    on_match
  } else {
    on_mismatch
  }
}

/// Matches calls at `level` or more severe.
#[derive(Debug, Clone)]
pub struct ThresholdFilter {
  pub level: Level,
  pub on_match: FilterResult,
  pub on_mismatch: FilterResult,
}

impl ThresholdFilter {
  pub fn new(level: Level) -> Self {
    Self {
      level,
      on_match: FilterResult::Neutral,
      on_mismatch: FilterResult::Deny,
    }
  }

  pub fn with_results(level: Level, on_match: FilterResult, on_mismatch: FilterResult) -> Self {
    Self {
      level,
      on_match,
      on_mismatch,
    }
  }
}

impl Filter for ThresholdFilter {
  fn filter(&self, input: &FilterInput<'_>) -> FilterResult {
    decide(
      input.level.is_less_specific_than(self.level),
      self.on_match,
      self.on_mismatch,
    )
  }
}

/// Matches calls carrying a marker that is, or descends from, `marker`.
#[derive(Debug, Clone)]
pub struct MarkerFilter {
  pub marker: String,
  pub on_match: FilterResult,
  pub on_mismatch: FilterResult,
}

impl Filter for MarkerFilter {
  fn filter(&self, input: &FilterInput<'_>) -> FilterResult {
    let matched = input
      .marker
      .is_some_and(|m| m.is_instance_of(&self.marker));
    decide(matched, self.on_match, self.on_mismatch)
  }
}

/// Matches when the context data holds `key` with the value `value`.
///
/// Before an event exists the calling thread's live context is consulted;
/// for a built event its own context data is.
#[derive(Debug, Clone)]
pub struct ContextMapFilter {
  pub key: String,
  pub value: String,
  pub on_match: FilterResult,
  pub on_mismatch: FilterResult,
}

impl ContextMapFilter {
  fn matches(&self, value: Option<&ContextValue>) -> bool {
    value.is_some_and(|v| v.to_string() == self.value)
  }
}

impl Filter for ContextMapFilter {
  fn filter(&self, _input: &FilterInput<'_>) -> FilterResult {
    let mut matched = false;
    ThreadContext::with_live_view(|live| {
      matched = self.matches(live.get(self.key.as_str()));
    });
    decide(matched, self.on_match, self.on_mismatch)
  }

  fn filter_event(&self, event: &LogEvent) -> FilterResult {
    decide(
      self.matches(event.context_data.get(self.key.as_str())),
      self.on_match,
      self.on_mismatch,
    )
  }
}

/// Runs filters in order; the first non-neutral result wins.
#[derive(Debug, Clone, Default)]
pub struct CompositeFilter {
  filters: Vec<Arc<dyn Filter>>,
}

impl CompositeFilter {
  pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
    Self { filters }
  }

  pub fn filters(&self) -> &[Arc<dyn Filter>] {
    &self.filters
  }
}

impl Filter for CompositeFilter {
  fn filter(&self, input: &FilterInput<'_>) -> FilterResult {
    self
      .filters
      .iter()
      .map(|f| f.filter(input))
      .find(|r| *r != FilterResult::Neutral)
      .unwrap_or(FilterResult::Neutral)
  }

  fn filter_event(&self, event: &LogEvent) -> FilterResult {
    self
      .filters
      .iter()
      .map(|f| f.filter_event(event))
      .find(|r| *r != FilterResult::Neutral)
      .unwrap_or(FilterResult::Neutral)
  }
}
