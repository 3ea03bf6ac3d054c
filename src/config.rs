use crate::report::DEFAULT_NAME_WIDTH;

/// Environment variable holding a comma separated list of kind names whose
/// live instances should be indexed from the start.
pub const TRACK_ENV_VAR: &str = "OBJTRACKER_TRACK";

/// Controls how a registry indexes instances and renders reports.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
  /// Column width for kind names in the text rendering.
  pub name_width: usize,
  /// Kinds whose live-instance index is enabled when the registry is built.
  pub tracked_kinds: Vec<String>,
  /// Whether negative allocated counts are logged when a report is composed.
  pub warn_on_negative: bool,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      name_width: DEFAULT_NAME_WIDTH,
      tracked_kinds: Vec::new(),
      warn_on_negative: true,
    }
  }
}

impl TrackerConfig {
  /// Defaults, plus any kinds listed in [`TRACK_ENV_VAR`].
  #[must_use]
  pub fn from_env() -> Self {
    Self::from_track_value(std::env::var(TRACK_ENV_VAR).ok().as_deref())
  }

  fn from_track_value(value: Option<&str>) -> Self {
    let config = Self::default();

    match value {
      Some(value) => config.with_tracked_kinds(parse_kind_list(value)),
      None => config,
    }
  }

  #[must_use]
  pub fn track(mut self, kind_name: impl Into<String>) -> Self {
    self.tracked_kinds.push(kind_name.into());
    self
  }

  #[must_use]
  pub fn with_name_width(mut self, width: usize) -> Self {
    self.name_width = width;
    self
  }

  #[must_use]
  pub fn with_tracked_kinds<I>(mut self, kinds: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<String>,
  {
    self.tracked_kinds.extend(kinds.into_iter().map(Into::into));
    self
  }

  #[must_use]
  pub fn with_warn_on_negative(mut self, warn: bool) -> Self {
    self.warn_on_negative = warn;
    self
  }
}

fn parse_kind_list(value: &str) -> Vec<String> {
  value
    .split(',')
    .map(str::trim)
    .filter(|name| !name.is_empty())
    .map(str::to_owned)
    .collect()
}
