use std::fs;
use std::path::PathBuf;

use chrono::{
  DateTime,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "ticklist-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "TICKLIST_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "TICKLIST_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Picks the zone used for every
/// displayed date: the rc `timezone`
/// key, then `$TICKLIST_TIMEZONE`,
/// then `ticklist-time.toml`, then UTC.
pub fn resolve_display_timezone(
  configured: Option<&str>
) -> Tz {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "rc")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  tracing::debug!(
    "no display timezone configured; \
     using UTC"
  );
  chrono_tz::UTC
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured display timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Short en-US stamp shown on each
/// row, e.g. `10/18/26, 3:05 PM`.
#[must_use]
pub fn format_created(
  dt: DateTime<Utc>,
  tz: &Tz
) -> String {
  dt.with_timezone(tz)
    .format("%-m/%-d/%y, %-I:%M %p")
    .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockView {
  pub date: String,
  pub time: String
}

/// Date/time header refreshed on every
/// tick of the session loop.
#[derive(Debug, Clone)]
pub struct Clock {
  tz:      Tz,
  current: Option<ClockView>
}

impl Clock {
  pub fn new(tz: Tz) -> Self {
    Self {
      tz,
      current: None
    }
  }

  #[must_use]
  pub fn read(
    &self,
    now: DateTime<Utc>
  ) -> ClockView {
    let local = now.with_timezone(&self.tz);
    ClockView {
      date: local
        .format("%A, %B %-d, %Y")
        .to_string(),
      time: local
        .format("%I:%M:%S %p")
        .to_string()
    }
  }

  /// Recomputes the header. Returns
  /// true when the visible text changed.
  pub fn tick(
    &mut self,
    now: DateTime<Utc>
  ) -> bool {
    let next = self.read(now);
    let changed = self.current.as_ref()
      != Some(&next);
    self.current = Some(next);
    changed
  }

  pub fn current(
    &self
  ) -> Option<&ClockView> {
    self.current.as_ref()
  }
}
