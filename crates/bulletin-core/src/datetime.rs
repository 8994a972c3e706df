use chrono::{
  DateTime,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;

use crate::config::{
  Config,
  DEFAULT_DATE_FORMAT
};

const TIMEZONE_ENV_VAR: &str =
  "BULLETIN_TIMEZONE";

/// `toISOString` layout: millisecond precision, always `Z`.
pub const ISO_FORMAT: &str =
  "%Y-%m-%dT%H:%M:%S%.3fZ";
const DISPLAY_FORMAT: &str =
  "%B %-d, %Y at %-I:%M %p";

#[must_use]
pub fn to_iso(
  dt: DateTime<Utc>
) -> String {
  dt.format(ISO_FORMAT).to_string()
}

/// Accepts any RFC 3339 instant (`Z`, offsets, micro or milli seconds),
/// normalized to UTC.
#[must_use]
pub fn parse_iso(
  raw: &str
) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(
    raw.trim()
  )
  .ok()
  .map(|dt| dt.with_timezone(&Utc))
}

/// Locale-aware date handling for form fields and screens.
#[derive(Debug, Clone)]
pub struct DateFormat {
  pattern:  String,
  timezone: Tz
}

impl DateFormat {
  pub fn new(
    pattern: impl Into<String>,
    timezone: Tz
  ) -> Self {
    Self {
      pattern: pattern.into(),
      timezone
    }
  }

  pub fn from_config(
    cfg: &Config
  ) -> Self {
    let pattern = cfg
      .get("date.format")
      .unwrap_or_else(|| {
        DEFAULT_DATE_FORMAT.to_string()
      });
    let timezone = resolve_timezone(
      cfg.get("date.timezone").as_deref()
    );
    Self::new(pattern, timezone)
  }

  pub fn timezone(&self) -> Tz {
    self.timezone
  }

  /// Parses a form field. Empty or unparseable input yields `None`.
  pub fn parse_input(
    &self,
    raw: &str
  ) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return None;
    }

    let naive =
      NaiveDateTime::parse_from_str(
        trimmed,
        &self.pattern
      )
      .ok()
      .or_else(|| {
        NaiveDate::parse_from_str(
          trimmed,
          &self.pattern
        )
        .ok()
        .map(|date| {
          date.and_time(NaiveTime::MIN)
        })
      });

    match naive {
      | Some(naive) => {
        self.localize(naive)
      }
      | None => {
        let parsed = parse_iso(trimmed);
        if parsed.is_none() {
          tracing::debug!(
            input = %trimmed,
            pattern = %self.pattern,
            "date field did not parse; treating as empty"
          );
        }
        parsed
      }
    }
  }

  /// Renders an instant back into the form field layout.
  #[must_use]
  pub fn format_input(
    &self,
    dt: DateTime<Utc>
  ) -> String {
    dt.with_timezone(&self.timezone)
      .format(&self.pattern)
      .to_string()
  }

  /// `October 18, 2026 at 9:05 AM`
  #[must_use]
  pub fn format_display(
    &self,
    dt: DateTime<Utc>
  ) -> String {
    dt.with_timezone(&self.timezone)
      .format(DISPLAY_FORMAT)
      .to_string()
  }

  fn localize(
    &self,
    naive: NaiveDateTime
  ) -> Option<DateTime<Utc>> {
    match self
      .timezone
      .from_local_datetime(&naive)
    {
      | LocalResult::Single(dt) => {
        Some(dt.with_timezone(&Utc))
      }
      | LocalResult::Ambiguous(
        earliest,
        _
      ) => {
        Some(
          earliest.with_timezone(&Utc)
        )
      }
      | LocalResult::None => {
        tracing::debug!(
          local = %naive,
          timezone = %self.timezone,
          "local time does not exist in timezone"
        );
        None
      }
    }
  }
}

impl Default for DateFormat {
  fn default() -> Self {
    Self::new(
      DEFAULT_DATE_FORMAT,
      chrono_tz::UTC
    )
  }
}

pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "date.timezone")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved display timezone"
      );
      Some(tz)
    }
    | Err(error) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        %error,
        "invalid timezone; ignoring"
      );
      None
    }
  }
}

pub mod iso_date_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer
      .serialize_str(&super::to_iso(*dt))
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_iso(&raw).ok_or_else(
      || {
        serde::de::Error::custom(
          format!(
            "invalid ISO-8601 instant: \
             {raw}"
          )
        )
      }
    )
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw) => {
          super::super::parse_iso(&raw)
            .map(Some)
            .ok_or_else(|| {
              serde::de::Error::custom(
                format!(
                  "invalid ISO-8601 \
                   instant: {raw}"
                )
              )
            })
        }
        | None => Ok(None)
      }
    }
  }
}
