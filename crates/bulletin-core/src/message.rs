use std::fmt;

use anyhow::Context;
use bulletin_shared::{MessageDto, MessageWrite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::datetime::{iso_date_serde, parse_iso, to_iso};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown message level: {0}")]
pub struct UnknownLevel(pub String);

/// Severity of a message, numbered like Django's message levels.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub enum Level {
    #[default]
    Info,
    Success,
    Warning,
    Danger,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Info, Level::Success, Level::Warning, Level::Danger];

    pub fn value(self) -> i64 {
        match self {
            Level::Info => 20,
            Level::Success => 25,
            Level::Warning => 30,
            Level::Danger => 40,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Info => "Info",
            Level::Success => "Success",
            Level::Warning => "Warning",
            Level::Danger => "Danger",
        }
    }
}

impl TryFrom<i64> for Level {
    type Error = UnknownLevel;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Level::ALL
            .into_iter()
            .find(|level| level.value() == value)
            .ok_or_else(|| UnknownLevel(value.to_string()))
    }
}

impl From<Level> for i64 {
    fn from(level: Level) -> Self {
        level.value()
    }
}

impl std::str::FromStr for Level {
    type Err = UnknownLevel;

    /// Accepts a level name in any case, or its numeric value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Level::try_from(value);
        }
        Level::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownLevel(trimmed.to_string()))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishState {
    Published,
    Scheduled,
    Expired,
}

impl PublishState {
    pub fn label(self) -> &'static str {
        match self {
            PublishState::Published => "published",
            PublishState::Scheduled => "scheduled",
            PublishState::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: Option<u64>,
    pub content: String,
    pub level: Level,
    pub tags: Vec<String>,
    #[serde(with = "iso_date_serde::option")]
    pub begins: Option<DateTime<Utc>>,
    #[serde(with = "iso_date_serde::option")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(with = "iso_date_serde::option")]
    pub created: Option<DateTime<Utc>>,
    #[serde(with = "iso_date_serde::option")]
    pub modified: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
}

impl Message {
    /// Seed for the add form.
    pub fn blank(level: Level) -> Self {
        Self {
            id: None,
            content: String::new(),
            level,
            tags: vec![],
            begins: None,
            expires: None,
            created: None,
            modified: None,
            modified_by: None,
        }
    }

    /// A missing `begins` counts as already begun; a missing `expires`
    /// means open-ended.
    pub fn publish_state(&self, now: DateTime<Utc>) -> PublishState {
        if self.expires.is_some_and(|expires| expires <= now) {
            PublishState::Expired
        } else if self.begins.is_some_and(|begins| begins > now) {
            PublishState::Scheduled
        } else {
            PublishState::Published
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.publish_state(now) == PublishState::Expired
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag == name)
    }

    pub fn to_write(&self) -> MessageWrite {
        MessageWrite {
            content: self.content.clone(),
            level: self.level.value(),
            tags: self.tags.clone(),
            begins: self.begins.map(to_iso),
            expires: self.expires.map(to_iso),
        }
    }
}

impl TryFrom<MessageDto> for Message {
    type Error = anyhow::Error;

    fn try_from(dto: MessageDto) -> Result<Self, Self::Error> {
        let level = Level::try_from(dto.level)
            .with_context(|| format!("message {:?} has an unknown level", dto.id))?;
        Ok(Self {
            id: dto.id,
            content: dto.content,
            level,
            tags: dto.tags.into_iter().map(|tag| tag.name).collect(),
            begins: parse_optional_instant("begins", dto.begins.as_deref())?,
            expires: parse_optional_instant("expires", dto.expires.as_deref())?,
            created: parse_optional_instant("created", dto.created.as_deref())?,
            modified: parse_optional_instant("modified", dto.modified.as_deref())?,
            modified_by: dto.modified_by.filter(|name| !name.is_empty()),
        })
    }
}

fn parse_optional_instant(
    field: &str,
    raw: Option<&str>,
) -> anyhow::Result<Option<DateTime<Utc>>> {
    match raw {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => parse_iso(text)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("invalid {field} instant: {text}")),
    }
}
