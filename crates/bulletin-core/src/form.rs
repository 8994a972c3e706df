use std::collections::BTreeSet;

use bulletin_shared::MessageWrite;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::datetime::{DateFormat, to_iso};
use crate::message::{Level, Message};
use crate::tags::TagCache;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("expiration date must be after the begin date")]
    ExpiresNotAfterBegins,
    #[error("unknown tag: {0}")]
    UnknownTag(String),
}

/// What the add/edit form currently shows: raw field text, the selected
/// level and the checked tag boxes.
///
/// A loaded message also keeps its exact `begins`/`expires` instants. The
/// picker text only has minute precision, so the instant is what gets saved
/// until that picker is moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormState {
    pub message_id: Option<u64>,
    pub content: String,
    pub level: Level,
    pub checked_tags: BTreeSet<String>,
    pub begins: String,
    pub expires: String,
    #[serde(skip)]
    begins_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    expires_at: Option<DateTime<Utc>>,
}

impl FormState {
    pub fn for_message(message: &Message, fmt: &DateFormat) -> Self {
        Self {
            message_id: message.id,
            content: message.content.clone(),
            level: message.level,
            checked_tags: message.tags.iter().cloned().collect(),
            begins: message
                .begins
                .map(|dt| fmt.format_input(dt))
                .unwrap_or_default(),
            expires: message
                .expires
                .map(|dt| fmt.format_input(dt))
                .unwrap_or_default(),
            begins_at: message.begins,
            expires_at: message.expires,
        }
    }

    fn begins_instant(&self, fmt: &DateFormat) -> Option<DateTime<Utc>> {
        self.begins_at.or_else(|| fmt.parse_input(&self.begins))
    }

    fn expires_instant(&self, fmt: &DateFormat) -> Option<DateTime<Utc>> {
        self.expires_at.or_else(|| fmt.parse_input(&self.expires))
    }

    /// The earliest instant the expires picker accepts.
    pub fn expires_lower_bound(&self, fmt: &DateFormat) -> Option<DateTime<Utc>> {
        self.begins_instant(fmt)
    }

    /// Moves the begins picker. An expires value that no longer lies after
    /// the new begins is cleared.
    pub fn set_begins(&mut self, text: &str, fmt: &DateFormat) {
        let text = text.trim();
        if text != self.begins {
            self.begins = text.to_string();
            self.begins_at = None;
        }
        let Some(lower) = self.expires_lower_bound(fmt) else {
            return;
        };
        if let Some(expires) = self.expires_instant(fmt)
            && expires <= lower
        {
            debug!(
                begins = %self.begins,
                expires = %self.expires,
                "clearing expires below new begins"
            );
            self.expires.clear();
            self.expires_at = None;
        }
    }

    pub fn set_expires(&mut self, text: &str, fmt: &DateFormat) -> Result<(), FormError> {
        let text = text.trim();
        if text == self.expires {
            return Ok(());
        }
        if let Some(lower) = self.expires_lower_bound(fmt)
            && let Some(expires) = fmt.parse_input(text)
            && expires <= lower
        {
            return Err(FormError::ExpiresNotAfterBegins);
        }
        self.expires = text.to_string();
        self.expires_at = None;
        Ok(())
    }

    pub fn set_tag(&mut self, name: &str, checked: bool) {
        if checked {
            self.checked_tags.insert(name.to_string());
        } else {
            self.checked_tags.remove(name);
        }
    }

    /// Builds the write body: trimmed content, the selected level, every
    /// checked tag present in the cached groups (in cache order) and the
    /// dates as ISO instants, `null` when empty or unparseable.
    pub fn serialize(&self, tags: &TagCache, fmt: &DateFormat) -> Result<MessageWrite, FormError> {
        let begins = self.begins_instant(fmt);
        let expires = self.expires_instant(fmt);
        if let (Some(begins), Some(expires)) = (begins, expires)
            && expires <= begins
        {
            return Err(FormError::ExpiresNotAfterBegins);
        }

        let tags = tags
            .tag_names()
            .filter(|name| self.checked_tags.contains(*name))
            .map(ToString::to_string)
            .collect();

        Ok(MessageWrite {
            content: self.content.trim().to_string(),
            level: self.level.value(),
            tags,
            begins: begins.map(to_iso),
            expires: expires.map(to_iso),
        })
    }
}

/// Field changes typed into the form before it is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormEdits {
    pub content: Option<String>,
    pub level: Option<Level>,
    pub tags: Option<Vec<String>>,
    pub begins: Option<String>,
    pub expires: Option<String>,
}

impl FormEdits {
    pub fn is_empty(&self) -> bool {
        *self == FormEdits::default()
    }

    /// Applies the edits through the same pickers a user would touch, so
    /// the expires bound is enforced. Tags must exist in the cache.
    pub fn apply(
        &self,
        form: &mut FormState,
        cache: &TagCache,
        fmt: &DateFormat,
    ) -> Result<(), FormError> {
        if let Some(content) = &self.content {
            form.content = content.clone();
        }
        if let Some(level) = self.level {
            form.level = level;
        }
        if let Some(tags) = &self.tags {
            if let Some(unknown) = tags.iter().find(|tag| !cache.contains(tag)) {
                return Err(FormError::UnknownTag(unknown.clone()));
            }
            form.checked_tags = tags.iter().cloned().collect();
        }
        if let Some(begins) = &self.begins {
            form.set_begins(begins, fmt);
        }
        if let Some(expires) = &self.expires {
            form.set_expires(expires, fmt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bulletin_shared::{TagDto, TagGroupDto, TagGroupsEnvelope};
    use chrono::TimeZone;

    use super::*;

    fn cache() -> TagCache {
        let mut cache = TagCache::default();
        cache.replace(TagGroupsEnvelope {
            tag_groups: vec![
                TagGroupDto {
                    id: Some(1),
                    name: "Campus".to_string(),
                    tags: ["seattle", "tacoma"]
                        .iter()
                        .map(|name| TagDto {
                            id: None,
                            name: name.to_string(),
                            group: Some("Campus".to_string()),
                        })
                        .collect(),
                },
                TagGroupDto {
                    id: Some(2),
                    name: "Role".to_string(),
                    tags: vec![TagDto {
                        id: None,
                        name: "student".to_string(),
                        group: Some("Role".to_string()),
                    }],
                },
            ],
        });
        cache
    }

    fn blank_form() -> FormState {
        FormState::for_message(&Message::blank(Level::Info), &DateFormat::default())
    }

    #[test]
    fn blank_form_serializes_nulls() {
        let mut form = blank_form();
        form.content = "  Hi \n".to_string();
        let body = form
            .serialize(&TagCache::default(), &DateFormat::default())
            .expect("serialize");
        assert_eq!(
            serde_json::to_string(&bulletin_shared::WriteEnvelope { message: body })
                .expect("json"),
            r#"{"message":{"content":"Hi","level":20,"tags":[],"begins":null,"expires":null}}"#
        );
    }

    #[test]
    fn tags_follow_cache_order_across_groups() {
        let mut form = blank_form();
        form.set_tag("student", true);
        form.set_tag("seattle", true);
        form.set_tag("retired-tag", true);
        let body = form
            .serialize(&cache(), &DateFormat::default())
            .expect("serialize");
        assert_eq!(body.tags, vec!["seattle", "student"]);
    }

    #[test]
    fn dates_serialize_as_iso_or_null() {
        let fmt = DateFormat::default();
        let mut form = blank_form();
        form.set_begins("10/18/2026 09:00 AM", &fmt);
        form.expires = "not a date".to_string();
        let body = form.serialize(&cache(), &fmt).expect("serialize");
        assert_eq!(body.begins.as_deref(), Some("2026-10-18T09:00:00.000Z"));
        assert_eq!(body.expires, None);
    }

    #[test]
    fn moving_begins_past_expires_clears_expires() {
        let fmt = DateFormat::default();
        let mut form = blank_form();
        form.set_begins("10/18/2026 09:00 AM", &fmt);
        form.set_expires("10/19/2026 09:00 AM", &fmt).expect("after begins");

        form.set_begins("10/18/2026 10:00 AM", &fmt);
        assert_eq!(form.expires, "10/19/2026 09:00 AM");

        form.set_begins("10/20/2026 09:00 AM", &fmt);
        assert!(form.expires.is_empty());
    }

    #[test]
    fn expires_picker_respects_lower_bound() {
        let fmt = DateFormat::default();
        let mut form = blank_form();
        form.set_begins("10/18/2026 09:00 AM", &fmt);
        assert_eq!(
            form.set_expires("10/18/2026 09:00 AM", &fmt),
            Err(FormError::ExpiresNotAfterBegins)
        );
        assert!(form.expires.is_empty());
    }

    #[test]
    fn never_serializes_inverted_window() {
        let fmt = DateFormat::default();
        let mut form = blank_form();
        form.begins = "10/18/2026 09:00 AM".to_string();
        form.expires = "10/17/2026 09:00 AM".to_string();
        assert_eq!(
            form.serialize(&cache(), &fmt),
            Err(FormError::ExpiresNotAfterBegins)
        );
    }

    #[test]
    fn content_edit_keeps_loaded_seconds() {
        let fmt = DateFormat::default();
        let mut message = Message::blank(Level::Success);
        message.id = Some(5);
        message.content = "Old".to_string();
        message.begins = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 30).single();
        message.expires = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 50).single();
        let mut form = FormState::for_message(&message, &fmt);
        assert_eq!(form.begins, form.expires);

        let edits = FormEdits {
            content: Some("New".to_string()),
            begins: Some(form.begins.clone()),
            ..FormEdits::default()
        };
        edits.apply(&mut form, &cache(), &fmt).expect("apply");
        let body = form.serialize(&cache(), &fmt).expect("sub-minute window");
        assert_eq!(body.content, "New");
        assert_eq!(body.begins.as_deref(), Some("2026-10-18T09:00:30.000Z"));
        assert_eq!(body.expires.as_deref(), Some("2026-10-18T09:00:50.000Z"));

        form.set_begins("10/18/2026 10:00 AM", &fmt);
        assert!(form.expires.is_empty());
        let body = form.serialize(&cache(), &fmt).expect("serialize");
        assert_eq!(body.begins.as_deref(), Some("2026-10-18T10:00:00.000Z"));
        assert_eq!(body.expires, None);
    }

    #[test]
    fn edits_reject_unknown_tags() {
        let fmt = DateFormat::default();
        let mut form = blank_form();
        let edits = FormEdits {
            tags: Some(vec!["seattle".to_string(), "spokane".to_string()]),
            ..FormEdits::default()
        };
        assert_eq!(
            edits.apply(&mut form, &cache(), &fmt),
            Err(FormError::UnknownTag("spokane".to_string()))
        );
    }
}
