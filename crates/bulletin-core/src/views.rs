//! Screens the controller asks to have rendered, and the data each
//! template receives.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::controls::{Control, ControlKind};
use crate::datetime::DateFormat;
use crate::form::FormState;
use crate::message::{Level, Message, PublishState};
use crate::tags::TagCache;

/// Failure classes that have their own error page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    ServerError,
    Unreachable,
    Unexpected,
}

impl ErrorKind {
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(400) => ErrorKind::BadRequest,
            Some(401) => ErrorKind::Unauthorized,
            Some(403) => ErrorKind::Forbidden,
            Some(404) => ErrorKind::NotFound,
            Some(500..=599) => ErrorKind::ServerError,
            Some(_) => ErrorKind::Unexpected,
            None => ErrorKind::Unreachable,
        }
    }

    pub fn renderer_key(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "400",
            ErrorKind::Unauthorized => "401",
            ErrorKind::Forbidden => "403",
            ErrorKind::NotFound => "404",
            ErrorKind::ServerError => "500",
            ErrorKind::Unreachable | ErrorKind::Unexpected => FALLBACK_TEMPLATE,
        }
    }
}

pub const FALLBACK_TEMPLATE: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKey {
    MessageList,
    MessageForm,
    Confirmation,
    Transition,
    Error(ErrorKind),
}

impl TemplateKey {
    pub fn name(self) -> &'static str {
        match self {
            TemplateKey::MessageList => "message-list",
            TemplateKey::MessageForm => "message-form",
            TemplateKey::Confirmation => "confirmation",
            TemplateKey::Transition => "transition",
            TemplateKey::Error(kind) => kind.renderer_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub template: TemplateKey,
    pub header: String,
    pub data: ScreenData,
}

impl Screen {
    pub fn transition() -> Self {
        Self {
            template: TemplateKey::Transition,
            header: String::new(),
            data: ScreenData::Transition,
        }
    }

    /// Every control bound on this screen.
    pub fn controls(&self) -> Vec<Control> {
        match &self.data {
            ScreenData::List(list) => list
                .messages
                .iter()
                .flat_map(|row| row.controls.iter().copied())
                .collect(),
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScreenData {
    Transition,
    List(ListView),
    Form(FormView),
    Confirmation(ConfirmationView),
    Error(ErrorView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListView {
    pub messages: Vec<MessageRow>,
}

impl ListView {
    pub fn build(messages: &[Message], now: DateTime<Utc>, dates: &DateFormat) -> Self {
        Self {
            messages: messages
                .iter()
                .map(|message| MessageRow::build(message, now, dates))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRow {
    pub message: Message,
    pub level_name: &'static str,
    pub state: PublishState,
    pub begins_display: Option<String>,
    pub expires_display: Option<String>,
    pub modified_display: Option<String>,
    pub controls: Vec<Control>,
}

impl MessageRow {
    pub fn build(message: &Message, now: DateTime<Utc>, dates: &DateFormat) -> Self {
        let state = message.publish_state(now);
        let controls = match message.id {
            Some(id) => {
                let toggle = if state == PublishState::Published {
                    ControlKind::Unpublish
                } else {
                    ControlKind::Publish
                };
                vec![
                    Control::new(ControlKind::Edit, id),
                    Control::new(toggle, id),
                    Control::new(ControlKind::Delete, id),
                ]
            }
            None => vec![],
        };
        Self {
            message: message.clone(),
            level_name: message.level.name(),
            state,
            begins_display: message.begins.map(|dt| dates.format_display(dt)),
            expires_display: message.expires.map(|dt| dates.format_display(dt)),
            modified_display: message.modified.map(|dt| dates.format_display(dt)),
            controls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelOption {
    pub value: i64,
    pub name: &'static str,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagOption {
    pub name: String,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagGroupOptions {
    pub name: String,
    pub tags: Vec<TagOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormView {
    pub form: FormState,
    pub levels: Vec<LevelOption>,
    pub tag_groups: Vec<TagGroupOptions>,
    pub expires_min: Option<String>,
    /// Server or validation error from the last submit, shown next to the
    /// values the user had entered.
    pub error: Option<String>,
}

impl FormView {
    pub fn build(
        form: &FormState,
        levels: &[Level],
        tags: &TagCache,
        dates: &DateFormat,
        error: Option<String>,
    ) -> Self {
        Self {
            form: form.clone(),
            levels: levels
                .iter()
                .map(|level| LevelOption {
                    value: level.value(),
                    name: level.name(),
                    checked: *level == form.level,
                })
                .collect(),
            tag_groups: tags
                .groups()
                .iter()
                .map(|group| TagGroupOptions {
                    name: group.name.clone(),
                    tags: group
                        .tags
                        .iter()
                        .map(|tag| TagOption {
                            name: tag.name.clone(),
                            checked: form.checked_tags.contains(&tag.name),
                        })
                        .collect(),
                })
                .collect(),
            expires_min: form
                .expires_lower_bound(dates)
                .map(|dt| dates.format_input(dt)),
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationView {
    pub row: MessageRow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub error: String,
}
