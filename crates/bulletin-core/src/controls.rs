use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Edit,
    Publish,
    Unpublish,
    Delete,
}

impl ControlKind {
    pub fn slug(self) -> &'static str {
        match self {
            ControlKind::Edit => "edit",
            ControlKind::Publish => "publish",
            ControlKind::Unpublish => "unpublish",
            ControlKind::Delete => "delete",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            ControlKind::Edit => "pm-btn-edit",
            ControlKind::Publish => "pm-btn-publish",
            ControlKind::Unpublish => "pm-btn-unpublish",
            ControlKind::Delete => "pm-btn-delete",
        }
    }

    fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "edit" => Some(ControlKind::Edit),
            "publish" => Some(ControlKind::Publish),
            "unpublish" => Some(ControlKind::Unpublish),
            "delete" => Some(ControlKind::Delete),
            _ => None,
        }
    }
}

/// An action bound to one list row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Control {
    pub kind: ControlKind,
    pub message_id: u64,
}

impl Control {
    pub fn new(kind: ControlKind, message_id: u64) -> Self {
        Self { kind, message_id }
    }

    pub fn dom_id(&self) -> String {
        format!("pm-{}-{}", self.kind.slug(), self.message_id)
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dom_id())
    }
}

/// Splits a rendered control id such as `pm-delete-42` into its kind and
/// the raw, still unvalidated, target text (`"42"`).
pub fn split_dom_id(dom_id: &str) -> Option<(ControlKind, &str)> {
    static DOM_ID: OnceLock<Option<Regex>> = OnceLock::new();
    let re = DOM_ID
        .get_or_init(|| Regex::new(r"^pm-(edit|publish|unpublish|delete)-(.*)$").ok())
        .as_ref()?;
    let caps = re.captures(dom_id.trim())?;
    let kind = ControlKind::from_slug(caps.get(1)?.as_str())?;
    Some((kind, caps.get(2)?.as_str()))
}

/// A message id is a non-negative integer written with ASCII digits only.
pub fn parse_message_id(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u64>().ok()
}
