//! Wire shapes of the message and tag-group REST API.
//!
//! Dates travel as ISO-8601 strings; parsing them into instants is the
//! client's job.

use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TagDto {
  #[serde(default)]
  pub id:    Option<u64>,
  pub name:  String,
  #[serde(default)]
  pub group: Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TagGroupDto {
  #[serde(default)]
  pub id:   Option<u64>,
  pub name: String,
  #[serde(default)]
  pub tags: Vec<TagDto>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct TagGroupsEnvelope {
  pub tag_groups: Vec<TagGroupDto>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct MessageDto {
  #[serde(default)]
  pub id:          Option<u64>,
  #[serde(default)]
  pub content:     String,
  pub level:       i64,
  #[serde(default)]
  pub level_name:  Option<String>,
  #[serde(default)]
  pub tags:        Vec<TagDto>,
  #[serde(default)]
  pub begins:      Option<String>,
  #[serde(default)]
  pub expires:     Option<String>,
  #[serde(default)]
  pub created:     Option<String>,
  #[serde(default)]
  pub modified:    Option<String>,
  #[serde(default)]
  pub modified_by: Option<String>,
  #[serde(default)]
  pub is_active:   Option<bool>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct MessageEnvelope {
  pub message: MessageDto
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct MessagesEnvelope {
  #[serde(default)]
  pub messages: Vec<MessageDto>
}

/// Full message body sent on create and on form update. Every field is
/// always present; absent dates are sent as `null`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct MessageWrite {
  pub content: String,
  pub level:   i64,
  pub tags:    Vec<String>,
  pub begins:  Option<String>,
  pub expires: Option<String>
}

/// Partial update. `None` leaves the field out of the body,
/// `Some(None)` sends an explicit `null`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct MessagePatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub begins:  Option<Option<String>>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub expires: Option<Option<String>>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct WriteEnvelope<T> {
  pub message: T
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ErrorBody {
  pub error: String
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn patch_only_serializes_touched_fields()
  {
    let patch = MessagePatch {
      begins: Some(Some(
        "2026-10-18T12:00:00.000Z"
          .to_string()
      )),
      expires: None
    };
    let body = serde_json::to_string(
      &WriteEnvelope { message: patch }
    )
    .expect("serialize patch");
    assert_eq!(
      body,
      r#"{"message":{"begins":"2026-10-18T12:00:00.000Z"}}"#
    );
  }

  #[test]
  fn patch_sends_explicit_null() {
    let patch = MessagePatch {
      begins:  None,
      expires: Some(None)
    };
    let body = serde_json::to_string(
      &patch
    )
    .expect("serialize patch");
    assert_eq!(body, r#"{"expires":null}"#);
  }

  #[test]
  fn message_tolerates_missing_optional_fields()
  {
    let raw = r#"{"id":1,"content":"A","level":20,"begins":null,"expires":null}"#;
    let dto: MessageDto =
      serde_json::from_str(raw)
        .expect("decode message");
    assert_eq!(dto.id, Some(1));
    assert!(dto.tags.is_empty());
    assert_eq!(dto.is_active, None);
  }
}
