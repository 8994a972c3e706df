//! The view controller.
//!
//! The controller never performs I/O. User intents and backend responses go
//! in, [`Effect`]s come out: requests to send, screens to render, alerts to
//! raise. Each navigation opens a new view generation and every request is
//! tagged with a [`Ticket`]; responses from an older generation are dropped
//! so they cannot touch the caches or the screen.

use std::collections::{BTreeMap, HashMap};

use bulletin_shared::{
    MessageEnvelope, MessagePatch, MessageWrite, MessagesEnvelope, TagGroupsEnvelope,
    WriteEnvelope,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{ApiRequest, ApiResponse, Method, TransportError};
use crate::controls::{ControlKind, parse_message_id, split_dom_id};
use crate::datetime::{DateFormat, to_iso};
use crate::form::{FormEdits, FormError, FormState};
use crate::message::{Message, PublishState};
use crate::session::SessionContext;
use crate::tags::TagCache;
use crate::views::{
    ConfirmationView, ErrorKind, ErrorView, FormView, ListView, MessageRow, Screen, ScreenData,
    TemplateKey,
};

/// Publish/unpublish stamp this far in the past so clock skew against the
/// server cannot leave the message in the wrong state.
pub const CLOCK_SKEW: Duration = Duration::seconds(5);

pub const DELETE_PROMPT: &str = "Delete this message?";
pub const PUBLISH_PROMPT: &str = "Publish this message?";
pub const PUBLISH_EXPIRED_PROMPT: &str =
    "This message has expired. Publishing it will also clear its expiration date. Continue?";
pub const UNPUBLISH_PROMPT: &str = "Unpublish this message?";

/// Blocking confirm/alert dialogs.
pub trait Prompter {
    fn confirm(&mut self, question: &str) -> bool;

    fn alert(&mut self, text: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket {
    pub generation: u64,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub ticket: Ticket,
    pub request: ApiRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(Outbound),
    Render(Screen),
    Alert(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActiveView {
    Idle,
    Loading,
    List,
    Form { state: FormState, error: Option<String> },
    Confirmation(Box<Message>),
    Error(ErrorKind),
}

#[derive(Debug, Clone)]
enum Pending {
    List,
    Tags,
    TagsThenAdd,
    TagsThenEdit(u64),
    MessageForEdit(u64),
    Create(FormState),
    Update(FormState),
    Delete(u64),
    Toggle { id: u64, kind: ControlKind },
}

impl Pending {
    fn label(&self) -> &'static str {
        match self {
            Pending::List => "list",
            Pending::Tags => "tags",
            Pending::TagsThenAdd => "tags-then-add",
            Pending::TagsThenEdit(_) => "tags-then-edit",
            Pending::MessageForEdit(_) => "message-for-edit",
            Pending::Create(_) => "create",
            Pending::Update(_) => "update",
            Pending::Delete(_) => "delete",
            Pending::Toggle { .. } => "toggle",
        }
    }
}

#[derive(Debug)]
pub struct ViewController {
    session: SessionContext,
    dates: DateFormat,
    tags: TagCache,
    index: BTreeMap<u64, Message>,
    view: ActiveView,
    generation: u64,
    seq: u64,
    pending: HashMap<Ticket, Pending>,
}

impl ViewController {
    pub fn new(session: SessionContext, dates: DateFormat) -> Self {
        Self {
            session,
            dates,
            tags: TagCache::default(),
            index: BTreeMap::new(),
            view: ActiveView::Idle,
            generation: 0,
            seq: 0,
            pending: HashMap::new(),
        }
    }

    pub fn tags(&self) -> &TagCache {
        &self.tags
    }

    pub fn view(&self) -> &ActiveView {
        &self.view
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn message(&self, id: u64) -> Option<&Message> {
        self.index.get(&id)
    }

    pub fn form(&self) -> Option<&FormState> {
        match &self.view {
            ActiveView::Form { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn form_error(&self) -> Option<&str> {
        match &self.view {
            ActiveView::Form { error, .. } => error.as_deref(),
            _ => None,
        }
    }

    /// Requests still awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    #[tracing::instrument(skip(self))]
    pub fn show_list(&mut self) -> Vec<Effect> {
        self.begin_view();
        let request = self
            .session
            .request(Method::Get, self.session.message_url(None), None);
        self.loading(request, Pending::List)
    }

    #[tracing::instrument(skip(self))]
    pub fn show_add_form(&mut self) -> Vec<Effect> {
        self.begin_view();
        if !self.tags.is_loaded() {
            let request = self.tags_request();
            return self.loading(request, Pending::TagsThenAdd);
        }
        let state = FormState::for_message(
            &Message::blank(self.session.default_level()),
            &self.dates,
        );
        vec![self.open_form(state, None)]
    }

    /// Opens the edit form for a raw target id. Anything but a plain
    /// non-negative integer is ignored.
    #[tracing::instrument(skip(self))]
    pub fn show_edit_form(&mut self, target: &str) -> Vec<Effect> {
        let Some(id) = parse_message_id(target) else {
            warn!(target, "ignoring edit of malformed message id");
            return vec![];
        };
        self.begin_view();
        if !self.tags.is_loaded() {
            let request = self.tags_request();
            return self.loading(request, Pending::TagsThenEdit(id));
        }
        let request = self
            .session
            .request(Method::Get, self.session.message_url(Some(id)), None);
        self.loading(request, Pending::MessageForEdit(id))
    }

    /// Drops the tag cache and fetches it again.
    #[tracing::instrument(skip(self))]
    pub fn refresh_tags(&mut self) -> Vec<Effect> {
        self.tags.invalidate();
        let request = self.tags_request();
        let ticket = self.issue(Pending::Tags);
        vec![Effect::Send(Outbound { ticket, request })]
    }

    /// Applies typed field changes to the open form and re-renders it.
    pub fn update_form(&mut self, edits: &FormEdits) -> Result<Vec<Effect>, FormError> {
        let ActiveView::Form { state, .. } = &self.view else {
            return Ok(vec![]);
        };
        let mut state = state.clone();
        edits.apply(&mut state, &self.tags, &self.dates)?;
        Ok(vec![self.open_form(state, None)])
    }

    /// Submits the open form: POST for a new message, PUT for an existing
    /// one. Validation failures re-render the form without a request.
    #[tracing::instrument(skip(self))]
    pub fn submit(&mut self) -> Vec<Effect> {
        let ActiveView::Form { state, .. } = &self.view else {
            warn!("submit without an open form");
            return vec![];
        };
        let state = state.clone();

        let body = match state.serialize(&self.tags, &self.dates) {
            Ok(body) => body,
            Err(err) => {
                debug!(error = %err, "form failed validation");
                return vec![self.open_form(state, Some(err.to_string()))];
            }
        };
        let body = match encode(&WriteEnvelope::<MessageWrite> { message: body }) {
            Ok(body) => body,
            Err(err) => return vec![self.open_form(state, Some(err))],
        };

        self.begin_view();
        let (request, pending) = match state.message_id {
            Some(id) => (
                self.session
                    .request(Method::Put, self.session.message_url(Some(id)), Some(body)),
                Pending::Update(state.clone()),
            ),
            None => (
                self.session
                    .request(Method::Post, self.session.message_url(None), Some(body)),
                Pending::Create(state.clone()),
            ),
        };
        self.view = ActiveView::Form { state, error: None };
        let ticket = self.issue(pending);
        vec![
            Effect::Render(Screen::transition()),
            Effect::Send(Outbound { ticket, request }),
        ]
    }

    /// Handles a click on a rendered control, identified by its DOM-style id
    /// (`pm-delete-42`).
    #[tracing::instrument(skip(self, prompter, now))]
    pub fn activate(
        &mut self,
        dom_id: &str,
        now: DateTime<Utc>,
        prompter: &mut dyn Prompter,
    ) -> Vec<Effect> {
        let Some((kind, target)) = split_dom_id(dom_id) else {
            warn!(dom_id, "ignoring unknown control");
            return vec![];
        };
        match kind {
            ControlKind::Edit => self.show_edit_form(target),
            ControlKind::Delete => self.delete(target, prompter),
            ControlKind::Publish | ControlKind::Unpublish => {
                self.toggle_publish(kind, target, now, prompter)
            }
        }
    }

    #[tracing::instrument(skip(self, prompter))]
    pub fn delete(&mut self, target: &str, prompter: &mut dyn Prompter) -> Vec<Effect> {
        let Some(id) = parse_message_id(target) else {
            warn!(target, "ignoring delete of malformed message id");
            return vec![];
        };
        if !prompter.confirm(DELETE_PROMPT) {
            debug!(id, "delete cancelled");
            return vec![];
        }
        let request = self
            .session
            .request(Method::Delete, self.session.message_url(Some(id)), None);
        let ticket = self.issue(Pending::Delete(id));
        vec![Effect::Send(Outbound { ticket, request })]
    }

    /// Publishes (`begins = now - 5s`, plus `expires = null` when already
    /// expired) or unpublishes (`expires = now - 5s`) an indexed message
    /// with a partial PUT.
    #[tracing::instrument(skip(self, prompter, now))]
    pub fn toggle_publish(
        &mut self,
        kind: ControlKind,
        target: &str,
        now: DateTime<Utc>,
        prompter: &mut dyn Prompter,
    ) -> Vec<Effect> {
        let Some(id) = parse_message_id(target) else {
            warn!(target, "ignoring toggle of malformed message id");
            return vec![];
        };
        let Some(message) = self.index.get(&id) else {
            warn!(id, "toggle for a message missing from the list");
            return vec![Effect::Alert(format!(
                "Message {id} is not in the current list; reload and try again."
            ))];
        };

        let state = message.publish_state(now);
        let mismatched = match kind {
            ControlKind::Publish => state == PublishState::Published,
            ControlKind::Unpublish => state != PublishState::Published,
            ControlKind::Edit | ControlKind::Delete => false,
        };
        if mismatched {
            warn!(id, ?kind, state = state.label(), "toggle does not match publish state");
            return vec![Effect::Alert(format!(
                "Message {id} is {}; nothing to {}.",
                state.label(),
                kind.slug()
            ))];
        }

        let stamp = Some(to_iso(now - CLOCK_SKEW));
        let (patch, prompt) = match kind {
            ControlKind::Publish if state == PublishState::Expired => (
                MessagePatch {
                    begins: Some(stamp),
                    expires: Some(None),
                },
                PUBLISH_EXPIRED_PROMPT,
            ),
            ControlKind::Publish => (
                MessagePatch {
                    begins: Some(stamp),
                    expires: None,
                },
                PUBLISH_PROMPT,
            ),
            ControlKind::Unpublish => (
                MessagePatch {
                    begins: None,
                    expires: Some(Some(to_iso(unpublish_stamp(message, now)))),
                },
                UNPUBLISH_PROMPT,
            ),
            ControlKind::Edit | ControlKind::Delete => {
                warn!(?kind, "not a publish toggle");
                return vec![];
            }
        };

        if !prompter.confirm(prompt) {
            debug!(id, ?kind, "toggle cancelled");
            return vec![];
        }
        let body = match encode(&WriteEnvelope { message: patch }) {
            Ok(body) => body,
            Err(err) => return vec![Effect::Alert(err)],
        };
        let request =
            self.session
                .request(Method::Put, self.session.message_url(Some(id)), Some(body));
        let ticket = self.issue(Pending::Toggle { id, kind });
        vec![Effect::Send(Outbound { ticket, request })]
    }

    /// Feeds a response (or transport failure) back in. Responses for an
    /// older view generation, or for unknown tickets, are discarded.
    #[tracing::instrument(skip(self, result, now))]
    pub fn on_response(
        &mut self,
        ticket: Ticket,
        result: Result<ApiResponse, TransportError>,
        now: DateTime<Utc>,
    ) -> Vec<Effect> {
        let Some(pending) = self.pending.remove(&ticket) else {
            warn!(?ticket, "response for an unknown ticket");
            return vec![];
        };
        if ticket.generation != self.generation {
            debug!(
                ?ticket,
                current = self.generation,
                pending = pending.label(),
                "discarding stale response"
            );
            return vec![];
        }
        let result = result.and_then(ApiResponse::into_result);

        match pending {
            Pending::List => match decode::<MessagesEnvelope>(result).and_then(decode_messages) {
                Ok(messages) => self.finish_list(messages, now),
                Err(err) => vec![self.error_screen(&err)],
            },
            Pending::Tags => match decode::<TagGroupsEnvelope>(result) {
                Ok(envelope) => {
                    self.tags.replace(envelope);
                    vec![]
                }
                Err(err) => vec![self.error_screen(&err)],
            },
            Pending::TagsThenAdd => match decode::<TagGroupsEnvelope>(result) {
                Ok(envelope) => {
                    self.tags.replace(envelope);
                    let state = FormState::for_message(
                        &Message::blank(self.session.default_level()),
                        &self.dates,
                    );
                    vec![self.open_form(state, None)]
                }
                Err(err) => vec![self.error_screen(&err)],
            },
            Pending::TagsThenEdit(id) => match decode::<TagGroupsEnvelope>(result) {
                Ok(envelope) => {
                    self.tags.replace(envelope);
                    let request =
                        self.session
                            .request(Method::Get, self.session.message_url(Some(id)), None);
                    let ticket = self.issue(Pending::MessageForEdit(id));
                    vec![Effect::Send(Outbound { ticket, request })]
                }
                Err(err) => vec![self.error_screen(&err)],
            },
            Pending::MessageForEdit(id) => match decode_message(result) {
                Ok(message) => {
                    debug!(id, "loaded message for edit");
                    let state = FormState::for_message(&message, &self.dates);
                    vec![self.open_form(state, None)]
                }
                Err(err) => vec![self.error_screen(&err)],
            },
            Pending::Create(state) => match decode_message(result) {
                Ok(message) => {
                    info!(id = ?message.id, "message created");
                    let row = MessageRow::build(&message, now, &self.dates);
                    self.view = ActiveView::Confirmation(Box::new(message));
                    vec![Effect::Render(Screen {
                        template: TemplateKey::Confirmation,
                        header: "Message saved".to_string(),
                        data: ScreenData::Confirmation(ConfirmationView { row }),
                    })]
                }
                Err(err) => vec![self.open_form(state, Some(err.reason()))],
            },
            Pending::Update(state) => match decode_message(result) {
                Ok(message) => {
                    info!(id = ?message.id, "message updated");
                    self.show_list()
                }
                Err(err) => vec![self.open_form(state, Some(err.reason()))],
            },
            Pending::Delete(id) => match result {
                Ok(_) => {
                    info!(id, "message deleted");
                    self.index.remove(&id);
                    self.show_list()
                }
                Err(err) => vec![Effect::Alert(format!("Delete failed: {}", err.reason()))],
            },
            Pending::Toggle { id, kind } => match decode_message(result) {
                Ok(_) => {
                    info!(id, action = kind.slug(), "message toggled");
                    self.show_list()
                }
                Err(err) => {
                    let verb = if kind == ControlKind::Publish {
                        "Publish"
                    } else {
                        "Unpublish"
                    };
                    vec![Effect::Alert(format!("{verb} failed: {}", err.reason()))]
                }
            },
        }
    }

    fn finish_list(&mut self, messages: Vec<Message>, now: DateTime<Utc>) -> Vec<Effect> {
        self.index = messages
            .iter()
            .filter_map(|message| message.id.map(|id| (id, message.clone())))
            .collect();
        debug!(count = messages.len(), "rendering message list");
        self.view = ActiveView::List;
        vec![Effect::Render(Screen {
            template: TemplateKey::MessageList,
            header: "Messages".to_string(),
            data: ScreenData::List(ListView::build(&messages, now, &self.dates)),
        })]
    }

    fn open_form(&mut self, state: FormState, error: Option<String>) -> Effect {
        let header = match state.message_id {
            Some(id) => format!("Edit message {id}"),
            None => "Add message".to_string(),
        };
        let view = FormView::build(
            &state,
            &self.session.levels,
            &self.tags,
            &self.dates,
            error.clone(),
        );
        self.view = ActiveView::Form { state, error };
        Effect::Render(Screen {
            template: TemplateKey::MessageForm,
            header,
            data: ScreenData::Form(view),
        })
    }

    fn error_screen(&mut self, err: &TransportError) -> Effect {
        let status = err.status();
        let kind = ErrorKind::from_status(status);
        warn!(?status, error = %err, "request failed");
        self.view = ActiveView::Error(kind);
        Effect::Render(Screen {
            template: TemplateKey::Error(kind),
            header: String::new(),
            data: ScreenData::Error(ErrorView {
                kind,
                status,
                error: err.reason(),
            }),
        })
    }

    fn tags_request(&self) -> ApiRequest {
        self.session
            .request(Method::Get, self.session.tags_api.clone(), None)
    }

    fn begin_view(&mut self) {
        self.generation += 1;
        // Older tickets stay registered until their response arrives, so the
        // drop can be logged against what the request was for.
        debug!(
            generation = self.generation,
            in_flight = self.pending.len(),
            "opened view generation"
        );
    }

    fn issue(&mut self, pending: Pending) -> Ticket {
        self.seq += 1;
        let ticket = Ticket {
            generation: self.generation,
            seq: self.seq,
        };
        debug!(?ticket, pending = pending.label(), "issuing request");
        self.pending.insert(ticket, pending);
        ticket
    }

    fn loading(&mut self, request: ApiRequest, pending: Pending) -> Vec<Effect> {
        self.view = ActiveView::Loading;
        let ticket = self.issue(pending);
        vec![
            Effect::Render(Screen::transition()),
            Effect::Send(Outbound { ticket, request }),
        ]
    }
}

/// `now - 5s`, unless the message began after that; then just past
/// `begins` so the window never inverts.
fn unpublish_stamp(message: &Message, now: DateTime<Utc>) -> DateTime<Utc> {
    let stamp = now - CLOCK_SKEW;
    match message.begins {
        Some(begins) if begins >= stamp => begins + Duration::milliseconds(1),
        _ => stamp,
    }
}

fn encode<T: Serialize>(body: &T) -> Result<String, String> {
    serde_json::to_string(body).map_err(|err| format!("failed to encode request: {err}"))
}

fn decode<T: serde::de::DeserializeOwned>(
    result: Result<ApiResponse, TransportError>,
) -> Result<T, TransportError> {
    result.and_then(|response| response.json::<T>())
}

fn decode_message(result: Result<ApiResponse, TransportError>) -> Result<Message, TransportError> {
    let envelope = decode::<MessageEnvelope>(result)?;
    Message::try_from(envelope.message).map_err(|err| TransportError::Malformed(format!("{err:#}")))
}

fn decode_messages(envelope: MessagesEnvelope) -> Result<Vec<Message>, TransportError> {
    envelope
        .messages
        .into_iter()
        .map(|dto| {
            Message::try_from(dto).map_err(|err| TransportError::Malformed(format!("{err:#}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::controls::Control;
    use crate::views::FALLBACK_TEMPLATE;

    struct Scripted {
        answer: bool,
        asked: Vec<String>,
    }

    impl Scripted {
        fn yes() -> Self {
            Self {
                answer: true,
                asked: vec![],
            }
        }
    }

    impl Prompter for Scripted {
        fn confirm(&mut self, question: &str) -> bool {
            self.asked.push(question.to_string());
            self.answer
        }

        fn alert(&mut self, _text: &str) {}
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0)
            .single()
            .expect("valid now")
    }

    fn controller() -> ViewController {
        let session =
            SessionContext::new("http://h/api/v1/messages", "http://h/api/v1/tag_groups")
                .with_credentials(Some("s-1".to_string()), Some("tok".to_string()));
        ViewController::new(session, DateFormat::default())
    }

    fn sends(effects: &[Effect]) -> Vec<&Outbound> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Send(outbound) => Some(outbound),
                _ => None,
            })
            .collect()
    }

    fn only_send(effects: &[Effect]) -> Outbound {
        let sends = sends(effects);
        assert_eq!(sends.len(), 1, "expected exactly one request: {effects:?}");
        sends[0].clone()
    }

    fn rendered(effects: &[Effect]) -> Option<&Screen> {
        effects.iter().rev().find_map(|effect| match effect {
            Effect::Render(screen) if screen.template != TemplateKey::Transition => Some(screen),
            _ => None,
        })
    }

    const LIST: &str = r#"{"messages":[
        {"id":1,"content":"Live","level":20,"tags":[],
         "begins":null,"expires":null},
        {"id":2,"content":"Later","level":30,"tags":[],
         "begins":"2026-10-19T00:00:00Z","expires":null},
        {"id":3,"content":"Gone","level":40,"tags":[],
         "begins":null,"expires":"2026-10-01T00:00:00Z"},
        {"id":4,"content":"Week","level":25,"tags":[],
         "begins":"2026-10-19T00:00:00Z","expires":"2026-12-01T00:00:00Z"},
        {"id":5,"content":"Fresh","level":20,"tags":[],
         "begins":"2026-10-18T11:59:58Z","expires":null}
    ]}"#;

    const TAGS: &str = r#"{"tag_groups":[
        {"id":1,"name":"Campus","tags":[{"name":"seattle"},{"name":"tacoma"}]}
    ]}"#;

    fn loaded_list(ctl: &mut ViewController) {
        let out = only_send(&ctl.show_list());
        ctl.on_response(out.ticket, Ok(ApiResponse::new(200, LIST)), now());
    }

    #[test]
    fn list_binds_controls_per_state() {
        let mut ctl = controller();
        let out = only_send(&ctl.show_list());
        assert_eq!(out.request.method, Method::Get);
        assert_eq!(out.request.url, "http://h/api/v1/messages");

        let effects = ctl.on_response(out.ticket, Ok(ApiResponse::new(200, LIST)), now());
        let screen = rendered(&effects).expect("list screen");
        assert_eq!(screen.template, TemplateKey::MessageList);
        let ids: Vec<String> = screen.controls().iter().map(Control::dom_id).collect();
        assert_eq!(
            ids,
            [
                "pm-edit-1",
                "pm-unpublish-1",
                "pm-delete-1",
                "pm-edit-2",
                "pm-publish-2",
                "pm-delete-2",
                "pm-edit-3",
                "pm-publish-3",
                "pm-delete-3",
                "pm-edit-4",
                "pm-publish-4",
                "pm-delete-4",
                "pm-edit-5",
                "pm-unpublish-5",
                "pm-delete-5",
            ]
        );
        assert_eq!(ctl.view(), &ActiveView::List);
        assert!(ctl.message(2).is_some());
    }

    #[test]
    fn stale_responses_are_dropped() {
        let mut ctl = controller();
        let first = only_send(&ctl.show_list());
        let second = only_send(&ctl.show_add_form());

        let effects = ctl.on_response(first.ticket, Ok(ApiResponse::new(200, LIST)), now());
        assert!(effects.is_empty());
        assert!(ctl.message(1).is_none());

        let effects = ctl.on_response(second.ticket, Ok(ApiResponse::new(200, TAGS)), now());
        assert_eq!(rendered(&effects).map(|s| s.template), Some(TemplateKey::MessageForm));
        assert_eq!(ctl.in_flight(), 0);
    }

    #[test]
    fn tag_groups_are_fetched_once_per_session() {
        let mut ctl = controller();
        let out = only_send(&ctl.show_add_form());
        assert_eq!(out.request.url, "http://h/api/v1/tag_groups");
        ctl.on_response(out.ticket, Ok(ApiResponse::new(200, TAGS)), now());

        let effects = ctl.show_add_form();
        assert!(sends(&effects).is_empty());
        let out = only_send(&ctl.show_edit_form("5"));
        assert_eq!(out.request.url, "http://h/api/v1/messages/5");
        assert_eq!(ctl.tags().fetches(), 1);

        let out = only_send(&ctl.refresh_tags());
        assert!(!ctl.tags().is_loaded());
        ctl.on_response(out.ticket, Ok(ApiResponse::new(200, TAGS)), now());
        assert_eq!(ctl.tags().fetches(), 2);
    }

    #[test]
    fn add_posts_blank_form() {
        let mut ctl = controller();
        let out = only_send(&ctl.show_add_form());
        ctl.on_response(out.ticket, Ok(ApiResponse::new(200, TAGS)), now());
        ctl.update_form(&FormEdits {
            content: Some("Hi".to_string()),
            ..FormEdits::default()
        })
        .expect("edit");

        let out = only_send(&ctl.submit());
        assert_eq!(out.request.method, Method::Post);
        assert_eq!(out.request.header("X-CSRFToken"), Some("tok"));
        assert_eq!(
            out.request.body.as_deref(),
            Some(
                r#"{"message":{"content":"Hi","level":20,"tags":[],"begins":null,"expires":null}}"#
            )
        );

        let created = r#"{"message":{"id":9,"content":"Hi","level":20,"tags":[]}}"#;
        let effects = ctl.on_response(out.ticket, Ok(ApiResponse::new(201, created)), now());
        assert_eq!(rendered(&effects).map(|s| s.template), Some(TemplateKey::Confirmation));
    }

    #[test]
    fn failed_save_keeps_entered_values() {
        let mut ctl = controller();
        let out = only_send(&ctl.show_add_form());
        ctl.on_response(out.ticket, Ok(ApiResponse::new(200, TAGS)), now());
        ctl.update_form(&FormEdits {
            content: Some("Draft".to_string()),
            tags: Some(vec!["tacoma".to_string()]),
            ..FormEdits::default()
        })
        .expect("edit");

        let out = only_send(&ctl.submit());
        let effects = ctl.on_response(
            out.ticket,
            Ok(ApiResponse::new(400, r#"{"error":"content too long"}"#)),
            now(),
        );
        assert_eq!(rendered(&effects).map(|s| s.template), Some(TemplateKey::MessageForm));
        assert_eq!(ctl.form_error(), Some("content too long"));
        let form = ctl.form().expect("form still open");
        assert_eq!(form.content, "Draft");
        assert!(form.checked_tags.contains("tacoma"));
    }

    #[test]
    fn delete_ignores_malformed_ids() {
        let mut ctl = controller();
        let mut prompter = Scripted::yes();
        assert!(ctl.delete("abc", &mut prompter).is_empty());
        assert!(ctl.activate("pm-delete-1x", now(), &mut prompter).is_empty());
        assert!(prompter.asked.is_empty());

        let out = only_send(&ctl.activate("pm-delete-7", now(), &mut prompter));
        assert_eq!(out.request.method, Method::Delete);
        assert_eq!(out.request.url, "http://h/api/v1/messages/7");
        assert_eq!(prompter.asked, [DELETE_PROMPT]);
    }

    #[test]
    fn cancelled_confirm_sends_nothing() {
        let mut ctl = controller();
        loaded_list(&mut ctl);
        let mut prompter = Scripted {
            answer: false,
            asked: vec![],
        };
        assert!(ctl.delete("1", &mut prompter).is_empty());
        assert!(
            ctl.toggle_publish(ControlKind::Unpublish, "1", now(), &mut prompter)
                .is_empty()
        );
    }

    #[test]
    fn publish_bodies_backdate_by_five_seconds() {
        let mut ctl = controller();
        loaded_list(&mut ctl);
        let mut prompter = Scripted::yes();

        let out = only_send(&ctl.toggle_publish(
            ControlKind::Unpublish,
            "1",
            now(),
            &mut prompter,
        ));
        assert_eq!(out.request.method, Method::Put);
        assert_eq!(
            out.request.body.as_deref(),
            Some(r#"{"message":{"expires":"2026-10-18T11:59:55.000Z"}}"#)
        );

        let out = only_send(&ctl.toggle_publish(ControlKind::Publish, "2", now(), &mut prompter));
        assert_eq!(
            out.request.body.as_deref(),
            Some(r#"{"message":{"begins":"2026-10-18T11:59:55.000Z"}}"#)
        );

        let out = only_send(&ctl.toggle_publish(ControlKind::Publish, "3", now(), &mut prompter));
        assert_eq!(
            out.request.body.as_deref(),
            Some(r#"{"message":{"begins":"2026-10-18T11:59:55.000Z","expires":null}}"#)
        );
        assert_eq!(prompter.asked.last().map(String::as_str), Some(PUBLISH_EXPIRED_PROMPT));

        // A future expires is left alone.
        let out = only_send(&ctl.toggle_publish(ControlKind::Publish, "4", now(), &mut prompter));
        assert_eq!(
            out.request.body.as_deref(),
            Some(r#"{"message":{"begins":"2026-10-18T11:59:55.000Z"}}"#)
        );
        assert_eq!(prompter.asked.last().map(String::as_str), Some(PUBLISH_PROMPT));
    }

    #[test]
    fn toggle_refuses_mismatched_state() {
        let mut ctl = controller();
        loaded_list(&mut ctl);
        let mut prompter = Scripted::yes();

        let effects = ctl.toggle_publish(ControlKind::Unpublish, "2", now(), &mut prompter);
        assert_eq!(
            effects,
            vec![Effect::Alert(
                "Message 2 is scheduled; nothing to unpublish.".to_string()
            )]
        );
        let effects = ctl.toggle_publish(ControlKind::Publish, "1", now(), &mut prompter);
        assert_eq!(
            effects,
            vec![Effect::Alert(
                "Message 1 is published; nothing to publish.".to_string()
            )]
        );
        assert!(prompter.asked.is_empty());
    }

    #[test]
    fn unpublish_never_expires_before_begins() {
        let mut ctl = controller();
        loaded_list(&mut ctl);
        let mut prompter = Scripted::yes();

        let out = only_send(&ctl.toggle_publish(
            ControlKind::Unpublish,
            "5",
            now(),
            &mut prompter,
        ));
        assert_eq!(
            out.request.body.as_deref(),
            Some(r#"{"message":{"expires":"2026-10-18T11:59:58.001Z"}}"#)
        );
        assert_eq!(prompter.asked, [UNPUBLISH_PROMPT]);
    }

    #[test]
    fn failed_delete_alerts_and_keeps_list() {
        let mut ctl = controller();
        loaded_list(&mut ctl);
        let out = only_send(&ctl.delete("1", &mut Scripted::yes()));
        let effects = ctl.on_response(
            out.ticket,
            Ok(ApiResponse::new(403, r#"{"error":"not yours"}"#)),
            now(),
        );
        assert_eq!(effects, vec![Effect::Alert("Delete failed: not yours".to_string())]);
        assert_eq!(ctl.view(), &ActiveView::List);
    }

    #[test]
    fn successful_toggle_reloads_list() {
        let mut ctl = controller();
        loaded_list(&mut ctl);
        let before = ctl.generation();
        let out = only_send(&ctl.toggle_publish(
            ControlKind::Unpublish,
            "1",
            now(),
            &mut Scripted::yes(),
        ));
        let updated = r#"{"message":{"id":1,"content":"Live","level":20,
            "expires":"2026-10-18T11:59:55Z"}}"#;
        let effects = ctl.on_response(out.ticket, Ok(ApiResponse::new(200, updated)), now());
        let reload = only_send(&effects);
        assert_eq!(reload.request.method, Method::Get);
        assert_eq!(reload.ticket.generation, before + 1);
    }

    #[test]
    fn read_errors_pick_status_template() {
        let mut ctl = controller();
        let out = only_send(&ctl.show_edit_form("404"));
        let effects = ctl.on_response(out.ticket, Ok(ApiResponse::new(200, TAGS)), now());
        let out = only_send(&effects);
        assert_eq!(out.request.url, "http://h/api/v1/messages/404");
        let effects = ctl.on_response(
            out.ticket,
            Ok(ApiResponse::new(404, r#"{"error":"Message 404 not found"}"#)),
            now(),
        );
        let screen = rendered(&effects).expect("error screen");
        assert_eq!(screen.template.name(), "404");

        let out = only_send(&ctl.show_list());
        let effects = ctl.on_response(
            out.ticket,
            Err(TransportError::Network("connection refused".to_string())),
            now(),
        );
        let screen = rendered(&effects).expect("error screen");
        assert_eq!(screen.template.name(), FALLBACK_TEMPLATE);
    }
}
