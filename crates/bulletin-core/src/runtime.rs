use std::collections::VecDeque;
use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::api::Transport;
use crate::controller::{ActiveView, Effect, Prompter, ViewController};
use crate::controls::ControlKind;
use crate::form::FormEdits;
use crate::render::{TemplateRenderer, resolve_template};
use crate::views::{Screen, TemplateKey};

/// Drives a [`ViewController`]: sends its requests, feeds the answers back
/// and writes rendered screens, until no effects remain.
pub struct Runtime<T, R, P, W> {
    controller: ViewController,
    transport: T,
    renderer: R,
    prompter: P,
    out: W,
    clock: fn() -> DateTime<Utc>,
    muted: bool,
    last_screen: Option<Screen>,
}

impl<T, R, P, W> Runtime<T, R, P, W>
where
    T: Transport,
    R: TemplateRenderer,
    P: Prompter,
    W: Write,
{
    pub fn new(controller: ViewController, transport: T, renderer: R, prompter: P, out: W) -> Self {
        Self {
            controller,
            transport,
            renderer,
            prompter,
            out,
            clock: Utc::now,
            muted: false,
            last_screen: None,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// While muted, only error pages are written out. Every other screen
    /// is still tracked as the last screen.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn controller(&self) -> &ViewController {
        &self.controller
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn out(&self) -> &W {
        &self.out
    }

    pub fn last_screen(&self) -> Option<&Screen> {
        self.last_screen.as_ref()
    }

    pub fn show_list(&mut self) -> anyhow::Result<()> {
        let effects = self.controller.show_list();
        self.dispatch(effects)
    }

    pub fn show_add_form(&mut self) -> anyhow::Result<()> {
        let effects = self.controller.show_add_form();
        self.dispatch(effects)
    }

    pub fn show_edit_form(&mut self, target: &str) -> anyhow::Result<()> {
        let effects = self.controller.show_edit_form(target);
        self.dispatch(effects)
    }

    pub fn refresh_tags(&mut self) -> anyhow::Result<()> {
        let effects = self.controller.refresh_tags();
        self.dispatch(effects)
    }

    pub fn update_form(&mut self, edits: &FormEdits) -> anyhow::Result<()> {
        let effects = self.controller.update_form(edits)?;
        self.dispatch(effects)
    }

    pub fn submit(&mut self) -> anyhow::Result<()> {
        let effects = self.controller.submit();
        self.dispatch(effects)
    }

    pub fn activate(&mut self, dom_id: &str) -> anyhow::Result<()> {
        let now = (self.clock)();
        let effects = self.controller.activate(dom_id, now, &mut self.prompter);
        self.dispatch(effects)
    }

    pub fn delete(&mut self, target: &str) -> anyhow::Result<()> {
        let effects = self.controller.delete(target, &mut self.prompter);
        self.dispatch(effects)
    }

    pub fn toggle_publish(&mut self, kind: ControlKind, target: &str) -> anyhow::Result<()> {
        let now = (self.clock)();
        let effects = self
            .controller
            .toggle_publish(kind, target, now, &mut self.prompter);
        self.dispatch(effects)
    }

    /// Runs effects to completion. Requests are answered in the order they
    /// were issued.
    #[tracing::instrument(skip_all, fields(initial = effects.len()))]
    pub fn dispatch(&mut self, effects: Vec<Effect>) -> anyhow::Result<()> {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Send(outbound) => {
                    debug!(
                        method = %outbound.request.method,
                        url = %outbound.request.url,
                        ticket = ?outbound.ticket,
                        "sending request"
                    );
                    let result = self.transport.send(&outbound.request);
                    let now = (self.clock)();
                    queue.extend(self.controller.on_response(outbound.ticket, result, now));
                }
                Effect::Render(screen) => self.render(screen)?,
                Effect::Alert(text) => {
                    debug!(%text, "raising alert");
                    self.prompter.alert(&text);
                }
            }
        }
        Ok(())
    }

    fn render(&mut self, screen: Screen) -> anyhow::Result<()> {
        let Some(key) = resolve_template(&self.renderer, screen.template) else {
            if screen.template == TemplateKey::Transition {
                trace!("no transition template registered");
                return Ok(());
            }
            return Err(anyhow!(
                "no template registered for {}",
                screen.template.name()
            ));
        };

        let is_error = matches!(screen.template, TemplateKey::Error(_));
        if !self.muted || is_error {
            let text = self.renderer.render(key, &screen)?;
            self.out
                .write_all(text.as_bytes())
                .context("failed to write screen")?;
            self.out.flush().context("failed to flush screen")?;
        }

        if screen.template != TemplateKey::Transition {
            self.last_screen = Some(screen);
        }
        Ok(())
    }

    /// Fails when the controller ended up on an error page.
    pub fn ensure_not_failed(&self) -> anyhow::Result<()> {
        match self.controller.view() {
            ActiveView::Error(kind) => Err(anyhow!("request failed ({})", kind.renderer_key())),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::api::{ApiRequest, ApiResponse, TransportError};
    use crate::datetime::DateFormat;
    use crate::render::TextRenderer;
    use crate::session::SessionContext;

    #[derive(Default)]
    struct Canned {
        answers: VecDeque<ApiResponse>,
        seen: Vec<ApiRequest>,
    }

    impl Transport for Canned {
        fn send(&mut self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
            self.seen.push(request.clone());
            self.answers
                .pop_front()
                .ok_or_else(|| TransportError::Network("no canned answer".to_string()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        alerts: Vec<String>,
    }

    impl Prompter for Recorder {
        fn confirm(&mut self, _question: &str) -> bool {
            true
        }

        fn alert(&mut self, text: &str) {
            self.alerts.push(text.to_string());
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0)
            .single()
            .expect("valid now")
    }

    fn runtime(answers: Vec<ApiResponse>) -> Runtime<Canned, TextRenderer, Recorder, Vec<u8>> {
        let controller = ViewController::new(
            SessionContext::new("http://h/messages", "http://h/tag_groups"),
            DateFormat::default(),
        );
        let transport = Canned {
            answers: answers.into(),
            seen: vec![],
        };
        Runtime::new(
            controller,
            transport,
            TextRenderer::plain(),
            Recorder::default(),
            Vec::new(),
        )
        .with_clock(fixed_now)
    }

    #[test]
    fn unknown_status_renders_fallback_page() {
        let mut rt = runtime(vec![ApiResponse::new(503, "upstream down")]);
        rt.show_list().expect("dispatch");
        let text = String::from_utf8(rt.out().clone()).expect("utf8");
        assert_eq!(text, "Request failed (HTTP 503): upstream down\n");
        assert!(rt.ensure_not_failed().is_err());
    }

    #[test]
    fn delete_failure_becomes_alert() {
        let mut rt = runtime(vec![ApiResponse::new(500, r#"{"error":"database locked"}"#)]);
        rt.delete("4").expect("dispatch");
        assert_eq!(rt.prompter().alerts, ["Delete failed: database locked"]);
        assert_eq!(rt.transport().seen.len(), 1);
    }

    #[test]
    fn successful_delete_reloads_list() {
        let mut rt = runtime(vec![
            ApiResponse::new(204, ""),
            ApiResponse::new(200, r#"{"messages":[]}"#),
        ]);
        rt.delete("4").expect("dispatch");
        let seen = &rt.transport().seen;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].url, "http://h/messages");
        let text = String::from_utf8(rt.out().clone()).expect("utf8");
        assert_eq!(text, "Messages\nNo messages.\n");
    }

    #[test]
    fn muted_runtime_still_shows_errors() {
        let mut rt = runtime(vec![
            ApiResponse::new(200, r#"{"messages":[]}"#),
            ApiResponse::new(401, r#"{"error":"session expired"}"#),
        ]);
        rt.set_muted(true);
        rt.show_list().expect("dispatch");
        assert!(rt.out().is_empty());
        assert!(matches!(
            rt.last_screen().map(|screen| screen.template),
            Some(TemplateKey::MessageList)
        ));

        rt.show_list().expect("dispatch");
        let text = String::from_utf8(rt.out().clone()).expect("utf8");
        assert_eq!(text, "Not authorized to manage messages: session expired\n");
    }
}
