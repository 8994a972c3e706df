use tracing::warn;

use crate::api::{ApiRequest, Method};
use crate::config::{Config, DEFAULT_MESSAGE_API, DEFAULT_TAGS_API};
use crate::message::Level;

pub const SESSION_HEADER: &str = "X-SessionId";
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Credentials and endpoints for one admin session. Read-only to the
/// controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: Option<String>,
    pub csrf_token: Option<String>,
    pub message_api: String,
    pub tags_api: String,
    pub levels: Vec<Level>,
}

impl SessionContext {
    pub fn new(message_api: impl Into<String>, tags_api: impl Into<String>) -> Self {
        Self {
            session_id: None,
            csrf_token: None,
            message_api: trim_base(message_api.into()),
            tags_api: trim_base(tags_api.into()),
            levels: Level::ALL.to_vec(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        let mut session = Self::new(
            cfg.get("api.messages")
                .unwrap_or_else(|| DEFAULT_MESSAGE_API.to_string()),
            cfg.get("api.tags")
                .unwrap_or_else(|| DEFAULT_TAGS_API.to_string()),
        );
        session.session_id = cfg.get("session.id");
        session.csrf_token = cfg.get("session.csrf");
        session
    }

    pub fn with_credentials(
        mut self,
        session_id: Option<String>,
        csrf_token: Option<String>,
    ) -> Self {
        self.session_id = session_id;
        self.csrf_token = csrf_token;
        self
    }

    pub fn default_level(&self) -> Level {
        self.levels.first().copied().unwrap_or_default()
    }

    pub fn message_url(&self, id: Option<u64>) -> String {
        match id {
            Some(id) => format!("{}/{id}", self.message_api),
            None => self.message_api.clone(),
        }
    }

    /// Builds a request with the session headers attached. Without a CSRF
    /// token the header is left off and the backend decides.
    pub fn request(&self, method: Method, url: String, body: Option<String>) -> ApiRequest {
        let mut headers = Vec::new();
        if let Some(session_id) = &self.session_id {
            headers.push((SESSION_HEADER.to_string(), session_id.clone()));
        }
        if !method.is_safe() {
            match &self.csrf_token {
                Some(token) => headers.push((CSRF_HEADER.to_string(), token.clone())),
                None => warn!(%method, %url, "no csrf token configured for mutating request"),
            }
        }
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers.push(("Accept".to_string(), "application/json".to_string()));
        ApiRequest {
            method,
            url,
            headers,
            body,
        }
    }
}

fn trim_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionContext {
        SessionContext::new(
            "https://example.edu/api/v1/messages/",
            "https://example.edu/api/v1/tag_groups",
        )
        .with_credentials(Some("s-1".to_string()), Some("tok".to_string()))
    }

    #[test]
    fn safe_requests_carry_session_but_no_csrf() {
        let request = session().request(Method::Get, session().message_url(None), None);
        assert_eq!(request.url, "https://example.edu/api/v1/messages");
        assert_eq!(request.header(SESSION_HEADER), Some("s-1"));
        assert_eq!(request.header(CSRF_HEADER), None);
    }

    #[test]
    fn mutating_requests_carry_csrf() {
        let request = session().request(
            Method::Delete,
            session().message_url(Some(42)),
            None,
        );
        assert_eq!(request.url, "https://example.edu/api/v1/messages/42");
        assert_eq!(request.header(CSRF_HEADER), Some("tok"));
    }

    #[test]
    fn no_session_header_without_session_id() {
        let session = SessionContext::new("http://h/m", "http://h/t");
        let request = session.request(Method::Get, session.message_url(None), None);
        assert_eq!(request.header(SESSION_HEADER), None);
        assert_eq!(session.default_level(), Level::Info);
    }

    #[test]
    fn missing_csrf_token_omits_header() {
        let session = SessionContext::new("http://h/m", "http://h/t")
            .with_credentials(Some("s-1".to_string()), None);
        let request = session.request(
            Method::Put,
            session.message_url(Some(3)),
            Some("{}".to_string()),
        );
        assert_eq!(request.header(SESSION_HEADER), Some("s-1"));
        assert_eq!(request.header(CSRF_HEADER), None);
        assert!(!request.headers.iter().any(|(_, value)| value.is_empty()));
    }
}
