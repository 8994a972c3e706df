use std::time::Duration;

use anyhow::Context;
use tracing::{
  debug,
  warn
};

use crate::api::{
  ApiRequest,
  ApiResponse,
  Method,
  Transport,
  TransportError
};

/// Blocking HTTP transport for the
/// message and tag-group endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  client: reqwest::blocking::Client
}

impl HttpTransport {
  pub fn new(
    timeout: Duration
  ) -> anyhow::Result<Self> {
    let client =
      reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(
          "bulletin/",
          env!("CARGO_PKG_VERSION")
        ))
        .build()
        .context(
          "failed building HTTP client \
           for the message API"
        )?;
    Ok(Self {
      client
    })
  }
}

fn to_reqwest(
  method: Method
) -> reqwest::Method {
  match method {
    | Method::Get => reqwest::Method::GET,
    | Method::Post => {
      reqwest::Method::POST
    }
    | Method::Put => reqwest::Method::PUT,
    | Method::Delete => {
      reqwest::Method::DELETE
    }
  }
}

impl Transport for HttpTransport {
  #[tracing::instrument(
    skip(self, request),
    fields(
      method = %request.method,
      url = %request.url
    )
  )]
  fn send(
    &mut self,
    request: &ApiRequest
  ) -> Result<ApiResponse, TransportError>
  {
    let mut builder = self
      .client
      .request(
        to_reqwest(request.method),
        request.url.as_str()
      );
    for (name, value) in &request.headers {
      builder = builder
        .header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
      builder = builder.body(body.clone());
    }

    let response = match builder.send() {
      | Ok(response) => response,
      | Err(error) => {
        warn!(
          error = %error,
          "failed sending request"
        );
        return Err(TransportError::Network(
          error.to_string()
        ));
      }
    };

    let status = response.status();
    let body = match response.text() {
      | Ok(body) => body,
      | Err(error) => {
        warn!(
          status = status.as_u16(),
          error = %error,
          "failed reading response body"
        );
        return Err(TransportError::Network(
          error.to_string()
        ));
      }
    };

    debug!(
      status = status.as_u16(),
      bytes = body.len(),
      "received response"
    );
    Ok(ApiResponse::new(
      status.as_u16(),
      body
    ))
  }
}
