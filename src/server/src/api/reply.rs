//! Response object handed to safe handlers

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Standard API response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<'a, T> {
    pub code: i32,
    pub msg: Option<&'a str>,
    pub data: T,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("response has already been sent")]
    AlreadySent,
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] axum::http::header::InvalidHeaderValue),
}

/// Response under construction.
///
/// Once a body has been sent the reply is frozen: every further `send*`
/// call fails with [`ReplyError::AlreadySent`].
#[derive(Debug)]
pub struct Reply {
    status: StatusCode,
    content_type: Option<HeaderValue>,
    body: Option<Vec<u8>>,
}

impl Default for Reply {
    fn default() -> Self {
        Self::new()
    }
}

impl Reply {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: None,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.body.is_some()
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Set the status for the next `send`
    pub fn status(&mut self, status: StatusCode) -> Result<&mut Self, ReplyError> {
        self.ensure_unsent()?;
        self.status = status;
        Ok(self)
    }

    pub fn content_type(&mut self, value: &str) -> Result<&mut Self, ReplyError> {
        self.ensure_unsent()?;
        self.content_type = Some(HeaderValue::from_str(value)?);
        Ok(self)
    }

    /// Send `body` with the current status and content type
    pub fn send(&mut self, body: impl Into<Vec<u8>>) -> Result<&mut Self, ReplyError> {
        self.ensure_unsent()?;
        self.body = Some(body.into());
        Ok(self)
    }

    /// Send `status` with its canonical reason phrase as a plain-text body
    pub fn send_status(&mut self, status: StatusCode) -> Result<&mut Self, ReplyError> {
        let reason = status.canonical_reason().unwrap_or_default();
        self.status(status)?
            .content_type(TEXT_CONTENT_TYPE)?
            .send(reason)
    }

    /// Send `{code, msg, data}` as UTF-8 JSON
    pub fn send_json_result<T: Serialize>(
        &mut self,
        data: T,
        code: i32,
        msg: Option<&str>,
    ) -> Result<&mut Self, ReplyError> {
        self.ensure_unsent()?;
        let body = serde_json::to_vec(&ApiResponse { code, msg, data })?;
        self.content_type(JSON_CONTENT_TYPE)?.send(body)
    }

    /// `send_json_result` with `code = 0` and no message
    pub fn send_json<T: Serialize>(&mut self, data: T) -> Result<&mut Self, ReplyError> {
        self.send_json_result(data, 0, None)
    }

    fn ensure_unsent(&self) -> Result<(), ReplyError> {
        if self.is_sent() {
            Err(ReplyError::AlreadySent)
        } else {
            Ok(())
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body.unwrap_or_default()));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}
