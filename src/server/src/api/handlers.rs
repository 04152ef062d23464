//! API Request Handlers

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::reply::Reply;
use super::safe::RequestContext;

/// Status payload served on `GET /`
#[derive(Debug, Serialize)]
pub struct StatusPayload {
    /// Current UTC time, ISO-8601 with millisecond precision
    pub now: String,
    /// Caller address as `ip:port`
    pub you: String,
}

impl StatusPayload {
    pub fn for_request(ctx: &RequestContext) -> Self {
        Self {
            now: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            you: format!("{}:{}", ctx.remote_addr.ip(), ctx.remote_addr.port()),
        }
    }
}

// ============ Handlers ============

/// Report server time and the caller's address
pub fn get_status(ctx: &RequestContext, reply: &mut Reply) -> anyhow::Result<()> {
    reply.send_json(StatusPayload::for_request(ctx))?;
    Ok(())
}
