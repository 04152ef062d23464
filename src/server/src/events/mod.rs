//! Events Module
//!
//! Lifecycle and request-failure notifications. Every emitted event is
//! logged through `tracing` and broadcast to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    ListenerBound {
        api_id: Uuid,
        addr: SocketAddr,
    },
    ListenerBindFailed {
        api_id: Uuid,
        addr: SocketAddr,
        reason: String,
    },
    ListenerClosed {
        api_id: Uuid,
        addr: SocketAddr,
    },
    ListenerCloseFailed {
        api_id: Uuid,
        addr: SocketAddr,
        reason: String,
    },
    /// Serve loop failed after `start` had already succeeded
    ListenerFault {
        api_id: Uuid,
        addr: SocketAddr,
        reason: String,
    },
    HandlerFailed {
        method: String,
        path: String,
        reason: String,
    },
    /// Sending the 500 after a handler failure failed as well
    ErrorResponseFailed {
        method: String,
        path: String,
        reason: String,
    },
    ServerStarted {
        server_id: Uuid,
        addr: SocketAddr,
    },
    ServerStopped {
        server_id: Uuid,
    },
}

impl Event {
    /// Get event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Event::ListenerBound { .. } => "listener.bound",
            Event::ListenerBindFailed { .. } => "listener.bind_failed",
            Event::ListenerClosed { .. } => "listener.closed",
            Event::ListenerCloseFailed { .. } => "listener.close_failed",
            Event::ListenerFault { .. } => "listener.fault",
            Event::HandlerFailed { .. } => "handler.failed",
            Event::ErrorResponseFailed { .. } => "handler.error_response_failed",
            Event::ServerStarted { .. } => "server.started",
            Event::ServerStopped { .. } => "server.stopped",
        }
    }
}

/// Event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: Event,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

/// Event emitter
pub struct EventEmitter {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventEmitter {
    /// Create a new event emitter buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: Event) {
        Self::log(&event);

        // No subscribers is fine
        let _ = self.sender.send(EventEnvelope::new(event));
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    fn log(event: &Event) {
        let name = event.name();
        match event {
            Event::ListenerBound { api_id, addr } => {
                tracing::info!(event = name, %api_id, %addr, "Listener bound");
            }
            Event::ListenerClosed { api_id, addr } => {
                tracing::info!(event = name, %api_id, %addr, "Listener closed");
            }
            Event::ListenerBindFailed { api_id, addr, reason }
            | Event::ListenerCloseFailed { api_id, addr, reason }
            | Event::ListenerFault { api_id, addr, reason } => {
                tracing::error!(event = name, %api_id, %addr, %reason, "Listener error");
            }
            Event::HandlerFailed { method, path, reason } => {
                tracing::error!(event = name, %method, %path, %reason, "Request handler failed");
            }
            Event::ErrorResponseFailed { method, path, reason } => {
                tracing::warn!(
                    event = name,
                    %method,
                    %path,
                    %reason,
                    "Could not send error response"
                );
            }
            Event::ServerStarted { server_id, addr } => {
                tracing::info!(event = name, %server_id, %addr, "Server started");
            }
            Event::ServerStopped { server_id } => {
                tracing::info!(event = name, %server_id, "Server stopped");
            }
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(100)
    }
}
