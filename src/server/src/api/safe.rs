//! Safe handler wrapper
//!
//! Runs a synchronous request handler and turns any failure it raises
//! (an `Err` or a panic) into a generic `500` response. Work the handler
//! defers to another task is outside its reach.

use axum::{
    extract::ConnectInfo,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
};
use std::any::Any;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::reply::Reply;
use crate::events::{Event, EventEmitter};

/// What a handler gets to know about the request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub remote_addr: SocketAddr,
    pub method: Method,
    pub uri: Uri,
}

/// Handler signature accepted by [`SafeHandler`]
pub trait RouteHandler:
    Fn(&RequestContext, &mut Reply) -> anyhow::Result<()> + Send + Sync + 'static
{
}

impl<F> RouteHandler for F where
    F: Fn(&RequestContext, &mut Reply) -> anyhow::Result<()> + Send + Sync + 'static
{
}

type BoxedHandler = Arc<dyn RouteHandler>;

/// Wraps a handler so failures never escape as anything but a `500`
#[derive(Clone)]
pub struct SafeHandler {
    handler: Option<BoxedHandler>,
    events: Arc<EventEmitter>,
}

impl SafeHandler {
    pub fn new<H>(handler: H, events: Arc<EventEmitter>) -> Self
    where
        H: Fn(&RequestContext, &mut Reply) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: BoxedHandler = Arc::new(handler);
        Self {
            handler: Some(handler),
            events,
        }
    }

    /// Pass-through wrapper that always answers `500`
    pub fn none(events: Arc<EventEmitter>) -> Self {
        Self {
            handler: None,
            events,
        }
    }

    /// Run the wrapped handler for one request
    pub fn call(&self, ctx: RequestContext) -> Response {
        let mut reply = Reply::new();
        let Some(handler) = &self.handler else {
            // a fresh reply always accepts a status
            let _ = reply.send_status(StatusCode::INTERNAL_SERVER_ERROR);
            return reply.into_response();
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| handler(&ctx, &mut reply)));

        let failure = match outcome {
            Ok(Ok(())) if reply.is_sent() => None,
            Ok(Ok(())) => Some("handler returned without sending a response".to_string()),
            Ok(Err(e)) => Some(format!("{:#}", e)),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };

        if let Some(reason) = failure {
            self.events.emit(Event::HandlerFailed {
                method: ctx.method.to_string(),
                path: ctx.uri.path().to_string(),
                reason,
            });

            if let Err(e) = reply.send_status(StatusCode::INTERNAL_SERVER_ERROR) {
                self.events.emit(Event::ErrorResponseFailed {
                    method: ctx.method.to_string(),
                    path: ctx.uri.path().to_string(),
                    reason: format!("{} (sent {})", e, reply.status_code()),
                });
            }
        }

        reply.into_response()
    }

    /// Axum method router serving `GET` through this wrapper
    pub fn into_get<S>(self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        get(
            move |connect_info: ConnectInfo<SocketAddr>, method: Method, uri: Uri| {
                self.serve(connect_info, method, uri)
            },
        )
    }

    /// Axum method router serving every method through this wrapper
    pub fn into_any<S>(self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        axum::routing::any(
            move |connect_info: ConnectInfo<SocketAddr>, method: Method, uri: Uri| {
                self.serve(connect_info, method, uri)
            },
        )
    }

    async fn serve(
        self,
        ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
        method: Method,
        uri: Uri,
    ) -> Response {
        self.call(RequestContext {
            remote_addr,
            method,
            uri,
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header;

    fn ctx() -> RequestContext {
        RequestContext {
            remote_addr: "10.1.2.3:4567".parse().unwrap(),
            method: Method::GET,
            uri: Uri::from_static("/"),
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_successful_handler_passes_through() {
        let events = Arc::new(EventEmitter::default());
        let handler = SafeHandler::new(
            |ctx: &RequestContext, reply: &mut Reply| -> anyhow::Result<()> {
                reply.send_json(ctx.remote_addr.to_string())?;
                Ok(())
            },
            events,
        );

        let response = handler.call(ctx());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        assert_eq!(
            body_text(response).await,
            r#"{"code":0,"msg":null,"data":"10.1.2.3:4567"}"#
        );
    }

    #[tokio::test]
    async fn test_error_becomes_500() {
        let events = Arc::new(EventEmitter::default());
        let mut rx = events.subscribe();
        let handler = SafeHandler::new(
            |_: &RequestContext, _: &mut Reply| -> anyhow::Result<()> {
                anyhow::bail!("database unavailable")
            },
            Arc::clone(&events),
        );

        let response = handler.call(ctx());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal Server Error");

        let envelope = rx.try_recv().unwrap();
        match envelope.event {
            Event::HandlerFailed { reason, path, .. } => {
                assert_eq!(path, "/");
                assert!(reason.contains("database unavailable"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        let events = Arc::new(EventEmitter::default());
        let mut rx = events.subscribe();
        let handler = SafeHandler::new(
            |_: &RequestContext, _: &mut Reply| -> anyhow::Result<()> {
                panic!("handler blew up")
            },
            Arc::clone(&events),
        );

        let response = handler.call(ctx());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        match rx.try_recv().unwrap().event {
            Event::HandlerFailed { reason, .. } => assert!(reason.contains("handler blew up")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_after_send_keeps_original_response() {
        let events = Arc::new(EventEmitter::default());
        let mut rx = events.subscribe();
        let handler = SafeHandler::new(
            |_: &RequestContext, reply: &mut Reply| -> anyhow::Result<()> {
                reply.send_json("partial")?;
                anyhow::bail!("late failure")
            },
            Arc::clone(&events),
        );

        let response = handler.call(ctx());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            r#"{"code":0,"msg":null,"data":"partial"}"#
        );

        assert!(matches!(
            rx.try_recv().unwrap().event,
            Event::HandlerFailed { .. }
        ));
        match rx.try_recv().unwrap().event {
            Event::ErrorResponseFailed { reason, .. } => assert!(reason.contains("200 OK")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsent_reply_becomes_500() {
        let events = Arc::new(EventEmitter::default());
        let handler = SafeHandler::new(
            |_: &RequestContext, _: &mut Reply| -> anyhow::Result<()> { Ok(()) },
            events,
        );

        let response = handler.call(ctx());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_missing_handler_always_500() {
        let handler = SafeHandler::none(Arc::new(EventEmitter::default()));
        let response = handler.call(ctx());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal Server Error");
    }
}
