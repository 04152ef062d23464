//! HTTP API Module
//!
//! The listener wrapper: binds the TCP socket, serves the status route and
//! closes the socket again on request.

pub mod handlers;
pub mod reply;
pub mod routes;
pub mod safe;

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub use handlers::StatusPayload;
pub use reply::{ApiResponse, Reply, ReplyError};
pub use safe::{RequestContext, SafeHandler};

use crate::error::{Result, ServerError};
use crate::events::Event;
use crate::lifecycle::Endpoint;
use crate::server::ServerHandle;

/// A bound listener and the task serving it
struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// API server
pub struct ApiServer {
    id: Uuid,
    server: ServerHandle,
    listener: Mutex<Option<ListenerHandle>>,
    local_addr: watch::Sender<Option<SocketAddr>>,
}

impl ApiServer {
    /// Create a new API server owned by `server`
    pub fn new(server: ServerHandle) -> Self {
        let (local_addr, _) = watch::channel(None);
        Self {
            id: Uuid::new_v4(),
            server,
            listener: Mutex::new(None),
            local_addr,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The owning server
    pub fn server(&self) -> &ServerHandle {
        &self.server
    }

    /// Address the listener is bound to, if running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.local_addr.borrow().is_some()
    }

    /// Build the router serving this API
    pub fn initialize_app(&self) -> Router {
        routes::create_routes(Arc::clone(self.server.events()))
    }

    /// Bind the listener and start serving.
    ///
    /// Resolves once the bind has either succeeded or failed; errors the
    /// serve loop hits afterwards are reported as [`Event::ListenerFault`].
    /// Resolves `Ok(false)` while a previous listener is open or draining.
    pub async fn start(&self) -> Result<bool> {
        let mut slot = self.listener.lock().await;
        if slot.is_some() {
            return Ok(false);
        }

        let app = self.initialize_app();
        let addr = self.server.config().socket_addr();
        let events = Arc::clone(self.server.events());

        let (listener, local_addr) = match bind(addr).await {
            Ok(bound) => bound,
            Err(source) => {
                events.emit(Event::ListenerBindFailed {
                    api_id: self.id,
                    addr,
                    reason: source.to_string(),
                });
                return Err(ServerError::Bind { addr, source });
            }
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let api_id = self.id;
        let task = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;

            if let Err(e) = result {
                events.emit(Event::ListenerFault {
                    api_id,
                    addr: local_addr,
                    reason: e.to_string(),
                });
            }
        });

        *slot = Some(ListenerHandle {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        });
        self.local_addr.send_replace(Some(local_addr));

        self.server.events().emit(Event::ListenerBound {
            api_id: self.id,
            addr: local_addr,
        });

        Ok(true)
    }

    /// Stop accepting connections and close the listener.
    ///
    /// The socket closes as soon as shutdown is signalled, then in-flight
    /// requests get up to the configured shutdown timeout to finish. If they
    /// do not, the listener is left draining: not running, serve task kept,
    /// and `stop` can be called again to wait for it.
    pub async fn stop(&self) -> Result<bool> {
        let mut slot = self.listener.lock().await;
        let Some(handle) = slot.as_mut() else {
            return Ok(false);
        };

        if let Some(tx) = handle.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.local_addr.send_replace(None);

        let addr = handle.local_addr;
        let timeout = self.server.config().shutdown_timeout();

        let outcome = match tokio::time::timeout(timeout, &mut handle.task).await {
            Err(_) => Err(ServerError::CloseTimeout { addr, timeout }),
            Ok(Err(join_error)) => {
                *slot = None;
                Err(ServerError::Close {
                    addr,
                    reason: join_error.to_string(),
                })
            }
            Ok(Ok(())) => {
                *slot = None;
                Ok(true)
            }
        };

        match &outcome {
            Ok(_) => self.server.events().emit(Event::ListenerClosed {
                api_id: self.id,
                addr,
            }),
            Err(e) => self.server.events().emit(Event::ListenerCloseFailed {
                api_id: self.id,
                addr,
                reason: e.to_string(),
            }),
        }

        outcome
    }
}

impl Endpoint for ApiServer {
    async fn start(&self) -> Result<bool> {
        ApiServer::start(self).await
    }

    async fn stop(&self) -> Result<bool> {
        ApiServer::stop(self).await
    }

    fn is_running(&self) -> bool {
        ApiServer::is_running(self)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        ApiServer::local_addr(self)
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        // Never leave a serve task running for a dropped server
        if let Some(handle) = self.listener.get_mut().take() {
            handle.task.abort();
        }
    }
}

async fn bind(addr: SocketAddr) -> std::io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}
