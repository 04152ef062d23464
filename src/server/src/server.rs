//! Player Server - Lifecycle Coordinator
//!
//! Owns at most one listener at a time. Every `start` throws the previous
//! listener away and builds a new one; nothing is restarted in place.

use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use uuid::Uuid;

use crate::api::ApiServer;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::events::{Event, EventEmitter};
use crate::lifecycle::{Endpoint, LifecycleState};

/// Read-only view of a [`Server`] handed to the endpoints it creates
#[derive(Clone)]
pub struct ServerHandle {
    id: Uuid,
    config: Arc<ServerConfig>,
    events: Arc<EventEmitter>,
    state: watch::Receiver<LifecycleState>,
}

impl ServerHandle {
    /// Handle for an endpoint running without an owning server
    pub fn detached(config: ServerConfig, events: Arc<EventEmitter>) -> Self {
        let (_, state) = watch::channel(LifecycleState::Stopped);
        Self {
            id: Uuid::new_v4(),
            config: Arc::new(config),
            events,
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventEmitter> {
        &self.events
    }

    /// Owner's current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }
}

type EndpointFactory<E> = Box<dyn Fn(ServerHandle) -> E + Send + Sync>;

/// Main player server
pub struct Server<E: Endpoint = ApiServer> {
    /// Handle given to every endpoint this server creates
    handle: ServerHandle,
    /// Builds a fresh endpoint per start
    factory: EndpointFactory<E>,
    /// Serializes start/stop/restart
    transition: Mutex<()>,
    /// Lifecycle state
    state: watch::Sender<LifecycleState>,
    /// Current endpoint
    api: RwLock<Option<Arc<E>>>,
}

impl Server<ApiServer> {
    /// Create a server that listens according to `config`
    pub fn new(config: ServerConfig) -> Self {
        Self::with_factory(config, Arc::new(EventEmitter::default()), ApiServer::new)
    }
}

impl<E: Endpoint> Server<E> {
    /// Create a server that builds its endpoints with `factory`
    pub fn with_factory<F>(config: ServerConfig, events: Arc<EventEmitter>, factory: F) -> Self
    where
        F: Fn(ServerHandle) -> E + Send + Sync + 'static,
    {
        let (state, state_rx) = watch::channel(LifecycleState::Stopped);
        let handle = ServerHandle {
            id: Uuid::new_v4(),
            config: Arc::new(config),
            events,
            state: state_rx,
        };

        Self {
            handle,
            factory: Box::new(factory),
            transition: Mutex::new(()),
            state,
            api: RwLock::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.handle.id
    }

    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    pub fn config(&self) -> &ServerConfig {
        self.handle.config()
    }

    pub fn events(&self) -> &Arc<EventEmitter> {
        self.handle.events()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Current endpoint, if any
    pub async fn api(&self) -> Option<Arc<E>> {
        self.api.read().await.clone()
    }

    /// Start the server.
    ///
    /// Resolves `Ok(false)` if it is already running. On failure the server
    /// is left stopped and the error from the endpoint is returned.
    pub async fn start(&self) -> Result<bool> {
        let _transition = self.transition.lock().await;
        self.start_locked().await
    }

    /// Stop the server.
    ///
    /// Resolves `Ok(false)` if it is not running. If the endpoint fails to
    /// stop, the endpoint is kept so `stop` can be retried, and the server is
    /// back in `Running` if the endpoint still accepts or left in `Stopping`
    /// while it drains.
    pub async fn stop(&self) -> Result<bool> {
        let _transition = self.transition.lock().await;
        self.stop_locked().await
    }

    /// Stop (if running) and start again with a fresh endpoint
    pub async fn restart(&self) -> Result<bool> {
        let _transition = self.transition.lock().await;
        self.stop_locked().await?;
        self.start_locked().await
    }

    async fn start_locked(&self) -> Result<bool> {
        if self.is_running() {
            return Ok(false);
        }

        self.set_state(LifecycleState::Starting);
        tracing::info!(server_id = %self.id(), "Starting server...");

        if let Err(e) = self.dispose_api(true).await {
            self.dispose_api(false).await.ok();
            self.set_state(LifecycleState::Stopped);
            return Err(e);
        }

        let api = Arc::new((self.factory)(self.handle.clone()));

        match api.start().await {
            Ok(_) => {
                let addr = api
                    .local_addr()
                    .unwrap_or_else(|| self.config().socket_addr());
                *self.api.write().await = Some(api);
                self.set_state(LifecycleState::Running);
                self.events().emit(Event::ServerStarted {
                    server_id: self.id(),
                    addr,
                });
                Ok(true)
            }
            Err(e) => {
                if let Err(cleanup) = api.stop().await {
                    tracing::debug!(
                        error = %cleanup,
                        "Ignoring cleanup failure after failed start"
                    );
                }
                self.dispose_api(false).await.ok();
                self.set_state(LifecycleState::Stopped);
                Err(e)
            }
        }
    }

    async fn stop_locked(&self) -> Result<bool> {
        // Stopping under the lock means an earlier stop left the endpoint draining
        if !matches!(
            self.state(),
            LifecycleState::Running | LifecycleState::Stopping
        ) {
            return Ok(false);
        }

        self.set_state(LifecycleState::Stopping);
        tracing::info!(server_id = %self.id(), "Stopping server...");

        match self.dispose_api(true).await {
            Ok(()) => {
                self.set_state(LifecycleState::Stopped);
                self.events().emit(Event::ServerStopped {
                    server_id: self.id(),
                });
                Ok(true)
            }
            Err(e) => {
                let accepting = self.api().await.is_some_and(|api| api.is_running());
                self.set_state(if accepting {
                    LifecycleState::Running
                } else {
                    LifecycleState::Stopping
                });
                Err(e)
            }
        }
    }

    /// Stop and drop the current endpoint.
    ///
    /// With `throw_on_error` a stop failure is returned and the endpoint is
    /// kept; otherwise the failure is logged and the endpoint dropped anyway.
    async fn dispose_api(&self, throw_on_error: bool) -> Result<()> {
        let Some(api) = self.api().await else {
            return Ok(());
        };

        match api.stop().await {
            Ok(_) => {}
            Err(e) if throw_on_error => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding endpoint that failed to stop");
            }
        }

        *self.api.write().await = None;
        Ok(())
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.send_replace(state);
    }
}
