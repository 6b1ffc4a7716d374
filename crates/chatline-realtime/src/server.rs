//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chatline_core::config::RealtimeConfig;
use chatline_core::error::AppResult;
use chatline_core::traits::{NotificationService, PresenceStore};
use chatline_core::types::id::{BusinessId, ConnectionId, UserId};

use crate::collaborators::Collaborators;
use crate::connection::ConnectionHandle;
use crate::dispatch::CommandDispatcher;
use crate::hub::{Hub, HubStats};

/// Owns the hub, the dispatcher and the background tasks driving them.
///
/// Transport code (a WebSocket server, a test harness) calls
/// [`connect`](Self::connect) once the user is authenticated, feeds every
/// inbound text frame to [`handle_frame`](Self::handle_frame), drains the
/// returned receiver into the socket, and calls
/// [`disconnect`](Self::disconnect) when the socket closes.
pub struct RealtimeEngine {
    hub: Arc<Hub>,
    dispatcher: Arc<CommandDispatcher>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("hub", &self.hub)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl RealtimeEngine {
    /// Build the hub and spawn its control loop and the typing sweeper.
    pub fn start(config: RealtimeConfig, collaborators: Collaborators) -> Self {
        Self::start_with_token(config, collaborators, CancellationToken::new())
    }

    /// Like [`start`](Self::start), stopping when `cancel` fires.
    pub fn start_with_token(
        config: RealtimeConfig,
        collaborators: Collaborators,
        cancel: CancellationToken,
    ) -> Self {
        let (hub, event_loop) = Hub::new(config, collaborators);
        let dispatcher = Arc::new(CommandDispatcher::new(hub.clone()));

        let hub_task = tokio::spawn(event_loop.run(cancel.child_token()));
        let sweeper_task = tokio::spawn(hub.typing().clone().run_sweeper(cancel.child_token()));

        info!("Real-time engine started");

        Self {
            hub,
            dispatcher,
            cancel,
            tasks: Mutex::new(vec![hub_task, sweeper_task]),
        }
    }

    /// Get the hub.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Get the command dispatcher.
    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    /// Bind the presence store after startup.
    pub fn set_presence_store(&self, store: Arc<dyn PresenceStore>) {
        self.hub.set_presence_store(store);
    }

    /// Bind the notification service after startup.
    pub fn set_notification_service(&self, service: Arc<dyn NotificationService>) {
        self.hub.set_notification_service(service);
    }

    /// Register a connection for an authenticated user.
    pub async fn connect(
        &self,
        user_id: UserId,
        business_id: Option<BusinessId>,
    ) -> AppResult<(Arc<ConnectionHandle>, mpsc::Receiver<Bytes>)> {
        self.hub.connect(user_id, business_id).await
    }

    /// Handle one inbound text frame. Errors were already sent to the client.
    pub async fn handle_frame(&self, conn: &Arc<ConnectionHandle>, raw: &str) -> AppResult<()> {
        self.dispatcher.dispatch_raw(conn, raw).await
    }

    /// Unregister a connection whose socket closed.
    pub async fn disconnect(&self, conn_id: ConnectionId) -> AppResult<bool> {
        self.hub.unregister(conn_id).await
    }

    /// Current hub statistics.
    pub fn stats(&self) -> HubStats {
        self.hub.stats()
    }

    /// Token that stops the background tasks.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the control loop and the sweeper and wait for them to exit.
    ///
    /// Every remaining connection is unregistered on the way out.
    pub async fn shutdown(&self) {
        info!("Shutting down real-time engine");
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task terminated abnormally");
            }
        }

        info!("Real-time engine shut down");
    }
}
