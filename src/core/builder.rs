use std::sync::Arc;

use tokio::sync::mpsc;

use super::{config::Config, config::Settings, herd::Herd};
use crate::backend::ProcessBackend;
use crate::events::Bus;
use crate::handler::{HandlerRef, NoopHandler};
use crate::subscribers::Subscribe;

/// Capacity of the control queue between handles and the master loop.
const CONTROL_QUEUE: usize = 64;

/// Builder for constructing a [`Herd`] with optional features.
pub struct HerdBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    handler: Option<HandlerRef>,
    backend: Option<Box<dyn ProcessBackend>>,
}

impl HerdBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            handler: None,
            backend: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (spawns, exits, reload steps, shutdown)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the worker entry point. Without one, workers idle until stopped.
    pub fn with_handler(mut self, handler: HandlerRef) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Replaces the default [`CommandBackend`](crate::CommandBackend).
    pub fn with_backend(mut self, backend: impl ProcessBackend) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    /// Builds the [`Herd`].
    ///
    /// Does not spawn anything; the event bus and control queue are created so
    /// that handles can be taken before [`Herd::run`].
    pub fn build(self) -> Herd {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let settings = Settings::new(self.cfg);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE);
        let handler = self
            .handler
            .unwrap_or_else(|| Arc::new(NoopHandler) as HandlerRef);

        Herd::new_internal(
            settings,
            bus,
            self.subscribers,
            handler,
            self.backend,
            control_tx,
            control_rx,
        )
    }
}
