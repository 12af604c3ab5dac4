use crate::{
    config::DispatchConfig,
    core::{ChannelMessage, DestinationFactory, DestinationResponse, DestinationType, Message},
    dispatch::DispatchError,
};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::{debug, error, info, instrument, warn};

/// Object-safe view of a [`DestinationFactory`] keyed only by [`Message`].
#[async_trait]
trait ErasedFactory: Send + Sync {
    async fn publish_message(&self, message: &Message) -> Result<DestinationResponse, DispatchError>;
}

#[async_trait]
impl<F: DestinationFactory> ErasedFactory for F {
    async fn publish_message(&self, message: &Message) -> Result<DestinationResponse, DispatchError> {
        let typed = F::Message::from_message(message).ok_or(DispatchError::MessageTypeMismatch {
            expected: F::Message::DESTINATION_TYPE,
            actual: message.destination_type(),
        })?;
        self.publish(typed).await
    }
}

type FactoryMap = HashMap<DestinationType, Arc<dyn ErasedFactory>>;
type AllowList = Option<HashSet<DestinationType>>;

/// Routes each message to the factory registered for its destination type.
///
/// Lookups read an immutable snapshot of the registry and take no lock.
/// Registration copies the snapshot under a mutex and swaps it in, so it is
/// meant for startup and teardown rather than the hot path. The allow-list is
/// swapped the same way and can be replaced while dispatches are in flight.
pub struct Dispatcher {
    factories: ArcSwap<FactoryMap>,
    registration: Mutex<()>,
    default_timeout: Duration,
    allowed_types: ArcSwap<AllowList>,
}

impl Dispatcher {
    /// Creates a dispatcher with no registered factories.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            factories: ArcSwap::from_pointee(FactoryMap::new()),
            registration: Mutex::new(()),
            default_timeout: config.default_timeout(),
            allowed_types: ArcSwap::from_pointee(allow_list(config.allowed_types.as_deref())),
        }
    }

    /// Replaces the allow-list. `None` permits every destination type.
    ///
    /// Registered factories and their cached clients are untouched; only
    /// dispatches that start after the call see the new list.
    pub fn set_allowed_types(&self, allowed_types: Option<Vec<DestinationType>>) {
        info!(allowed = ?allowed_types, "Updated destination allow-list");
        self.allowed_types
            .store(Arc::new(allow_list(allowed_types.as_deref())));
    }

    /// Registers `factory` as the handler for `destination_type`.
    ///
    /// Fails with `DuplicateRegistration` when a factory is already registered
    /// for the type (the existing one stays active), and with
    /// `FactoryTypeMismatch` when the factory handles a different type.
    pub fn register<F: DestinationFactory>(
        &self,
        destination_type: DestinationType,
        factory: Arc<F>,
    ) -> Result<(), DispatchError> {
        let handles = F::Message::DESTINATION_TYPE;
        if handles != destination_type {
            error!(registered_as = %destination_type, %handles, "Factory registered under the wrong destination type");
            return Err(DispatchError::FactoryTypeMismatch {
                registered_as: destination_type,
                handles,
            });
        }

        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let current = self.factories.load();
        if current.contains_key(&destination_type) {
            error!(destination = %destination_type, "Factory already registered for destination type");
            return Err(DispatchError::DuplicateRegistration(destination_type));
        }

        let mut next = FactoryMap::clone(&current);
        next.insert(destination_type, factory);
        self.factories.store(Arc::new(next));
        info!(destination = %destination_type, "Registered destination factory");
        Ok(())
    }

    /// Removes the factory for `destination_type`. Returns whether one was registered.
    pub fn deregister(&self, destination_type: DestinationType) -> bool {
        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let current = self.factories.load();
        if !current.contains_key(&destination_type) {
            return false;
        }

        let mut next = FactoryMap::clone(&current);
        next.remove(&destination_type);
        self.factories.store(Arc::new(next));
        info!(destination = %destination_type, "Deregistered destination factory");
        true
    }

    /// Drops every registered factory and the clients they own.
    pub fn clear(&self) {
        let _guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.factories.store(Arc::new(FactoryMap::new()));
        info!("Cleared all destination factories");
    }

    pub fn is_registered(&self, destination_type: DestinationType) -> bool {
        self.factories.load().contains_key(&destination_type)
    }

    /// Registered destination types, in declaration order.
    pub fn registered_types(&self) -> Vec<DestinationType> {
        let factories = self.factories.load();
        DestinationType::ALL
            .into_iter()
            .filter(|t| factories.contains_key(t))
            .collect()
    }

    /// Registered destination types that the allow-list also permits.
    pub fn available_types(&self) -> Vec<DestinationType> {
        self.registered_types()
            .into_iter()
            .filter(|t| self.is_allowed(*t))
            .collect()
    }

    pub fn is_allowed(&self, destination_type: DestinationType) -> bool {
        self.allowed_types
            .load()
            .as_ref()
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&destination_type))
    }

    /// Publishes `message` through the factory registered for its type.
    ///
    /// The publish is bounded by the message's own timeout, or the configured
    /// default; when it elapses the in-flight I/O is dropped and a `TimedOut`
    /// response is returned.
    ///
    /// # Returns
    /// * `Ok(DestinationResponse)` with whatever the factory reported, success or failure
    /// * `Err(DestinationTypeNotAllowed)` or `Err(UnregisteredDestinationType)` before any I/O
    /// * `Err` with any configuration error raised by the factory
    #[instrument(skip_all, fields(destination = %message.destination_type()))]
    pub async fn dispatch(&self, message: &Message) -> Result<DestinationResponse, DispatchError> {
        let destination_type = message.destination_type();
        let label = destination_type.as_str();

        if !self.is_allowed(destination_type) {
            warn!("Destination type is not allowed, refusing to dispatch");
            metrics::counter!("destination_dispatch_total", "destination" => label, "status" => "not_allowed")
                .increment(1);
            return Err(DispatchError::DestinationTypeNotAllowed(destination_type));
        }

        let Some(factory) = self.factories.load().get(&destination_type).cloned() else {
            warn!("No factory registered for destination type");
            metrics::counter!("destination_dispatch_total", "destination" => label, "status" => "unregistered")
                .increment(1);
            return Err(DispatchError::UnregisteredDestinationType(destination_type));
        };

        let timeout = message.timeout().unwrap_or(self.default_timeout);
        let start = Instant::now();
        let result = match tokio::time::timeout(timeout, factory.publish_message(message)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Publish timed out");
                Ok(DestinationResponse::timed_out(format!(
                    "publish did not complete within {}ms",
                    timeout.as_millis()
                )))
            }
        };
        metrics::histogram!("destination_dispatch_duration_seconds", "destination" => label)
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(response) => {
                debug!(status = response.status.as_str(), code = ?response.status_code, "Publish finished");
                metrics::counter!("destination_dispatch_total", "destination" => label, "status" => response.status.as_str())
                    .increment(1);
            }
            Err(e) => {
                error!(error = %e, "Publish failed before reaching the transport");
                metrics::counter!("destination_dispatch_total", "destination" => label, "status" => "error")
                    .increment(1);
            }
        }
        result
    }
}

fn allow_list(types: Option<&[DestinationType]>) -> AllowList {
    types.map(|types| types.iter().copied().collect())
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registered", &self.registered_types())
            .field("default_timeout", &self.default_timeout)
            .field("allowed_types", &*self.allowed_types.load())
            .finish()
    }
}
