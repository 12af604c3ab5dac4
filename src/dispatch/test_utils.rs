use crate::{
    config::ClientCacheConfig,
    core::{ChannelMessage, DestinationFactory, DestinationResponse},
    dispatch::{ClientCache, DispatchError},
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Client handed out by [`FakeFactory`]; `id` is the construction sequence number.
#[derive(Debug)]
pub struct FakeClient {
    pub id: u64,
    pub target: String,
}

/// Fake factory for testing
///
/// Answers with queued results first, then with a default response. Clients are
/// cached by the message target; an empty target fails client construction.
pub struct FakeFactory<M> {
    default_response: DestinationResponse,
    // A queue of results. The front of the queue is the next result.
    results: Mutex<VecDeque<Result<DestinationResponse, DispatchError>>>,
    delay: Option<Duration>,
    publish_count: AtomicUsize,
    next_client_id: AtomicU64,
    targets: Mutex<Vec<String>>,
    clients: ClientCache<FakeClient>,
    _message: PhantomData<fn(&M)>,
}

impl<M: ChannelMessage> FakeFactory<M> {
    /// A factory that answers every publish with `response`.
    pub fn responding(response: DestinationResponse) -> Self {
        Self {
            default_response: response,
            results: Mutex::new(VecDeque::new()),
            delay: None,
            publish_count: AtomicUsize::new(0),
            next_client_id: AtomicU64::new(1),
            targets: Mutex::new(Vec::new()),
            clients: ClientCache::new(M::DESTINATION_TYPE, &ClientCacheConfig::default()),
            _message: PhantomData,
        }
    }

    /// Sleeps this long inside every publish, before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a result for the next publish
    pub fn push_result(&self, result: Result<DestinationResponse, DispatchError>) {
        self.results.lock().unwrap().push_back(result);
    }

    /// Get the number of times publish was called
    pub fn publish_count(&self) -> usize {
        self.publish_count.load(Ordering::SeqCst)
    }

    /// Get the number of clients the factory built
    pub fn constructions(&self) -> u64 {
        self.clients.constructions()
    }

    /// Targets of every published message, in call order
    pub fn published_targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl<M: ChannelMessage> DestinationFactory for FakeFactory<M> {
    type Message = M;
    type Client = FakeClient;

    async fn get_client(&self, message: &M) -> Result<Arc<FakeClient>, DispatchError> {
        let target = message.target().into_owned();
        self.clients
            .get_or_build(&target, || {
                if target.is_empty() {
                    return Err(DispatchError::client_construction(
                        M::DESTINATION_TYPE,
                        "message has no target",
                    ));
                }
                Ok(FakeClient {
                    id: self.next_client_id.fetch_add(1, Ordering::SeqCst),
                    target: target.clone(),
                })
            })
            .await
    }

    async fn publish(&self, message: &M) -> Result<DestinationResponse, DispatchError> {
        self.publish_count.fetch_add(1, Ordering::SeqCst);
        self.targets.lock().unwrap().push(message.target().into_owned());
        self.get_client(message).await?;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(self.default_response.clone()))
    }
}
