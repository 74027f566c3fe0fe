use super::state::SlotState;
use crate::error::{PipelineError, Result};
use log::debug;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Identity of the exact dataset and config objects behind a request.
///
/// Compares by allocation, not by value: two equal configs living in
/// different `Arc`s are different requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKey {
    dataset: usize,
    config: usize,
}

impl RequestKey {
    pub fn of<D, C>(dataset: &Arc<D>, config: &Arc<C>) -> Self {
        Self {
            dataset: Arc::as_ptr(dataset) as *const () as usize,
            config: Arc::as_ptr(config) as *const () as usize,
        }
    }
}

/// Proof that a request was registered with the slot before dispatch
#[derive(Debug, Clone)]
pub struct RequestToken<K> {
    key: K,
    ticket: u64,
}

impl<K> RequestToken<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

/// What happened to a finished request
#[derive(Debug)]
pub enum SlotOutcome<T> {
    /// Still the latest request; observers were notified
    Delivered(Arc<T>),
    /// Still the latest request, but the job failed
    Failed(PipelineError),
    /// Superseded by a newer request; dropped silently
    Discarded,
}

impl<T> SlotOutcome<T> {
    pub fn delivered(self) -> Option<Arc<T>> {
        match self {
            SlotOutcome::Delivered(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, SlotOutcome::Discarded)
    }
}

/// Latest-request-wins bookkeeping for one logical slot, such as "the
/// current motion-delta computation".
///
/// Each request is registered before it is dispatched. When it finishes,
/// its result is delivered only if no newer request has been registered
/// since; otherwise it is discarded and nobody is notified.
pub struct RequestArbiter<K, T> {
    slot: Mutex<SlotState<K>>,
    next_ticket: AtomicU64,
    latest: watch::Sender<Option<Arc<T>>>,
    delivered: AtomicU64,
    discarded: AtomicU64,
}

impl<K, T> RequestArbiter<K, T>
where
    K: Clone + PartialEq,
{
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            slot: Mutex::new(SlotState::Idle),
            next_ticket: AtomicU64::new(0),
            latest,
            delivered: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Register a new request, superseding whatever is pending
    pub fn begin(&self, key: K) -> RequestToken<K> {
        let mut slot = self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        *slot = SlotState::Pending {
            key: key.clone(),
            ticket,
        };
        RequestToken { key, ticket }
    }

    /// Settle a request registered with `begin`
    pub fn complete(&self, token: RequestToken<K>, result: Result<T>) -> SlotOutcome<T> {
        {
            let mut slot = self.slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let current = match &*slot {
                SlotState::Pending { key, ticket } => *ticket == token.ticket && *key == token.key,
                SlotState::Idle => false,
            };
            if !current {
                drop(slot);
                self.discarded.fetch_add(1, Ordering::Relaxed);
                debug!("discarding stale result for request {}", token.ticket);
                return SlotOutcome::Discarded;
            }
            *slot = SlotState::Idle;
        }

        match result {
            Ok(value) => {
                let value = Arc::new(value);
                self.latest.send_replace(Some(Arc::clone(&value)));
                self.delivered.fetch_add(1, Ordering::Relaxed);
                SlotOutcome::Delivered(value)
            }
            Err(e) => SlotOutcome::Failed(e),
        }
    }

    /// Register `key`, then create and await the dispatch future
    pub async fn run<F, Fut>(&self, key: K, dispatch: F) -> SlotOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let token = self.begin(key);
        let result = dispatch().await;
        self.complete(token, result)
    }

    pub fn state(&self) -> SlotState<K> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn current_key(&self) -> Option<K> {
        self.state().key().cloned()
    }

    pub fn is_pending(&self) -> bool {
        self.state().is_pending()
    }

    /// Receiver that sees every delivered result and nothing else
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<T>>> {
        self.latest.subscribe()
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn discarded_count(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

impl<K, T> Default for RequestArbiter<K, T>
where
    K: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}
