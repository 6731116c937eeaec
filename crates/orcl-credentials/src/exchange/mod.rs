//! Protocol exchanges between agents.
//!
//! Each exchange is a record driven by the pure transition functions in
//! `orcl-core`. Services apply the returned effects by building outbound
//! [`AgentMessage`]s; delivering them is left to the caller. Messages for
//! one record are processed one at a time, different records concurrently.

pub mod issuance;
pub mod message;
pub mod proof;

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::{CredentialError, ExchangeError};

pub use issuance::{CredentialExchangeRecord, CredentialExchangeService};
pub use message::{AgentMessage, MessageBody, Protocol};
pub use proof::{ProofExchangeRecord, ProofExchangeService};

/// What handling one operation or inbound message produced.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome<R> {
    /// The record after the step.
    pub record: R,
    /// Messages to deliver, in order.
    pub outbound: Vec<AgentMessage>,
    /// The inbound message had already been processed; nothing changed.
    pub replayed: bool,
    /// Why a received document was rejected, when it was.
    pub failure: Option<CredentialError>,
}

impl<R> ExchangeOutcome<R> {
    pub(crate) fn new(record: R, outbound: Vec<AgentMessage>) -> Self {
        Self {
            record,
            outbound,
            replayed: false,
            failure: None,
        }
    }

    pub(crate) fn replayed(record: R) -> Self {
        Self {
            record,
            outbound: Vec::new(),
            replayed: true,
            failure: None,
        }
    }
}

/// Exchange records, each behind its own lock, indexed by id and thread.
pub(crate) struct RecordStore<R> {
    records: DashMap<String, Arc<Mutex<R>>>,
    threads: DashMap<String, String>,
}

impl<R> RecordStore<R> {
    pub(crate) fn new() -> Self {
        Self {
            records: DashMap::new(),
            threads: DashMap::new(),
        }
    }

    pub(crate) fn insert(&self, id: &str, thread_id: &str, record: R) -> Arc<Mutex<R>> {
        let handle = Arc::new(Mutex::new(record));
        self.records.insert(id.to_string(), handle.clone());
        self.threads.insert(thread_id.to_string(), id.to_string());
        handle
    }

    pub(crate) fn get(&self, id: &str) -> Result<Arc<Mutex<R>>, ExchangeError> {
        self.records
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ExchangeError::RecordNotFound(id.to_string()))
    }

    /// The record of `thread_id`, or a new one from `create` when the thread
    /// is unknown. Concurrent first deliveries of a thread create one record.
    pub(crate) fn get_or_create<F>(
        &self,
        thread_id: &str,
        create: F,
    ) -> Result<(Arc<Mutex<R>>, bool), ExchangeError>
    where
        F: FnOnce() -> Result<(String, R), ExchangeError>,
    {
        match self.threads.entry(thread_id.to_string()) {
            Entry::Occupied(entry) => {
                let id = entry.get().clone();
                drop(entry);
                Ok((self.get(&id)?, false))
            }
            Entry::Vacant(entry) => {
                let (id, record) = create()?;
                let handle = Arc::new(Mutex::new(record));
                self.records.insert(id.clone(), handle.clone());
                entry.insert(id);
                Ok((handle, true))
            }
        }
    }

    pub(crate) fn by_thread(&self, thread_id: &str) -> Result<Arc<Mutex<R>>, ExchangeError> {
        let id = self
            .threads
            .get(thread_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ExchangeError::RecordNotFound(thread_id.to_string()))?;
        self.get(&id)
    }

    pub(crate) fn handles(&self) -> Vec<Arc<Mutex<R>>> {
        self.records.iter().map(|entry| entry.value().clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
