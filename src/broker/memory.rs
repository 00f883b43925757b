//! In-memory broker engine.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use dashmap::DashMap;

use crate::broker::metadata::{self, Metadata, TopicMetadata};
use crate::broker::{Broker, BrokerError};
use crate::config::BrokerConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::protocol::command::validate_topic;
use crate::protocol::PublishRequest;

#[derive(Debug, Default)]
struct Topic {
    messages: VecDeque<Bytes>,
    published: u64,
    dropped: u64,
}

/// Point-in-time view of one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicStats {
    pub name: String,
    pub depth: usize,
    pub published: u64,
    pub dropped: u64,
}

/// Keeps each topic's most recent messages in a bounded queue.
///
/// When a queue is full the oldest message is discarded.
#[derive(Debug)]
pub struct MemoryBroker {
    topics: DashMap<String, Topic>,
    metadata_path: PathBuf,
    mem_queue_size: usize,
    shutdown: Shutdown,
    persist_lock: Mutex<()>,
}

impl MemoryBroker {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            topics: DashMap::new(),
            metadata_path: metadata::metadata_path(Path::new(&config.data_path)),
            mem_queue_size: config.mem_queue_size.max(1),
            shutdown: Shutdown::new(),
            persist_lock: Mutex::new(()),
        }
    }

    /// Sorted names of every known topic.
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.iter().map(|t| t.key().clone()).collect();
        names.sort();
        names
    }

    pub fn stats(&self, topic: &str) -> Option<TopicStats> {
        self.topics.get(topic).map(|t| TopicStats {
            name: topic.to_string(),
            depth: t.messages.len(),
            published: t.published,
            dropped: t.dropped,
        })
    }

    /// Remove and return every queued message for a topic, oldest first.
    pub fn drain(&self, topic: &str) -> Vec<Bytes> {
        self.topics
            .get_mut(topic)
            .map(|mut t| t.messages.drain(..).collect())
            .unwrap_or_default()
    }

    fn snapshot(&self) -> Metadata {
        Metadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            topics: self
                .topic_names()
                .into_iter()
                .map(|name| TopicMetadata { name })
                .collect(),
        }
    }
}

impl Broker for MemoryBroker {
    fn publish(&self, request: PublishRequest) -> Result<(), BrokerError> {
        if self.shutdown.is_triggered() {
            return Err(BrokerError::Exiting);
        }

        let (name, body) = request.into_parts();
        let mut topic = self.topics.entry(name).or_default();
        if topic.messages.len() >= self.mem_queue_size {
            topic.messages.pop_front();
            topic.dropped += 1;
        }
        topic.messages.push_back(body);
        topic.published += 1;

        metrics::record_message_published();
        Ok(())
    }

    fn load_metadata(&self) -> Result<(), BrokerError> {
        let Some(loaded) = metadata::read(&self.metadata_path)? else {
            tracing::info!(path = %self.metadata_path.display(), "No metadata found, starting empty");
            return Ok(());
        };

        for topic in loaded.topics {
            if let Err(e) = validate_topic(&topic.name) {
                tracing::warn!(topic = %topic.name, error = %e, "Skipping invalid topic in metadata");
                continue;
            }
            self.topics.entry(topic.name).or_default();
        }

        tracing::info!(
            path = %self.metadata_path.display(),
            topics = self.topics.len(),
            "Metadata loaded"
        );
        Ok(())
    }

    fn persist_metadata(&self) -> Result<(), BrokerError> {
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot = self.snapshot();
        metadata::write(&self.metadata_path, &snapshot)?;

        tracing::debug!(
            path = %self.metadata_path.display(),
            topics = snapshot.topics.len(),
            "Metadata persisted"
        );
        Ok(())
    }

    fn exit(&self) {
        if !self.shutdown.trigger() {
            return;
        }
        tracing::info!("Broker exiting");
        if let Err(e) = self.persist_metadata() {
            tracing::error!(error = %e, "Failed to persist metadata on exit");
        }
    }

    fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }
}
