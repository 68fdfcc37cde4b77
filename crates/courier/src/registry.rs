//! Topic → handler registry shared between the application and the sweep.
//!
//! The lock is held only around map operations. Handlers are cloned out as
//! `Arc`s before they are called, so no network call or handler body ever
//! runs under the lock.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Callback invoked with `(key, value)` for each message pulled from a topic.
pub type TopicHandler<P> = Arc<dyn Fn(&str, P) + Send + Sync>;

/// Wrap a closure as a [`TopicHandler`].
pub fn handler<P, F>(f: F) -> TopicHandler<P>
where
    F: Fn(&str, P) + Send + Sync + 'static,
{
    Arc::new(f)
}

pub struct TopicRegistry<P> {
    topics: RwLock<HashMap<String, TopicHandler<P>>>,
}

impl<P> TopicRegistry<P> {
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    pub fn from_map(topics: HashMap<String, TopicHandler<P>>) -> Self {
        Self {
            topics: RwLock::new(topics),
        }
    }

    /// Insert or replace the handler for `topic`. Returns true if the topic
    /// was already registered.
    pub fn insert(&self, topic: impl Into<String>, handler: TopicHandler<P>) -> bool {
        self.write().insert(topic.into(), handler).is_some()
    }

    pub fn remove(&self, topic: &str) -> bool {
        self.write().remove(topic).is_some()
    }

    /// Swap the whole map in one step.
    pub fn replace_all(&self, topics: HashMap<String, TopicHandler<P>>) {
        *self.write() = topics;
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.read().contains_key(topic)
    }

    /// Current handler for `topic`, if it is still registered.
    pub fn get(&self, topic: &str) -> Option<TopicHandler<P>> {
        self.read().get(topic).cloned()
    }

    /// Topic names at this instant.
    pub fn snapshot(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panicking handler never runs under the lock, so poisoning can only come
    // from a panic inside a map operation; the map itself is still consistent.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, TopicHandler<P>>> {
        self.topics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, TopicHandler<P>>> {
        self.topics.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Default for TopicRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for TopicRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRegistry")
            .field("topics", &self.snapshot())
            .finish()
    }
}
