//! Conversation registry.
//!
//! The registry maps a [`ConversationKey`] to the one live
//! [`ConversationEntry`] capturing it. Two locks are involved:
//!
//! - the registry-wide `RwLock` over the key map, held only for short,
//!   synchronous lookups, inserts and removals;
//! - the per-entry `tokio::sync::Mutex` around the conversation itself, held
//!   for the whole of an `advance` call.
//!
//! Updates for different keys therefore run in parallel while updates for the
//! same key are serialized. The per-entry mutex queues waiters in FIFO order,
//! so dispatches for one key run in the order they reached the lock.
//!
//! Lock order is always entry, then registry. The registry lock is never held
//! across an `.await`.
//!
//! # Removal
//!
//! When `advance` leaves the conversation closed, the dispatching task
//! re-acquires the registry lock and removes the key only if the stored entry
//! is the same `Arc` it just advanced. A conversation registered for the same
//! key in the meantime is left in place.
//!
//! Removal also runs when `advance` panics, exceeds its time limit, or is
//! cancelled after the conversation closed itself, and when a dispatch finds
//! the conversation already closed. A closed conversation never keeps its key.
//!
//! # Replacement
//!
//! Registering a conversation for a key that is already captured replaces the
//! old entry (last registration wins). The old entry is marked superseded:
//! an `advance` already running on it completes, but dispatches still waiting
//! for its lock are skipped.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, trace, warn};

use courier_core::{BoxedConversation, Conversation, ConversationKey, Update};

use crate::error::{ConversationError, ConversationResult};
use crate::pool::panic_message;

/// One captured conversation and its lock.
pub struct ConversationEntry {
    key: ConversationKey,
    generation: u64,
    name: &'static str,
    superseded: AtomicBool,
    conversation: Mutex<BoxedConversation>,
}

impl ConversationEntry {
    /// The key this entry captures.
    pub fn key(&self) -> ConversationKey {
        self.key
    }

    /// Registry-unique sequence number of this entry.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Name of the conversation type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` once a newer registration replaced this entry.
    pub fn is_superseded(&self) -> bool {
        self.superseded.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ConversationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEntry")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("name", &self.name)
            .field("superseded", &self.is_superseded())
            .finish_non_exhaustive()
    }
}

/// Outcome of [`ConversationRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The key was free.
    Inserted { generation: u64 },
    /// An existing entry for the key was replaced.
    Replaced { generation: u64, previous: u64 },
    /// The conversation was already closed and was dropped.
    Closed,
}

/// Outcome of [`ConversationRegistry::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// `advance` was not called: the conversation was closed or superseded.
    Skipped,
    /// `advance` ran and the conversation is still open.
    Advanced,
    /// `advance` ran and closed the conversation. `removed` is `false` when the
    /// key had already been taken over by a newer registration.
    Closed { removed: bool },
}

#[derive(Default)]
struct Inner {
    entries: RwLock<HashMap<ConversationKey, Arc<ConversationEntry>>>,
    next_generation: AtomicU64,
}

/// Concurrent store of captured conversations.
///
/// Cloning is cheap; all clones share the same map.
#[derive(Clone, Default)]
pub struct ConversationRegistry {
    inner: Arc<Inner>,
}

impl ConversationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a conversation under its own key, replacing any live entry.
    pub fn register<C: Conversation>(&self, conversation: C) -> Registration {
        self.register_boxed(Box::new(conversation))
    }

    /// Registers an already boxed conversation.
    pub fn register_boxed(&self, conversation: BoxedConversation) -> Registration {
        let key = conversation.key();
        if conversation.is_closed() {
            debug!(%key, name = conversation.name(), "Conversation closed before registration, dropping");
            return Registration::Closed;
        }

        let entry = self.new_entry(conversation);
        let generation = entry.generation;
        let name = entry.name;

        let previous = self.inner.entries.write().insert(key, entry);
        match previous {
            Some(old) => {
                old.superseded.store(true, Ordering::Release);
                info!(
                    %key,
                    name,
                    generation,
                    previous = old.generation,
                    "Conversation replaced"
                );
                Registration::Replaced {
                    generation,
                    previous: old.generation,
                }
            }
            None => {
                info!(%key, name, generation, "Conversation started");
                Registration::Inserted { generation }
            }
        }
    }

    /// Registers a conversation only if its key is not already captured.
    pub fn register_if_vacant<C: Conversation>(&self, conversation: C) -> ConversationResult<u64> {
        let key = conversation.key();
        if conversation.is_closed() {
            return Err(ConversationError::Closed(key));
        }

        let entry = self.new_entry(Box::new(conversation));
        let generation = entry.generation;
        let name = entry.name;

        {
            let mut entries = self.inner.entries.write();
            if entries.contains_key(&key) {
                return Err(ConversationError::Occupied(key));
            }
            entries.insert(key, entry);
        }

        info!(%key, name, generation, "Conversation started");
        Ok(generation)
    }

    fn new_entry(&self, conversation: BoxedConversation) -> Arc<ConversationEntry> {
        Arc::new(ConversationEntry {
            key: conversation.key(),
            generation: self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1,
            name: conversation.name(),
            superseded: AtomicBool::new(false),
            conversation: Mutex::new(conversation),
        })
    }

    /// Returns the live entry for `key`, if any.
    pub fn lookup(&self, key: &ConversationKey) -> Option<Arc<ConversationEntry>> {
        self.inner.entries.read().get(key).cloned()
    }

    /// Returns `true` if `key` is currently captured.
    pub fn contains(&self, key: &ConversationKey) -> bool {
        self.inner.entries.read().contains_key(key)
    }

    /// Number of live conversations.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Returns `true` if no conversation is live.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// Feeds `update` to the conversation held by `entry`.
    ///
    /// Waits for the entry lock, then calls `advance` unless the conversation
    /// is already closed or the entry was superseded. If the conversation is
    /// closed afterwards, the entry is removed from the registry while its
    /// lock is still held.
    pub async fn dispatch(&self, entry: &Arc<ConversationEntry>, update: &Update) -> Advance {
        self.dispatch_within(entry, update, None).await
    }

    /// Like [`dispatch`](Self::dispatch), with a time limit on `advance`.
    ///
    /// The limit starts once the entry lock is held, so time spent queued
    /// behind other updates for the same key does not count against it.
    ///
    /// A panic or an expired limit inside `advance` is logged and treated as
    /// a return: the entry is still removed if the conversation closed itself
    /// first. The same holds when this future is dropped while `advance` runs.
    pub async fn dispatch_within(
        &self,
        entry: &Arc<ConversationEntry>,
        update: &Update,
        limit: Option<Duration>,
    ) -> Advance {
        let conversation = entry.conversation.lock().await;
        let mut held = Held {
            registry: self,
            entry,
            conversation,
            settled: false,
        };

        if entry.is_superseded() {
            held.settled = true;
            debug!(key = %entry.key, generation = entry.generation, "Skipping superseded conversation");
            return Advance::Skipped;
        }
        if held.conversation.is_closed() {
            // Closed outside a completed advance; free the key now.
            let removed = held.release();
            debug!(key = %entry.key, generation = entry.generation, removed, "Skipping closed conversation");
            return Advance::Skipped;
        }

        trace!(key = %entry.key, update_id = update.update_id, "Advancing conversation");
        let run = AssertUnwindSafe(held.conversation.advance(update)).catch_unwind();
        let outcome = match limit {
            Some(limit) => tokio::time::timeout(limit, run).await.ok(),
            None => Some(run.await),
        };
        match outcome {
            Some(Ok(())) => {}
            Some(Err(panic)) => error!(
                key = %entry.key,
                update_id = update.update_id,
                panic = %panic_message(panic.as_ref()),
                "Conversation panicked"
            ),
            None => warn!(
                key = %entry.key,
                update_id = update.update_id,
                timeout_ms = limit.map_or(0, |t| t.as_millis() as u64),
                "Conversation timed out"
            ),
        }

        if !held.conversation.is_closed() {
            held.settled = true;
            return Advance::Advanced;
        }

        let removed = held.release();
        if removed {
            info!(key = %entry.key, name = entry.name, generation = entry.generation, "Conversation closed");
        } else {
            debug!(
                key = %entry.key,
                generation = entry.generation,
                "Conversation closed after being replaced, leaving newer entry"
            );
        }
        Advance::Closed { removed }
    }

    /// Removes `entry` if it is still the one stored under its key.
    fn remove_entry(&self, entry: &Arc<ConversationEntry>) -> bool {
        let mut entries = self.inner.entries.write();
        match entries.get(&entry.key) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                entries.remove(&entry.key);
                true
            }
            _ => false,
        }
    }
}

/// An entry lock held by a running dispatch.
///
/// Dropped without being settled (the dispatch future was cancelled), it
/// still removes the entry if the conversation had already closed.
struct Held<'a> {
    registry: &'a ConversationRegistry,
    entry: &'a Arc<ConversationEntry>,
    conversation: MutexGuard<'a, BoxedConversation>,
    settled: bool,
}

impl Held<'_> {
    fn release(&mut self) -> bool {
        self.settled = true;
        self.registry.remove_entry(self.entry)
    }
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        if self.settled || std::thread::panicking() || !self.conversation.is_closed() {
            return;
        }
        let removed = self.registry.remove_entry(self.entry);
        debug!(
            key = %self.entry.key,
            generation = self.entry.generation,
            removed,
            "Dispatch cancelled after conversation closed"
        );
    }
}

impl std::fmt::Debug for ConversationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationRegistry")
            .field("len", &self.len())
            .finish()
    }
}
