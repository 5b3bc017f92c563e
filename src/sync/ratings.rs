use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SyncEvent;
use crate::{
    error::AppResult,
    models::{ItemId, RatingValue},
    services::store::RatingStore,
    session::Session,
};

#[derive(Default)]
struct RatingEntry {
    /// What the star widget shows
    current: Option<RatingValue>,
    /// Last value the store acknowledged; outer `None` until known
    confirmed: Option<Option<RatingValue>>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    /// Flushes that left the timer and are waiting on or holding the write gate
    writing: usize,
    write_gate: Arc<tokio::sync::Mutex<()>>,
}

struct Inner {
    store: Arc<dyn RatingStore>,
    session: Session,
    debounce: Duration,
    entries: Mutex<HashMap<ItemId, RatingEntry>>,
    events: mpsc::UnboundedSender<SyncEvent>,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<ItemId, RatingEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn flush(self: Arc<Self>, item: ItemId, generation: u64) {
        let gate = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(&item) else {
                return;
            };
            if entry.generation != generation {
                return;
            }
            // Detach so a later edit cannot abort a write that is already going out.
            entry.timer.take();
            entry.writing += 1;
            Arc::clone(&entry.write_gate)
        };

        let _write = gate.lock().await;

        let value = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(&item) else {
                return;
            };
            if entry.generation != generation {
                // A newer edit has its own timer and will write the latest value.
                entry.writing -= 1;
                return;
            }
            entry.current
        };

        let result = match self.session.credentials().await {
            Ok(credentials) => match value {
                Some(value) => self.store.upsert(&credentials.user_id, item, value).await,
                None => self.store.delete(&credentials.user_id, item).await,
            },
            Err(e) => Err(e),
        };

        let event = {
            let mut entries = self.entries();
            if let Some(entry) = entries.get_mut(&item) {
                entry.writing = entry.writing.saturating_sub(1);
                if result.is_ok() {
                    entry.confirmed = Some(value);
                }
            }

            match result {
                Ok(()) => {
                    tracing::info!(item_id = %item, rating = ?value.map(RatingValue::get), "Rating saved");
                    SyncEvent::RatingSaved { item, value }
                }
                Err(error) => {
                    tracing::error!(item_id = %item, error = %error, "Failed to save rating");
                    SyncEvent::RatingFailed { item, value, error }
                }
            }
        };

        // The receiver may already be gone with its view.
        let _ = self.events.send(event);
    }
}

/// Debounced per-movie rating writes
///
/// Each star change replaces the movie's draft and restarts its timer. Only the value
/// present when the timer fires is written, so a burst of changes costs one write.
/// Writes for the same movie go out one at a time in edit order; different movies
/// never wait on each other. Outcomes are delivered on the event channel returned by
/// `new`. Dropping the synchronizer discards pending timers without writing.
pub struct RatingSync {
    inner: Arc<Inner>,
}

impl RatingSync {
    pub fn new(
        store: Arc<dyn RatingStore>,
        session: Session,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();

        let sync = Self {
            inner: Arc::new(Inner {
                store,
                session,
                debounce,
                entries: Mutex::new(HashMap::new()),
                events,
            }),
        };

        (sync, receiver)
    }

    /// Records a star-widget change; `0` clears the rating
    ///
    /// Fails immediately for out-of-range stars or a signed-out session. Persistence
    /// failures arrive later as `SyncEvent::RatingFailed`.
    pub async fn set_rating(&self, item: ItemId, stars: u8) -> AppResult<()> {
        let value = RatingValue::from_stars(stars)?;
        self.inner.session.credentials().await?;

        let mut entries = self.inner.entries();
        let entry = entries.entry(item).or_default();
        entry.current = value;
        entry.generation += 1;
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }

        if entry.writing == 0 && entry.confirmed == Some(value) {
            tracing::debug!(item_id = %item, "Rating matches stored value; nothing to write");
            return Ok(());
        }

        let generation = entry.generation;
        let inner = Arc::clone(&self.inner);
        entry.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.flush(item, generation).await;
        }));

        Ok(())
    }

    /// Loads the stored rating for `item` and shows it unless an edit is pending
    pub async fn hydrate(&self, item: ItemId) -> AppResult<Option<RatingValue>> {
        let credentials = self.inner.session.credentials().await?;
        let value = self
            .inner
            .store
            .get(&credentials.user_id, item)
            .await?
            .map(|rating| rating.value);

        let mut entries = self.inner.entries();
        let entry = entries.entry(item).or_default();
        if entry.timer.is_none() && entry.writing == 0 {
            entry.confirmed = Some(value);
            entry.current = value;
        }

        Ok(value)
    }

    /// Value the widget should show for `item`
    pub fn current(&self, item: ItemId) -> Option<RatingValue> {
        self.inner.entries().get(&item).and_then(|entry| entry.current)
    }

    /// Whether `item` has a timer running or a write outstanding
    pub fn has_pending(&self, item: ItemId) -> bool {
        self.inner
            .entries()
            .get(&item)
            .map(|entry| entry.timer.is_some() || entry.writing > 0)
            .unwrap_or(false)
    }

    /// Discards every timer that has not fired yet; returns how many were dropped
    ///
    /// Writes already in flight still complete.
    pub fn cancel_pending(&self) -> usize {
        let mut entries = self.inner.entries();
        let mut canceled = 0;
        for entry in entries.values_mut() {
            if let Some(timer) = entry.timer.take() {
                timer.abort();
                canceled += 1;
            }
        }
        if canceled > 0 {
            tracing::debug!(canceled, "Pending rating writes discarded");
        }
        canceled
    }
}

impl Drop for RatingSync {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
