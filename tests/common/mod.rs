#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use reel_sync::{
    error::RemoteWriteError,
    services::{FavoriteStore, MetadataService, RatingStore},
    session::{Identity, SessionSource},
    AppError, AppResult, FavoriteList, ItemId, MovieRecord, Rating, RatingValue, Session, UserId,
    WriteOp,
};

pub const USER: &str = "user-1";

pub fn user() -> UserId {
    UserId::from(USER)
}

pub fn ids(raw: &[i64]) -> Vec<ItemId> {
    raw.iter().copied().map(ItemId).collect()
}

/// Accepts any token as `USER`
pub struct StaticSource;

#[async_trait::async_trait]
impl SessionSource for StaticSource {
    async fn resolve(&self, _token: &str) -> AppResult<Identity> {
        Ok(Identity { user_id: user() })
    }
}

pub async fn signed_in() -> Session {
    Session::init(Arc::new(StaticSource), Some("tok".to_string()))
        .await
        .unwrap()
}

/// In-memory ratings and favorites with a call log
#[derive(Default)]
pub struct MemoryStore {
    ratings: Mutex<HashMap<(UserId, ItemId), Rating>>,
    favorites: Mutex<HashMap<UserId, Vec<ItemId>>>,
    calls: Mutex<Vec<String>>,
    reorders: Mutex<Vec<Vec<ItemId>>>,
    clock: AtomicI64,
    fail_writes: AtomicBool,
    reorder_gate: Mutex<Option<Arc<Semaphore>>>,
    reorders_started: AtomicUsize,
    upsert_gate: Mutex<Option<Arc<Semaphore>>>,
    upserts_started: AtomicUsize,
}

/// Waits for a permit when the gate is closed; open gates pass straight through
async fn pass(gate: &Mutex<Option<Arc<Semaphore>>>) {
    let gate = gate.lock().unwrap().clone();
    if let Some(gate) = gate {
        gate.acquire().await.unwrap().forget();
    }
}

fn open(gate: &Mutex<Option<Arc<Semaphore>>>, permits: usize) {
    if let Some(gate) = gate.lock().unwrap().as_ref() {
        gate.add_permits(permits);
    }
}

impl MemoryStore {
    pub fn with_favorites(user: &UserId, favorites: &[i64]) -> Self {
        let store = Self::default();
        store
            .favorites
            .lock()
            .unwrap()
            .insert(user.clone(), ids(favorites));
        store
    }

    fn tick(&self) -> DateTime<Utc> {
        let n = self.clock.fetch_add(1, Ordering::SeqCst);
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(n)
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reorders(&self) -> Vec<Vec<ItemId>> {
        self.reorders.lock().unwrap().clone()
    }

    pub fn reorders_started(&self) -> usize {
        self.reorders_started.load(Ordering::SeqCst)
    }

    pub fn stored_favorites(&self, user: &UserId) -> Vec<ItemId> {
        self.favorites
            .lock()
            .unwrap()
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    pub fn stored_rating(&self, user: &UserId, item: ItemId) -> Option<Rating> {
        self.ratings
            .lock()
            .unwrap()
            .get(&(user.clone(), item))
            .cloned()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Blocks reorders until `release_reorders` hands out permits
    pub fn hold_reorders(&self) {
        *self.reorder_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_reorders(&self, permits: usize) {
        open(&self.reorder_gate, permits);
    }

    /// Blocks rating upserts until `release_upserts` hands out permits
    pub fn hold_upserts(&self) {
        *self.upsert_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_upserts(&self, permits: usize) {
        open(&self.upsert_gate, permits);
    }

    pub fn upserts_started(&self) -> usize {
        self.upserts_started.load(Ordering::SeqCst)
    }

    fn check_write(&self, op: WriteOp) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::RemoteWrite(RemoteWriteError {
                op,
                message: "status 500".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RatingStore for MemoryStore {
    async fn get(&self, user: &UserId, item: ItemId) -> AppResult<Option<Rating>> {
        self.log(format!("get_rating {}", item));
        Ok(self.stored_rating(user, item))
    }

    async fn upsert(&self, user: &UserId, item: ItemId, value: RatingValue) -> AppResult<()> {
        self.upserts_started.fetch_add(1, Ordering::SeqCst);
        pass(&self.upsert_gate).await;

        self.log(format!("upsert {} {}", item, value));
        self.check_write(WriteOp::UpsertRating { item, value })?;
        let rating = Rating {
            user_id: user.clone(),
            item_id: item,
            value,
            rated_at: Some(self.tick()),
        };
        self.ratings
            .lock()
            .unwrap()
            .insert((user.clone(), item), rating);
        Ok(())
    }

    async fn delete(&self, user: &UserId, item: ItemId) -> AppResult<()> {
        self.log(format!("delete {}", item));
        self.check_write(WriteOp::DeleteRating { item })?;
        self.ratings.lock().unwrap().remove(&(user.clone(), item));
        Ok(())
    }

    async fn list_all(&self, user: &UserId) -> AppResult<Vec<Rating>> {
        self.log("list_all".to_string());
        Ok(self
            .ratings
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.user_id == user)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl FavoriteStore for MemoryStore {
    async fn get(&self, user: &UserId) -> AppResult<FavoriteList> {
        self.log("get_favorites".to_string());
        Ok(FavoriteList::from_ids(self.stored_favorites(user)))
    }

    async fn contains(&self, user: &UserId, item: ItemId) -> AppResult<bool> {
        Ok(self.stored_favorites(user).contains(&item))
    }

    async fn add(&self, user: &UserId, item: ItemId) -> AppResult<()> {
        self.log(format!("add {}", item));
        self.check_write(WriteOp::AddFavorite { item })?;
        let mut favorites = self.favorites.lock().unwrap();
        let list = favorites.entry(user.clone()).or_default();
        if !list.contains(&item) {
            list.push(item);
        }
        Ok(())
    }

    async fn remove(&self, user: &UserId, item: ItemId) -> AppResult<()> {
        self.log(format!("remove {}", item));
        self.check_write(WriteOp::RemoveFavorite { item })?;
        if let Some(list) = self.favorites.lock().unwrap().get_mut(user) {
            list.retain(|id| *id != item);
        }
        Ok(())
    }

    async fn reorder(&self, user: &UserId, order: &[ItemId]) -> AppResult<()> {
        self.reorders_started.fetch_add(1, Ordering::SeqCst);
        pass(&self.reorder_gate).await;

        self.log("reorder".to_string());
        self.check_write(WriteOp::ReorderFavorites {
            order: order.to_vec(),
        })?;
        self.reorders.lock().unwrap().push(order.to_vec());
        self.favorites
            .lock()
            .unwrap()
            .insert(user.clone(), order.to_vec());
        Ok(())
    }
}

/// Metadata service that records overlap and fails selected ids
#[derive(Default)]
pub struct FakeMetadata {
    failing: HashSet<ItemId>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeMetadata {
    pub fn failing(ids: &[i64]) -> Self {
        Self {
            failing: ids.iter().copied().map(ItemId).collect(),
            ..Default::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MetadataService for FakeMetadata {
    async fn fetch_movie(&self, id: ItemId) -> AppResult<MovieRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.contains(&id) {
            return Err(AppError::ExternalApi(format!("lookup {} failed", id)));
        }
        Ok(MovieRecord {
            id,
            title: format!("Movie {}", id),
            year: Some(2000 + id.0 as i32),
            poster: None,
            genre: None,
            description: None,
            rating: None,
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Yields until `condition` holds
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
