use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{FavoritesView, LoadOutcome, SyncState};
use crate::{
    error::{AppError, AppResult, WriteOp},
    models::{favorites::is_permutation, FavoriteList, ItemId, UserId},
    services::{resolver::DetailResolver, store::FavoriteStore},
    session::Session,
};

#[derive(Default)]
struct ListState {
    status: SyncState,
    owner: Option<UserId>,
    /// Draft order shown to the user
    local: Vec<ItemId>,
    /// Last order the store acknowledged; `None` until the first load
    confirmed: Option<Vec<ItemId>>,
    /// Bumped by every local reorder; a queued reorder only sends if it is still the latest
    reorder_seq: u64,
    pending: usize,
}

impl ListState {
    fn begin_write(&mut self) {
        self.pending += 1;
        if !self.status.is_error() {
            self.status = SyncState::Mutating;
        }
    }

    fn settle(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 && !self.status.is_error() {
            self.status = SyncState::Ready;
        }
    }

    fn apply_confirmed(&mut self, op: &WriteOp) {
        let Some(confirmed) = self.confirmed.as_mut() else {
            return;
        };
        match op {
            WriteOp::AddFavorite { item } => {
                if !confirmed.contains(item) {
                    confirmed.push(*item);
                }
            }
            WriteOp::RemoveFavorite { item } => confirmed.retain(|id| id != item),
            WriteOp::ReorderFavorites { order } => *confirmed = order.clone(),
            WriteOp::UpsertRating { .. } | WriteOp::DeleteRating { .. } => {}
        }
    }

    fn ensure_loaded_for(&self, user: &UserId) -> AppResult<()> {
        if self.confirmed.is_none() {
            return Err(AppError::InvalidState("favorites not loaded".to_string()));
        }
        if self.owner.as_ref() != Some(user) {
            return Err(AppError::InvalidState(
                "favorites were loaded for a different account".to_string(),
            ));
        }
        Ok(())
    }

    /// Draft order restricted to what the store holds
    ///
    /// Queued adds are left out and queued removes keep their confirmed slot; each of
    /// those writes applies its own change when it reaches the gate.
    fn reorder_payload(&self) -> Option<Vec<ItemId>> {
        let confirmed = self.confirmed.as_ref()?;
        let mut order: Vec<ItemId> = self
            .local
            .iter()
            .copied()
            .filter(|id| confirmed.contains(id))
            .collect();
        for (index, id) in confirmed.iter().enumerate() {
            if !order.contains(id) {
                order.insert(index.min(order.len()), *id);
            }
        }
        is_permutation(confirmed, &order).then_some(order)
    }

    fn position(&self, item: ItemId) -> Option<usize> {
        self.local.iter().position(|id| *id == item)
    }
}

enum ListWrite {
    Add(ItemId),
    Remove(ItemId),
    Reorder { seq: u64 },
}

/// The signed-in user's ranked favorites, edited optimistically
///
/// Every edit changes the local order first, then goes through a single-flight gate:
/// one remote write per list at a time, in call order. A reorder that is still queued
/// when a newer local order exists is dropped, since the newer one submits the full
/// sequence anyway.
///
/// Failed writes are not reverted or retried. The list moves to `SyncState::Error`,
/// the error is returned, and `reconcile`, `revert` or `load` restore store state.
pub struct FavoriteListSync {
    store: Arc<dyn FavoriteStore>,
    session: Session,
    state: Mutex<ListState>,
    flight: Mutex<()>,
}

impl FavoriteListSync {
    pub fn new(store: Arc<dyn FavoriteStore>, session: Session) -> Self {
        Self {
            store,
            session,
            state: Mutex::new(ListState::default()),
            flight: Mutex::new(()),
        }
    }

    pub async fn status(&self) -> SyncState {
        self.state.lock().await.status.clone()
    }

    /// Current draft, or `None` while nothing has been loaded
    pub async fn snapshot(&self) -> Option<FavoriteList> {
        let state = self.state.lock().await;
        state
            .confirmed
            .as_ref()
            .map(|_| FavoriteList::from_ids(state.local.clone()))
    }

    pub async fn order(&self) -> Vec<ItemId> {
        self.state.lock().await.local.clone()
    }

    /// Fetches the signed-in user's favorites and replaces local state with them
    ///
    /// Also the full reload after a failed write.
    pub async fn load(&self) -> AppResult<FavoriteList> {
        let credentials = self.session.credentials().await?;
        self.state.lock().await.status = SyncState::Loading;

        match self.store.get(&credentials.user_id).await {
            Ok(list) => {
                let mut state = self.state.lock().await;
                state.owner = Some(credentials.user_id.clone());
                Self::replace(&mut state, &list);
                tracing::info!(
                    user_id = %credentials.user_id,
                    count = list.ids().len(),
                    "Favorites loaded"
                );
                Ok(list)
            }
            Err(e) => {
                tracing::error!(user_id = %credentials.user_id, error = %e, "Failed to load favorites");
                self.state.lock().await.status = SyncState::Error {
                    op: None,
                    message: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Adopts `remote` as the authoritative list, discarding the local draft
    pub async fn reconcile(&self, remote: FavoriteList) {
        let mut state = self.state.lock().await;
        Self::replace(&mut state, &remote);
        tracing::info!(count = remote.ids().len(), "Favorites reconciled with store");
    }

    /// Rolls the draft back to the last order the store acknowledged
    pub async fn revert(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let confirmed = state
            .confirmed
            .clone()
            .ok_or_else(|| AppError::InvalidState("favorites not loaded".to_string()))?;
        Self::replace(&mut state, &FavoriteList::from_ids(confirmed));
        Ok(())
    }

    fn replace(state: &mut ListState, list: &FavoriteList) {
        state.local = list.ids().to_vec();
        state.confirmed = Some(list.ids().to_vec());
        // Anything still queued was computed from the discarded draft.
        state.reorder_seq += 1;
        state.status = if state.pending > 0 {
            SyncState::Mutating
        } else {
            SyncState::Ready
        };
    }

    /// Swaps the item at `index` with the one above it
    pub async fn move_up(&self, index: usize) -> AppResult<()> {
        let credentials = self.session.credentials().await?;
        let seq = {
            let mut state = self.state.lock().await;
            state.ensure_loaded_for(&credentials.user_id)?;
            check_index(index, state.local.len())?;
            if index == 0 {
                return Ok(());
            }
            state.local.swap(index - 1, index);
            Self::queue_reorder(&mut state)
        };
        self.persist(&credentials.user_id, ListWrite::Reorder { seq }).await
    }

    /// Swaps the item at `index` with the one below it
    pub async fn move_down(&self, index: usize) -> AppResult<()> {
        let credentials = self.session.credentials().await?;
        let seq = {
            let mut state = self.state.lock().await;
            state.ensure_loaded_for(&credentials.user_id)?;
            check_index(index, state.local.len())?;
            if index + 1 == state.local.len() {
                return Ok(());
            }
            state.local.swap(index, index + 1);
            Self::queue_reorder(&mut state)
        };
        self.persist(&credentials.user_id, ListWrite::Reorder { seq }).await
    }

    /// Replaces the order with `order`, which must be a permutation of the current list
    pub async fn reorder(&self, order: Vec<ItemId>) -> AppResult<()> {
        let credentials = self.session.credentials().await?;
        let seq = {
            let mut state = self.state.lock().await;
            state.ensure_loaded_for(&credentials.user_id)?;
            if !is_permutation(&state.local, &order) {
                return Err(AppError::InvalidInput(
                    "reorder must contain exactly the current favorites".to_string(),
                ));
            }
            if state.local == order {
                return Ok(());
            }
            state.local = order;
            Self::queue_reorder(&mut state)
        };
        self.persist(&credentials.user_id, ListWrite::Reorder { seq }).await
    }

    fn queue_reorder(state: &mut ListState) -> u64 {
        state.reorder_seq += 1;
        state.begin_write();
        state.reorder_seq
    }

    /// Appends `item`; already-present items are left where they are
    pub async fn add(&self, item: ItemId) -> AppResult<()> {
        let credentials = self.session.credentials().await?;
        {
            let mut state = self.state.lock().await;
            state.ensure_loaded_for(&credentials.user_id)?;
            if state.position(item).is_some() {
                return Ok(());
            }
            state.local.push(item);
            state.begin_write();
        }
        self.persist(&credentials.user_id, ListWrite::Add(item)).await
    }

    pub async fn remove(&self, item: ItemId) -> AppResult<()> {
        let credentials = self.session.credentials().await?;
        {
            let mut state = self.state.lock().await;
            state.ensure_loaded_for(&credentials.user_id)?;
            let index = state
                .position(item)
                .ok_or_else(|| AppError::InvalidInput(format!("{} is not a favorite", item)))?;
            state.local.remove(index);
            state.begin_write();
        }
        self.persist(&credentials.user_id, ListWrite::Remove(item)).await
    }

    /// Flips membership of `item` and returns the new membership
    pub async fn toggle(&self, item: ItemId) -> AppResult<bool> {
        let is_favorite = self.state.lock().await.position(item).is_some();
        if is_favorite {
            self.remove(item).await?;
        } else {
            self.add(item).await?;
        }
        Ok(!is_favorite)
    }

    async fn persist(&self, user: &UserId, write: ListWrite) -> AppResult<()> {
        let _flight = self.flight.lock().await;

        let (op, result) = match write {
            ListWrite::Add(item) => (
                WriteOp::AddFavorite { item },
                self.store.add(user, item).await,
            ),
            ListWrite::Remove(item) => (
                WriteOp::RemoveFavorite { item },
                self.store.remove(user, item).await,
            ),
            ListWrite::Reorder { seq } => {
                let order = {
                    let mut state = self.state.lock().await;
                    if state.reorder_seq != seq {
                        tracing::debug!(user_id = %user, "Reorder superseded by a newer order");
                        state.settle();
                        return Ok(());
                    }
                    match state.reorder_payload() {
                        Some(order) if state.confirmed.as_deref() != Some(order.as_slice()) => order,
                        _ => {
                            tracing::debug!(user_id = %user, "Stored order already matches; reorder skipped");
                            state.settle();
                            return Ok(());
                        }
                    }
                };
                let result = self.store.reorder(user, &order).await;
                (WriteOp::ReorderFavorites { order }, result)
            }
        };

        let mut state = self.state.lock().await;
        match result {
            Ok(()) => {
                state.apply_confirmed(&op);
                state.settle();
                tracing::info!(user_id = %user, op = %op, "Favorites write persisted");
                Ok(())
            }
            Err(e) => {
                tracing::error!(user_id = %user, op = %op, error = %e, "Favorites write failed");
                state.status = SyncState::Error {
                    op: Some(op),
                    message: e.to_string(),
                };
                state.settle();
                Err(e)
            }
        }
    }

    /// Resolves the current order into movie records, rank order preserved
    pub async fn load_records(
        &self,
        resolver: &DetailResolver,
        cancel: &CancellationToken,
    ) -> AppResult<LoadOutcome<FavoritesView>> {
        let order = {
            let state = self.state.lock().await;
            if state.confirmed.is_none() {
                return Err(AppError::InvalidState("favorites not loaded".to_string()));
            }
            state.local.clone()
        };

        let batch = resolver.resolve_batch(&order, cancel).await?;
        if batch.canceled {
            return Ok(LoadOutcome::Canceled);
        }

        Ok(LoadOutcome::Loaded(FavoritesView {
            movies: batch.records,
            partial_failure: batch.partial_failure,
        }))
    }
}

fn check_index(index: usize, len: usize) -> AppResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "index {} out of range for {} favorites",
            index, len
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::RemoteWriteError,
        services::store::favorites::MockFavoriteStore,
        session::MockSessionSource,
    };
    use mockall::predicate::{always, eq};

    fn user() -> UserId {
        UserId::from("user-1")
    }

    fn signed_in() -> Session {
        Session::preauthenticated(Arc::new(MockSessionSource::new()), "tok".to_string(), user())
    }

    fn ids(raw: &[i64]) -> Vec<ItemId> {
        raw.iter().copied().map(ItemId).collect()
    }

    fn store_with(initial: &[i64]) -> MockFavoriteStore {
        let initial = ids(initial);
        let mut store = MockFavoriteStore::new();
        store
            .expect_get()
            .with(eq(user()))
            .returning(move |_| Ok(FavoriteList::from_ids(initial.clone())));
        store
    }

    #[tokio::test]
    async fn test_move_up_submits_full_order_once() {
        let mut store = store_with(&[10, 20, 30]);
        store
            .expect_reorder()
            .with(eq(user()), eq(ids(&[20, 10, 30])))
            .times(1)
            .returning(|_, _| Ok(()));

        let sync = FavoriteListSync::new(Arc::new(store), signed_in());
        sync.load().await.unwrap();
        sync.move_up(1).await.unwrap();

        assert_eq!(sync.order().await, ids(&[20, 10, 30]));
        assert_eq!(sync.status().await, SyncState::Ready);
    }

    #[tokio::test]
    async fn test_move_down_swaps_with_next() {
        let mut store = store_with(&[10, 20, 30]);
        store
            .expect_reorder()
            .with(always(), eq(ids(&[10, 30, 20])))
            .times(1)
            .returning(|_, _| Ok(()));

        let sync = FavoriteListSync::new(Arc::new(store), signed_in());
        sync.load().await.unwrap();
        sync.move_down(1).await.unwrap();

        assert_eq!(sync.order().await, ids(&[10, 30, 20]));
    }

    #[tokio::test]
    async fn test_moves_at_the_edges_are_noops() {
        let mut store = store_with(&[10, 20, 30]);
        store.expect_reorder().never();

        let sync = FavoriteListSync::new(Arc::new(store), signed_in());
        sync.load().await.unwrap();
        sync.move_up(0).await.unwrap();
        sync.move_down(2).await.unwrap();

        assert_eq!(sync.order().await, ids(&[10, 20, 30]));
    }

    #[tokio::test]
    async fn test_out_of_range_move_is_rejected() {
        let mut store = store_with(&[10, 20]);
        store.expect_reorder().never();

        let sync = FavoriteListSync::new(Arc::new(store), signed_in());
        sync.load().await.unwrap();

        assert!(matches!(sync.move_up(5).await, Err(AppError::InvalidInput(_))));
        assert!(matches!(sync.move_down(2).await, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_reorder_rejects_non_permutation() {
        let mut store = store_with(&[1, 2, 3]);
        store.expect_reorder().never();

        let sync = FavoriteListSync::new(Arc::new(store), signed_in());
        sync.load().await.unwrap();

        let result = sync.reorder(ids(&[3, 2, 4])).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(sync.order().await, ids(&[1, 2, 3]));
    }

    #[tokio::test]
    async fn test_failed_remove_keeps_draft_and_reports_error() {
        let mut store = store_with(&[10, 20, 30]);
        store.expect_remove().times(1).returning(|_, item| {
            Err(AppError::RemoteWrite(RemoteWriteError {
                op: WriteOp::RemoveFavorite { item },
                message: "status 500".to_string(),
            }))
        });

        let sync = FavoriteListSync::new(Arc::new(store), signed_in());
        sync.load().await.unwrap();

        let err = sync.remove(ItemId(20)).await.unwrap_err();
        assert!(matches!(err, AppError::RemoteWrite(_)));
        assert_eq!(sync.order().await, ids(&[10, 30]));
        assert!(matches!(
            sync.status().await,
            SyncState::Error { op: Some(WriteOp::RemoveFavorite { item: ItemId(20) }), .. }
        ));

        sync.revert().await.unwrap();
        assert_eq!(sync.order().await, ids(&[10, 20, 30]));
        assert_eq!(sync.status().await, SyncState::Ready);
    }

    #[tokio::test]
    async fn test_anonymous_mutation_never_reaches_store() {
        let store = MockFavoriteStore::new();
        let sync = FavoriteListSync::new(
            Arc::new(store),
            Session::anonymous(Arc::new(MockSessionSource::new())),
        );

        assert!(matches!(sync.load().await, Err(AppError::NotAuthenticated(_))));
        assert!(matches!(sync.add(ItemId(1)).await, Err(AppError::NotAuthenticated(_))));
        assert!(matches!(sync.move_up(1).await, Err(AppError::NotAuthenticated(_))));
    }

    #[tokio::test]
    async fn test_mutation_before_load_is_invalid_state() {
        let sync = FavoriteListSync::new(Arc::new(MockFavoriteStore::new()), signed_in());

        assert_eq!(sync.snapshot().await, None);
        assert!(matches!(sync.remove(ItemId(1)).await, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_empty_list_is_distinct_from_not_loaded() {
        let sync = FavoriteListSync::new(Arc::new(store_with(&[])), signed_in());

        assert_eq!(sync.snapshot().await, None);
        assert_eq!(sync.status().await, SyncState::Idle);
        sync.load().await.unwrap();
        assert_eq!(sync.snapshot().await, Some(FavoriteList::Empty));
    }

    #[tokio::test]
    async fn test_toggle_adds_then_removes() {
        let mut store = store_with(&[10]);
        store
            .expect_add()
            .with(eq(user()), eq(ItemId(99)))
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_remove()
            .with(eq(user()), eq(ItemId(99)))
            .times(1)
            .returning(|_, _| Ok(()));

        let sync = FavoriteListSync::new(Arc::new(store), signed_in());
        sync.load().await.unwrap();

        assert!(tokio_test::assert_ok!(sync.toggle(ItemId(99)).await));
        assert_eq!(sync.order().await, ids(&[10, 99]));
        assert!(!tokio_test::assert_ok!(sync.toggle(ItemId(99)).await));
        assert_eq!(sync.order().await, ids(&[10]));
    }

    #[tokio::test]
    async fn test_adding_existing_favorite_is_a_noop() {
        let mut store = store_with(&[10, 20]);
        store.expect_add().never();

        let sync = FavoriteListSync::new(Arc::new(store), signed_in());
        sync.load().await.unwrap();
        sync.add(ItemId(20)).await.unwrap();

        assert_eq!(sync.order().await, ids(&[10, 20]));
    }

    #[tokio::test]
    async fn test_reconcile_replaces_draft() {
        let sync = FavoriteListSync::new(Arc::new(store_with(&[1, 2, 3])), signed_in());
        sync.load().await.unwrap();

        sync.reconcile(FavoriteList::from_ids(ids(&[3, 1]))).await;
        assert_eq!(sync.order().await, ids(&[3, 1]));
        assert_eq!(sync.status().await, SyncState::Ready);
    }

    #[tokio::test]
    async fn test_error_state_survives_later_success() {
        let mut store = store_with(&[10, 20, 30]);
        store.expect_remove().times(1).returning(|_, item| {
            Err(AppError::RemoteWrite(RemoteWriteError {
                op: WriteOp::RemoveFavorite { item },
                message: "status 500".to_string(),
            }))
        });
        store.expect_add().times(1).returning(|_, _| Ok(()));

        let sync = FavoriteListSync::new(Arc::new(store), signed_in());
        sync.load().await.unwrap();

        assert!(sync.remove(ItemId(20)).await.is_err());
        sync.add(ItemId(40)).await.unwrap();
        assert!(matches!(
            sync.status().await,
            SyncState::Error { op: Some(WriteOp::RemoveFavorite { item: ItemId(20) }), .. }
        ));

        sync.reconcile(FavoriteList::from_ids(ids(&[10, 20, 30, 40]))).await;
        assert_eq!(sync.status().await, SyncState::Ready);
    }

    #[test]
    fn test_reorder_payload_only_holds_stored_ids() {
        let state = ListState {
            local: ids(&[3, 1, 99]),
            confirmed: Some(ids(&[1, 2, 3])),
            ..Default::default()
        };

        // 99 is a queued add and 2 a queued remove; neither belongs in the reorder.
        assert_eq!(state.reorder_payload(), Some(ids(&[3, 2, 1])));
    }

    #[test]
    fn test_reorder_payload_requires_load() {
        let state = ListState {
            local: ids(&[1]),
            ..Default::default()
        };
        assert_eq!(state.reorder_payload(), None);
    }
}
