use serde::Serialize;
use std::collections::HashSet;

use super::ItemId;

/// Marker the store uses for a user with no favorites
const EMPTY_SENTINEL: i64 = -1;

/// A user's ranked favorites as last read from the store
///
/// `Empty` is a loaded state in its own right; "not loaded yet" lives in the
/// synchronizer, never here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "items", rename_all = "snake_case")]
pub enum FavoriteList {
    Empty,
    Ranked(Vec<ItemId>),
}

impl FavoriteList {
    /// Builds a list from the store's raw id array (`[]` and `[-1]` both mean empty)
    ///
    /// Later duplicates are dropped so rank stays unique.
    pub fn from_wire(raw: Vec<i64>) -> Self {
        if raw.is_empty() || raw.first() == Some(&EMPTY_SENTINEL) {
            return FavoriteList::Empty;
        }

        let mut seen = HashSet::with_capacity(raw.len());
        let ids: Vec<ItemId> = raw
            .into_iter()
            .filter(|id| *id != EMPTY_SENTINEL && seen.insert(*id))
            .map(ItemId)
            .collect();

        Self::from_ids(ids)
    }

    pub fn from_ids(ids: Vec<ItemId>) -> Self {
        if ids.is_empty() {
            FavoriteList::Empty
        } else {
            FavoriteList::Ranked(ids)
        }
    }

    pub fn ids(&self) -> &[ItemId] {
        match self {
            FavoriteList::Empty => &[],
            FavoriteList::Ranked(ids) => ids,
        }
    }

    pub fn into_ids(self) -> Vec<ItemId> {
        match self {
            FavoriteList::Empty => Vec::new(),
            FavoriteList::Ranked(ids) => ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.ids().contains(&item)
    }
}

/// True when `candidate` holds exactly the ids of `current`, each once, in any order
pub fn is_permutation(current: &[ItemId], candidate: &[ItemId]) -> bool {
    if current.len() != candidate.len() {
        return false;
    }
    let expected: HashSet<ItemId> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(candidate.len());
    candidate
        .iter()
        .all(|id| expected.contains(id) && seen.insert(*id))
}
