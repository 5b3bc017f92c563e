use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{AppError, AppResult, PartialResolutionFailure},
    models::{ItemId, MovieRecord},
    services::metadata::MetadataService,
};

/// Lookups allowed in flight at once unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Per-id lookup results, in first-occurrence order of the requested ids
#[derive(Debug)]
pub struct Resolution {
    pub outcomes: Vec<(ItemId, AppResult<MovieRecord>)>,
    /// Set when the token fired before every chunk had run
    pub canceled: bool,
}

impl Resolution {
    /// Failed ids, not counting lookups cut short by cancellation
    pub fn failures(&self) -> Vec<ItemId> {
        self.outcomes
            .iter()
            .filter_map(|(id, outcome)| match outcome {
                Err(e) if !e.is_canceled() => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_ok()).count()
    }

    /// Collapses the outcomes into the successful records
    ///
    /// Fails with `TotalResolutionFailure` only when nothing resolved and at least one
    /// lookup genuinely failed; canceled lookups never count as failures.
    pub fn into_batch(self) -> AppResult<ResolvedBatch> {
        let failed = self.failures();
        let succeeded = self.success_count();

        if succeeded == 0 && !failed.is_empty() {
            tracing::error!(error_count = failed.len(), "Every movie lookup in the batch failed");
            return Err(AppError::TotalResolutionFailure {
                failed: failed.len(),
            });
        }

        let partial_failure = if failed.is_empty() {
            None
        } else {
            tracing::warn!(
                success_count = succeeded,
                error_count = failed.len(),
                "Partial movie resolution failure"
            );
            Some(PartialResolutionFailure { failed, succeeded })
        };

        let records = self
            .outcomes
            .into_iter()
            .filter_map(|(_, outcome)| outcome.ok())
            .collect();

        Ok(ResolvedBatch {
            records,
            partial_failure,
            canceled: self.canceled,
        })
    }
}

/// Successful records in request order plus any aggregate warning
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBatch {
    pub records: Vec<MovieRecord>,
    pub partial_failure: Option<PartialResolutionFailure>,
    pub canceled: bool,
}

/// Expands movie ids into full records through the metadata service
///
/// Ids are looked up in chunks of `concurrency`. Chunk N+1 starts only after every
/// lookup in chunk N has settled, so in-flight lookups never exceed the limit.
pub struct DetailResolver {
    metadata: Arc<dyn MetadataService>,
    concurrency: usize,
}

impl DetailResolver {
    pub fn new(metadata: Arc<dyn MetadataService>, concurrency: usize) -> Self {
        Self {
            metadata,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Resolves `ids`, one outcome per distinct id
    ///
    /// The token is checked before each chunk. Once it fires no further chunk starts,
    /// in-flight lookups settle as `Canceled`, and results of earlier chunks are kept.
    pub async fn resolve(&self, ids: &[ItemId], cancel: &CancellationToken) -> Resolution {
        let unique = dedupe(ids);
        if unique.len() < ids.len() {
            tracing::debug!(
                requested = ids.len(),
                unique = unique.len(),
                "Dropped duplicate ids from resolution batch"
            );
        }

        let mut outcomes = Vec::with_capacity(unique.len());
        let mut canceled = false;

        for (index, chunk) in unique.chunks(self.concurrency).enumerate() {
            if cancel.is_cancelled() {
                canceled = true;
                tracing::debug!(chunk = index, resolved = outcomes.len(), "Resolution canceled");
                break;
            }

            let lookups = chunk.iter().map(|&id| async move {
                // A lookup that already finished wins over a cancellation that raced it.
                let outcome = tokio::select! {
                    biased;
                    result = self.metadata.fetch_movie(id) => result,
                    _ = cancel.cancelled() => Err(AppError::Canceled),
                };
                if let Err(e) = &outcome {
                    if !e.is_canceled() {
                        tracing::error!(item_id = %id, provider = self.metadata.name(), error = %e, "Movie lookup failed");
                    }
                }
                (id, outcome)
            });

            outcomes.extend(join_all(lookups).await);
            tracing::debug!(chunk = index, size = chunk.len(), "Resolution chunk settled");
        }

        if cancel.is_cancelled() {
            canceled = true;
        }

        Resolution { outcomes, canceled }
    }

    /// `resolve` followed by `Resolution::into_batch`
    pub async fn resolve_batch(
        &self,
        ids: &[ItemId],
        cancel: &CancellationToken,
    ) -> AppResult<ResolvedBatch> {
        let batch = self.resolve(ids, cancel).await.into_batch()?;
        tracing::info!(
            requested = ids.len(),
            resolved = batch.records.len(),
            canceled = batch.canceled,
            "Movie details resolved"
        );
        Ok(batch)
    }
}

/// Keeps the first occurrence of each id
fn dedupe(ids: &[ItemId]) -> Vec<ItemId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
