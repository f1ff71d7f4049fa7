use std::collections::HashSet;

use analysis_core::Headline;
use serde::Serialize;

use crate::{AlertError, AlertTarget, InstrumentMatcher, SeenNewsStore, StoreGuard};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsAlert {
    pub headline: Headline,
    pub target: AlertTarget,
}

/// One load-filter-commit cycle over the seen-set.
///
/// The store lock is held from [`DedupPass::load`] until the pass is
/// committed, closed or dropped. Dropping without [`DedupPass::persist`]
/// writes nothing, so headlines admitted by an undelivered pass are alerted
/// again on the next one.
pub struct DedupPass<'a> {
    store: &'a dyn SeenNewsStore,
    seen: HashSet<Headline>,
    added: Vec<Headline>,
    guard: StoreGuard,
}

impl<'a> DedupPass<'a> {
    pub async fn load(store: &'a dyn SeenNewsStore) -> Result<DedupPass<'a>, AlertError> {
        let guard = store.lock().await?;
        let seen = store.load().await?;
        tracing::debug!("Loaded {} seen headlines", seen.len());
        Ok(Self {
            store,
            seen,
            added: Vec::new(),
            guard,
        })
    }

    pub fn is_seen(&self, headline: &str) -> bool {
        self.seen.contains(headline)
    }

    /// Record the headline; true when it was not seen before.
    pub fn admit(&mut self, headline: &str) -> bool {
        if self.seen.contains(headline) {
            return false;
        }
        self.seen.insert(headline.to_string());
        self.added.push(headline.to_string());
        true
    }

    /// Novel headlines that match a watched instrument, in batch order.
    /// Unmatched headlines are neither alerted nor recorded.
    pub fn filter(&mut self, headlines: &[Headline], matcher: &InstrumentMatcher) -> Vec<NewsAlert> {
        let mut alerts = Vec::new();
        for headline in headlines {
            let Some(target) = matcher.match_headline(headline) else {
                continue;
            };
            if self.admit(headline) {
                alerts.push(NewsAlert {
                    headline: headline.clone(),
                    target: target.clone(),
                });
            }
        }
        alerts
    }

    pub fn admitted(&self) -> usize {
        self.added.len()
    }

    /// Headlines admitted by this pass, in admission order.
    pub fn added(&self) -> &[Headline] {
        &self.added
    }

    /// Write this pass's additions without releasing the lock. Repeating it
    /// is harmless, so callers may retry it. Returns how many headlines this
    /// pass added.
    pub async fn persist(&self) -> Result<usize, AlertError> {
        if !self.added.is_empty() {
            self.store.record(&self.seen, &self.added).await?;
            tracing::info!(
                "Committed {} new headlines ({} total seen)",
                self.added.len(),
                self.seen.len()
            );
        }
        Ok(self.added.len())
    }

    /// Release the store lock. Anything not yet persisted is discarded.
    pub async fn close(self) -> Result<(), AlertError> {
        self.guard.release().await
    }

    /// [`DedupPass::persist`] followed by [`DedupPass::close`].
    pub async fn commit(self) -> Result<usize, AlertError> {
        let added = self.persist().await?;
        self.close().await?;
        Ok(added)
    }
}
