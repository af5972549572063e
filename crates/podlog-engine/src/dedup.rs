use std::time::Instant;

use podlog_core::{ErrorBlock, Severity, UniqueErrorGroup};
use tracing::info;

use crate::similarity::{SequenceRatio, Similarity};

/// Greedy single-pass clustering: each block joins the first existing group
/// whose representative scores at or above the threshold, otherwise it
/// becomes the representative of a new group.
///
/// Membership is decided once, against the representative only, so the
/// grouping is order-dependent and not transitive.
pub struct GreedyClusterer<S> {
    similarity: S,
    threshold: f64,
    groups: Vec<UniqueErrorGroup>,
}

impl<S: Similarity> GreedyClusterer<S> {
    pub fn new(similarity: S, threshold: f64) -> Self {
        Self {
            similarity,
            threshold,
            groups: Vec::new(),
        }
    }

    /// Place one block; returns the index of the group it landed in.
    pub fn insert(&mut self, block: &ErrorBlock) -> usize {
        let hit = self.groups.iter().position(|g| {
            self.similarity.score(&block.normalized_text, &g.normalized_text) >= self.threshold
        });
        match hit {
            Some(idx) => {
                self.groups[idx].attach(block);
                idx
            }
            None => {
                self.groups.push(UniqueErrorGroup::from_block(block));
                self.groups.len() - 1
            }
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in creation order.
    pub fn into_groups(self) -> Vec<UniqueErrorGroup> {
        self.groups
    }
}

/// Deduplicates error blocks from all pods into unique error groups.
pub struct Deduplicator<S = SequenceRatio> {
    similarity: S,
    threshold: f64,
}

impl Deduplicator<SequenceRatio> {
    pub fn new(threshold: f64) -> Self {
        Self {
            similarity: SequenceRatio,
            threshold,
        }
    }

    /// Default: threshold 85.
    pub fn with_defaults() -> Self {
        Self::new(85.0)
    }
}

impl<S: Similarity + Clone> Deduplicator<S> {
    pub fn with_similarity(similarity: S, threshold: f64) -> Self {
        Self {
            similarity,
            threshold,
        }
    }

    /// Cluster `blocks` in arrival order and rank the result: CRITICAL first,
    /// then by descending count, ties keeping creation order.
    pub fn deduplicate(&self, blocks: &[ErrorBlock]) -> Vec<UniqueErrorGroup> {
        if blocks.is_empty() {
            return Vec::new();
        }

        info!(
            blocks = blocks.len(),
            threshold = self.threshold,
            "deduplicating errors"
        );
        let started = Instant::now();
        let mut clusterer = GreedyClusterer::new(self.similarity.clone(), self.threshold);
        let total = blocks.len();

        for (idx, block) in blocks.iter().enumerate() {
            clusterer.insert(block);
            let done = idx + 1;
            if done % 100 == 0 || done == total {
                info!(done, total, unique = clusterer.len(), "dedup progress");
            }
        }

        let mut groups = clusterer.into_groups();
        rank_groups(&mut groups);
        info!(
            blocks = total,
            unique = groups.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "deduplication complete"
        );
        groups
    }
}

/// Stable sort: CRITICAL before ERROR, then most frequent first.
pub fn rank_groups(groups: &mut [UniqueErrorGroup]) {
    groups.sort_by(|a, b| {
        let sev = |g: &UniqueErrorGroup| u8::from(g.severity != Severity::Critical);
        sev(a).cmp(&sev(b)).then(b.count.cmp(&a.count))
    });
}
