//! In-memory metrics store for testing and offline mode

use async_trait::async_trait;
use postsaga_domain::{Action, Clock, MetricEvent, MetricsError, MetricsStore, SystemClock, Window};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;

/// Append-only event log stamped by an injected clock
pub struct InMemoryMetricsStore {
    events: RwLock<Vec<MetricEvent>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// Snapshot of every recorded event, oldest first
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    fn in_window(&self, window: &Window) -> Result<Vec<MetricEvent>, MetricsError> {
        let now = self.clock.now();
        let events = self.events.read().map_err(poisoned)?;
        Ok(events
            .iter()
            .filter(|e| window.contains(e.recorded_at, now))
            .cloned()
            .collect())
    }
}

impl Default for InMemoryMetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> MetricsError {
    MetricsError::Unavailable(e.to_string())
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn record_action(
        &self,
        post_id: &str,
        user_id: &str,
        action: Action,
    ) -> Result<(), MetricsError> {
        let event = MetricEvent {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            action,
            recorded_at: self.clock.now(),
        };
        self.events.write().map_err(poisoned)?.push(event);
        Ok(())
    }

    async fn top_n_by_upvotes(
        &self,
        window: &Window,
        n: usize,
    ) -> Result<Vec<(String, i64)>, MetricsError> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for event in self.in_window(window)? {
            if event.action == Action::Upvote {
                *counts.entry(event.post_id).or_default() += 1;
            }
        }

        let mut ranked: Vec<_> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        Ok(ranked)
    }

    async fn recent_post_ids(&self, window: &Window) -> Result<BTreeSet<String>, MetricsError> {
        Ok(self
            .in_window(window)?
            .into_iter()
            .map(|e| e.post_id)
            .collect())
    }

    async fn most_recent_activity(
        &self,
        post_id: &str,
        window: &Window,
    ) -> Result<Option<OffsetDateTime>, MetricsError> {
        Ok(self
            .in_window(window)?
            .into_iter()
            .filter(|e| e.post_id == post_id)
            .map(|e| e.recorded_at)
            .max())
    }
}
