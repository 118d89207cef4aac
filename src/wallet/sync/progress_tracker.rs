//! Progress tracking for the event loop.
//!
//! This module provides the `SyncProgressTracker`, which counts what the event loop has processed
//! (batches, events per kind, empty waits, skipped events) and logs a summary periodically and
//! when the session stops.

use chrono::{DateTime, Utc};
use tracing::info;

use super::events::SyncEvent;

/// Batches between two periodic progress log lines.
const LOG_INTERVAL_BATCHES: usize = 100;

/// Service for tracking event loop progress
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
    /// When the session started
    started_at: DateTime<Utc>,
    /// Highest chain height reported by a pushed block
    highest_tip: u32,
    /// Non-empty event batches processed
    batches_processed: usize,
    /// Waits that returned no events
    empty_waits: usize,
    blocks_pushed: usize,
    blocks_popped: usize,
    transactions_added: usize,
    transactions_removed: usize,
    /// Events that failed without ending the session
    events_skipped: usize,
    /// Batch count at the last progress log line
    last_logged_batch: usize,
}

impl SyncProgressTracker {
    /// Create a new progress tracker starting at the given tip.
    pub fn new(start_tip: u32) -> Self {
        Self {
            started_at: Utc::now(),
            highest_tip: start_tip,
            batches_processed: 0,
            empty_waits: 0,
            blocks_pushed: 0,
            blocks_popped: 0,
            transactions_added: 0,
            transactions_removed: 0,
            events_skipped: 0,
            last_logged_batch: 0,
        }
    }

    /// Record a processed event
    pub fn record_event(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::BlockPushed => self.blocks_pushed += 1,
            SyncEvent::BlockPopped { .. } => self.blocks_popped += 1,
            SyncEvent::TransactionAdded { .. } => self.transactions_added += 1,
            SyncEvent::UnconfirmedRemoved { .. } => self.transactions_removed += 1,
        }
    }

    pub fn record_tip(&mut self, tip: u32) {
        self.highest_tip = self.highest_tip.max(tip);
    }

    pub fn record_skipped(&mut self) {
        self.events_skipped += 1;
    }

    pub fn record_empty_wait(&mut self) {
        self.empty_waits += 1;
    }

    pub fn record_batch(&mut self) {
        self.batches_processed += 1;
    }

    /// Log progress at regular intervals or when forced
    pub fn log_progress(&mut self, force: bool) {
        let batches_since_last_log = self.batches_processed - self.last_logged_batch;
        if force || batches_since_last_log >= LOG_INTERVAL_BATCHES {
            info!("Sync progress: {}", self.get_stats().summary());
            self.last_logged_batch = self.batches_processed;
        }
    }

    /// Get sync statistics as a SyncStats struct
    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            started_at: self.started_at,
            highest_tip: self.highest_tip,
            batches_processed: self.batches_processed,
            empty_waits: self.empty_waits,
            blocks_pushed: self.blocks_pushed,
            blocks_popped: self.blocks_popped,
            transactions_added: self.transactions_added,
            transactions_removed: self.transactions_removed,
            events_skipped: self.events_skipped,
        }
    }
}

/// Statistics about one sync session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub started_at: DateTime<Utc>,
    pub highest_tip: u32,
    pub batches_processed: usize,
    pub empty_waits: usize,
    pub blocks_pushed: usize,
    pub blocks_popped: usize,
    pub transactions_added: usize,
    pub transactions_removed: usize,
    pub events_skipped: usize,
}

impl SyncStats {
    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        let elapsed = Utc::now() - self.started_at;
        format!(
            "{} batches in {}s up to height {}: {} blocks pushed, {} popped, {} transactions added, {} removed, {} empty waits{}",
            self.batches_processed,
            elapsed.num_seconds(),
            self.highest_tip,
            self.blocks_pushed,
            self.blocks_popped,
            self.transactions_added,
            self.transactions_removed,
            self.empty_waits,
            if self.events_skipped == 0 {
                String::new()
            } else {
                format!(" ({} events skipped)", self.events_skipped)
            }
        )
    }
}
