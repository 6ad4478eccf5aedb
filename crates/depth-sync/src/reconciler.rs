//! Snapshot + diff-stream reconciliation.
//!
//! Implements the Binance local order book protocol for one symbol:
//! 1. Buffer diff events while the REST snapshot is in flight
//! 2. Seed the book from the snapshot (`lastUpdateId`)
//! 3. Replay buffered events in arrival order, dropping those with
//!    `final_update_id <= lastUpdateId`
//! 4. Every applied event must satisfy
//!    `first_update_id <= watermark + 1 <= final_update_id`
//! 5. Anything else is a gap: the reconciler closes and a fresh
//!    subscription is required
//!
//! The reconciler performs no I/O. It is driven one delivery at a time by
//! its owner, which keeps every mutation serialized.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use model::{DepthSnapshot, DepthUpdate};
use orderbook::{BookView, OrderBookError, OrderBookState};
use tracing::{debug, error, info, trace, warn};

use crate::error::SyncError;
use crate::publish::{ViewCallback, ViewPublisher};

/// Lifecycle of a reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Buffering diff events, no snapshot applied yet.
    AwaitingSnapshot,
    /// Snapshot applied; diffs are applied as they arrive.
    Synced,
    /// Terminal. Deliveries are ignored.
    Closed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AwaitingSnapshot => "awaiting_snapshot",
            Self::Synced => "synced",
            Self::Closed => "closed",
        })
    }
}

/// What happened to a single diff event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Held until the snapshot arrives.
    Buffered,
    /// Applied to the book; a new view was published.
    Applied,
    /// Already reflected in the book; dropped.
    Stale,
    /// Reconciler is closed; delivery dropped.
    Ignored,
}

/// What happened to a snapshot delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Book seeded and buffer drained.
    Synced {
        /// Buffered events applied after seeding.
        replayed: usize,
        /// Buffered events discarded as stale.
        discarded: usize,
        /// Non-positive snapshot levels that were dropped.
        dropped_levels: usize,
    },
    /// A snapshot was already applied or the reconciler is closed.
    Ignored,
}

/// Fuses one snapshot with a diff stream into a gap-free local book.
///
/// `buffer`, `state` and `mode` are private and only reachable through
/// this type's methods.
pub struct BookReconciler {
    symbol: String,
    mode: SyncState,
    buffer: VecDeque<DepthUpdate>,
    max_buffered: usize,
    state: OrderBookState,
    publisher: ViewPublisher,
}

impl BookReconciler {
    /// Create a reconciler awaiting its snapshot.
    pub fn new(symbol: impl Into<String>, max_buffered: usize) -> Self {
        let symbol = symbol.into();
        Self {
            publisher: ViewPublisher::new(&symbol),
            state: OrderBookState::new(symbol.clone()),
            symbol,
            mode: SyncState::AwaitingSnapshot,
            buffer: VecDeque::new(),
            max_buffered: max_buffered.max(1),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn mode(&self) -> SyncState {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.mode == SyncState::Closed
    }

    /// Highest applied update id; 0 until the snapshot lands.
    pub fn last_sequence(&self) -> u64 {
        self.state.last_sequence()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Read access to the underlying state.
    pub fn state(&self) -> &OrderBookState {
        &self.state
    }

    /// Handle for reading published views from other tasks.
    pub fn publisher(&self) -> ViewPublisher {
        self.publisher.clone()
    }

    /// Register a callback invoked synchronously after each successful apply.
    pub fn on_update<F>(&self, callback: F)
    where
        F: Fn(&BookView) + Send + Sync + 'static,
    {
        self.publisher.subscribe(Arc::new(callback) as ViewCallback);
    }

    /// Materialize a view of the current state.
    pub fn view(&self) -> BookView {
        BookView::materialize(&self.state)
    }

    /// Handle one diff event in arrival order.
    pub fn on_event(&mut self, event: DepthUpdate) -> Result<EventOutcome, SyncError> {
        if self.mode == SyncState::Closed {
            trace!(symbol = %self.symbol, final_update_id = event.final_update_id, "ignoring event after close");
            return Ok(EventOutcome::Ignored);
        }

        if !event.is_well_formed() {
            return Err(self.fail(SyncError::Decode(format!(
                "inverted update range [{}, {}]",
                event.first_update_id, event.final_update_id
            ))));
        }

        match self.mode {
            SyncState::AwaitingSnapshot => {
                if self.buffer.len() >= self.max_buffered {
                    return Err(self.fail(SyncError::BufferOverflow {
                        capacity: self.max_buffered,
                    }));
                }
                self.buffer.push_back(event);
                Ok(EventOutcome::Buffered)
            }
            SyncState::Synced => {
                if self.apply_in_sequence(&event)? {
                    self.publish();
                    Ok(EventOutcome::Applied)
                } else {
                    Ok(EventOutcome::Stale)
                }
            }
            SyncState::Closed => Ok(EventOutcome::Ignored),
        }
    }

    /// Seed the book from a snapshot and replay the buffer.
    ///
    /// Only the first snapshot is honoured; later ones (or any delivered
    /// after close) are ignored.
    pub fn on_snapshot(&mut self, snapshot: DepthSnapshot) -> Result<SnapshotOutcome, SyncError> {
        if self.mode != SyncState::AwaitingSnapshot {
            debug!(
                symbol = %self.symbol,
                mode = %self.mode,
                snapshot_id = snapshot.last_update_id,
                "ignoring late snapshot"
            );
            return Ok(SnapshotOutcome::Ignored);
        }

        if !snapshot.symbol.eq_ignore_ascii_case(&self.symbol) {
            return Err(self.fail(SyncError::Decode(format!(
                "snapshot for {} delivered to {} subscription",
                snapshot.symbol, self.symbol
            ))));
        }

        let dropped_levels =
            self.state
                .seed(&snapshot.bids, &snapshot.asks, snapshot.last_update_id);
        self.set_mode(SyncState::Synced);

        let mut replayed = 0;
        let mut discarded = 0;
        let buffered = std::mem::take(&mut self.buffer);
        for event in &buffered {
            if self.apply_in_sequence(event)? {
                replayed += 1;
            } else {
                discarded += 1;
            }
        }

        info!(
            symbol = %self.symbol,
            snapshot_id = snapshot.last_update_id,
            replayed,
            discarded,
            last_sequence = self.state.last_sequence(),
            "depth book synchronized"
        );

        self.publish();
        Ok(SnapshotOutcome::Synced {
            replayed,
            discarded,
            dropped_levels,
        })
    }

    /// Retire the reconciler. Idempotent.
    pub fn close(&mut self) {
        if self.mode != SyncState::Closed {
            debug!(symbol = %self.symbol, "reconciler closed");
            self.buffer.clear();
            self.set_mode(SyncState::Closed);
        }
    }

    /// Applies `event` if it continues the watermark.
    ///
    /// Returns `Ok(false)` for stale events; a gap closes the reconciler.
    fn apply_in_sequence(&mut self, event: &DepthUpdate) -> Result<bool, SyncError> {
        let last = self.state.last_sequence();

        if event.final_update_id <= last {
            debug!(
                symbol = %self.symbol,
                first = event.first_update_id,
                last = event.final_update_id,
                watermark = last,
                "dropping stale depth event"
            );
            return Ok(false);
        }

        let expected = last + 1;
        if event.first_update_id > expected {
            return Err(self.fail(SyncError::SequenceGap {
                expected,
                first: event.first_update_id,
                last: event.final_update_id,
            }));
        }

        // first <= expected <= final holds here
        if let Err(err) = self
            .state
            .apply_changes(&event.bids, &event.asks, event.final_update_id)
        {
            return Err(self.fail(apply_error(err, expected, event)));
        }

        Ok(true)
    }

    fn publish(&self) {
        self.publisher.publish(BookView::materialize(&self.state));
    }

    fn set_mode(&mut self, mode: SyncState) {
        self.mode = mode;
        self.publisher.set_status(mode);
    }

    /// Close on a terminal condition and hand the error back.
    pub(crate) fn fail(&mut self, err: SyncError) -> SyncError {
        match &err {
            SyncError::Decode(_) => error!(
                symbol = %self.symbol,
                error = %err,
                "undecodable depth data, closing reconciler"
            ),
            _ => warn!(
                symbol = %self.symbol,
                kind = err.kind(),
                error = %err,
                watermark = self.state.last_sequence(),
                "depth reconciler failed"
            ),
        }
        self.buffer.clear();
        self.set_mode(SyncState::Closed);
        err
    }
}

/// Classify a rejected apply. A bad quantity is a payload problem; a book
/// that refuses the watermark needs a fresh snapshot, same as a gap.
fn apply_error(err: OrderBookError, expected: u64, event: &DepthUpdate) -> SyncError {
    match err {
        OrderBookError::InvalidQuantity { .. } => SyncError::Decode(err.to_string()),
        OrderBookError::NotInitialized | OrderBookError::SequenceRegression { .. } => {
            SyncError::SequenceGap {
                expected,
                first: event.first_update_id,
                last: event.final_update_id,
            }
        }
    }
}

impl fmt::Debug for BookReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookReconciler")
            .field("symbol", &self.symbol)
            .field("mode", &self.mode)
            .field("buffered", &self.buffer.len())
            .field("last_sequence", &self.state.last_sequence())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{Exchange, PriceLevelUpdate};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(
        first: u64,
        last: u64,
        bids: Vec<PriceLevelUpdate>,
        asks: Vec<PriceLevelUpdate>,
    ) -> DepthUpdate {
        DepthUpdate {
            exchange: Exchange::Binance,
            symbol: "BTCUSDT".to_string(),
            first_update_id: first,
            final_update_id: last,
            bids,
            asks,
            timestamp_ms: 0,
        }
    }

    fn range(first: u64, last: u64) -> DepthUpdate {
        event(first, last, vec![(dec!(100), Decimal::from(last))], vec![])
    }

    fn snapshot(
        last_update_id: u64,
        bids: Vec<PriceLevelUpdate>,
        asks: Vec<PriceLevelUpdate>,
    ) -> DepthSnapshot {
        DepthSnapshot {
            exchange: Exchange::Binance,
            symbol: "BTCUSDT".to_string(),
            last_update_id,
            bids,
            asks,
        }
    }

    fn synced_at(last_update_id: u64) -> BookReconciler {
        let mut reconciler = BookReconciler::new("BTCUSDT", 100);
        reconciler
            .on_snapshot(snapshot(
                last_update_id,
                vec![(dec!(50000), dec!(1))],
                vec![(dec!(50001), dec!(1))],
            ))
            .unwrap();
        reconciler
    }

    #[test]
    fn test_events_buffered_before_snapshot() {
        let mut reconciler = BookReconciler::new("BTCUSDT", 100);

        assert_eq!(
            reconciler.on_event(range(100, 105)).unwrap(),
            EventOutcome::Buffered
        );
        assert_eq!(
            reconciler.on_event(range(106, 110)).unwrap(),
            EventOutcome::Buffered
        );

        assert_eq!(reconciler.mode(), SyncState::AwaitingSnapshot);
        assert_eq!(reconciler.buffered_len(), 2);
        assert_eq!(reconciler.last_sequence(), 0);
        assert!(!reconciler.state().is_initialized());
    }

    #[test]
    fn test_snapshot_bracketing_replay() {
        let mut reconciler = BookReconciler::new("BTCUSDT", 100);
        reconciler
            .on_event(event(95, 99, vec![(dec!(10), dec!(7))], vec![]))
            .unwrap();
        reconciler
            .on_event(event(98, 103, vec![(dec!(11), dec!(1))], vec![]))
            .unwrap();
        reconciler
            .on_event(event(104, 110, vec![], vec![(dec!(12), dec!(2))]))
            .unwrap();

        let outcome = reconciler.on_snapshot(snapshot(100, vec![], vec![])).unwrap();

        assert_eq!(
            outcome,
            SnapshotOutcome::Synced {
                replayed: 2,
                discarded: 1,
                dropped_levels: 0
            }
        );
        assert_eq!(reconciler.last_sequence(), 110);
        assert_eq!(reconciler.state().bid_quantity(dec!(10)), None);
        assert_eq!(reconciler.state().bid_quantity(dec!(11)), Some(dec!(1)));
        assert_eq!(reconciler.state().ask_quantity(dec!(12)), Some(dec!(2)));
        assert_eq!(reconciler.buffered_len(), 0);
    }

    #[test]
    fn test_end_to_end_seed_and_replay() {
        let mut reconciler = BookReconciler::new("BTCUSDT", 100);
        reconciler
            .on_event(event(
                11,
                12,
                vec![(dec!(100), dec!(0))],
                vec![(dec!(102), dec!(2))],
            ))
            .unwrap();

        reconciler
            .on_snapshot(snapshot(
                10,
                vec![(dec!(100), dec!(1))],
                vec![(dec!(101), dec!(1))],
            ))
            .unwrap();

        let view = reconciler.view();
        assert!(view.bids.is_empty());
        let asks: Vec<_> = view.asks.iter().map(|l| (l.price, l.quantity)).collect();
        assert_eq!(asks, vec![(dec!(101), dec!(1)), (dec!(102), dec!(2))]);
        assert_eq!(view.last_sequence, 12);
        assert_eq!(reconciler.publisher().current_view().as_ref(), &view);
    }

    #[test]
    fn test_first_buffered_event_past_snapshot_is_gap() {
        let mut reconciler = BookReconciler::new("BTCUSDT", 100);
        reconciler.on_event(range(105, 110)).unwrap();

        let result = reconciler.on_snapshot(snapshot(100, vec![], vec![]));

        assert_eq!(
            result,
            Err(SyncError::SequenceGap {
                expected: 101,
                first: 105,
                last: 110
            })
        );
        assert!(reconciler.is_closed());
    }

    #[test]
    fn test_first_live_event_must_bracket_snapshot() {
        let mut reconciler = synced_at(100);

        let result = reconciler.on_event(range(102, 104));

        assert!(matches!(result, Err(SyncError::SequenceGap { expected: 101, .. })));
        assert_eq!(reconciler.mode(), SyncState::Closed);
        assert_eq!(reconciler.last_sequence(), 100);
    }

    #[test]
    fn test_gap_closes_without_applying() {
        let mut reconciler = synced_at(0);
        assert_eq!(
            reconciler.on_event(range(1, 5)).unwrap(),
            EventOutcome::Applied
        );

        let result = reconciler.on_event(range(7, 9));

        assert_eq!(
            result,
            Err(SyncError::SequenceGap {
                expected: 6,
                first: 7,
                last: 9
            })
        );
        assert!(reconciler.is_closed());
        assert_eq!(reconciler.last_sequence(), 5);
        assert_eq!(reconciler.state().bid_quantity(dec!(100)), Some(dec!(5)));
    }

    #[test]
    fn test_duplicate_event_is_stale_noop() {
        let mut reconciler = synced_at(100);
        let update = event(101, 103, vec![(dec!(50000), dec!(4))], vec![]);

        assert_eq!(
            reconciler.on_event(update.clone()).unwrap(),
            EventOutcome::Applied
        );
        let before = reconciler.view();

        assert_eq!(reconciler.on_event(update).unwrap(), EventOutcome::Stale);
        assert_eq!(reconciler.view(), before);
        assert_eq!(reconciler.last_sequence(), 103);
    }

    #[test]
    fn test_overlapping_event_applies() {
        let mut reconciler = synced_at(100);
        reconciler.on_event(range(101, 105)).unwrap();

        assert_eq!(
            reconciler.on_event(range(103, 108)).unwrap(),
            EventOutcome::Applied
        );
        assert_eq!(reconciler.last_sequence(), 108);
    }

    #[test]
    fn test_zero_quantity_removes_bid() {
        let mut reconciler = synced_at(100);

        reconciler
            .on_event(event(101, 101, vec![(dec!(50000), dec!(0))], vec![]))
            .unwrap();

        assert_eq!(reconciler.state().bid_quantity(dec!(50000)), None);
        assert_eq!(reconciler.state().bid_levels(), 0);
    }

    #[test]
    fn test_buffer_overflow_closes() {
        let mut reconciler = BookReconciler::new("BTCUSDT", 2);
        reconciler.on_event(range(1, 1)).unwrap();
        reconciler.on_event(range(2, 2)).unwrap();

        let result = reconciler.on_event(range(3, 3));

        assert_eq!(result, Err(SyncError::BufferOverflow { capacity: 2 }));
        assert!(reconciler.is_closed());
        assert_eq!(reconciler.buffered_len(), 0);
    }

    #[test]
    fn test_closed_ignores_late_deliveries() {
        let mut reconciler = BookReconciler::new("BTCUSDT", 10);
        reconciler.on_event(range(1, 3)).unwrap();
        reconciler.close();
        reconciler.close();

        assert_eq!(
            reconciler.on_snapshot(snapshot(0, vec![(dec!(1), dec!(1))], vec![])),
            Ok(SnapshotOutcome::Ignored)
        );
        assert_eq!(
            reconciler.on_event(range(4, 5)).unwrap(),
            EventOutcome::Ignored
        );
        assert!(!reconciler.state().is_initialized());
        assert_eq!(reconciler.publisher().status(), SyncState::Closed);
    }

    #[test]
    fn test_second_snapshot_ignored() {
        let mut reconciler = synced_at(100);
        reconciler.on_event(range(101, 102)).unwrap();

        let outcome = reconciler
            .on_snapshot(snapshot(500, vec![], vec![]))
            .unwrap();

        assert_eq!(outcome, SnapshotOutcome::Ignored);
        assert_eq!(reconciler.last_sequence(), 102);
    }

    #[test]
    fn test_snapshot_for_other_symbol_rejected() {
        let mut reconciler = BookReconciler::new("BTCUSDT", 10);
        let mut other = snapshot(1, vec![], vec![]);
        other.symbol = "ETHUSDT".to_string();

        assert!(matches!(
            reconciler.on_snapshot(other),
            Err(SyncError::Decode(_))
        ));
        assert!(reconciler.is_closed());
    }

    #[test]
    fn test_inverted_range_is_decode_error() {
        let mut reconciler = synced_at(100);
        let result = reconciler.on_event(range(110, 105));
        assert!(matches!(result, Err(SyncError::Decode(_))));
        assert!(reconciler.is_closed());
    }

    #[test]
    fn test_negative_quantity_is_decode_error() {
        let mut reconciler = synced_at(100);
        let result = reconciler.on_event(event(101, 101, vec![(dec!(5), dec!(-1))], vec![]));
        assert!(matches!(result, Err(SyncError::Decode(_))));
        assert_eq!(reconciler.last_sequence(), 100);
    }

    #[test]
    fn test_apply_errors_classified_by_cause() {
        let update = range(101, 103);

        let bad_quantity = OrderBookError::InvalidQuantity {
            price: dec!(5),
            quantity: dec!(-1),
        };
        assert!(matches!(
            apply_error(bad_quantity, 101, &update),
            SyncError::Decode(_)
        ));

        let regression = OrderBookError::SequenceRegression {
            current: 200,
            update: 103,
        };
        let gap = SyncError::SequenceGap {
            expected: 101,
            first: 101,
            last: 103,
        };
        assert_eq!(apply_error(regression, 101, &update), gap);
        assert_eq!(apply_error(OrderBookError::NotInitialized, 101, &update), gap);
    }

    #[test]
    fn test_callbacks_fire_once_per_apply() {
        let mut reconciler = BookReconciler::new("BTCUSDT", 10);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        reconciler.on_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        reconciler.on_event(range(1, 2)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        reconciler.on_snapshot(snapshot(1, vec![], vec![])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        reconciler.on_event(range(3, 4)).unwrap();
        reconciler.on_event(range(3, 4)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    proptest! {
        #[test]
        fn prop_watermark_monotonic_and_levels_positive(
            ranges in prop::collection::vec((0u64..6, 0u64..4), 1..60),
            snapshot_id in 0u64..20,
        ) {
            let mut reconciler = BookReconciler::new("BTCUSDT", 1_000);
            let mut cursor = 0u64;
            let mut events = Vec::new();
            for (back, len) in ranges {
                let first = (cursor + 1).saturating_sub(back).max(1);
                let last = first + len;
                cursor = cursor.max(last);
                events.push(range(first, last));
            }

            for e in events.iter().take(5).cloned() {
                let _ = reconciler.on_event(e);
            }
            let _ = reconciler.on_snapshot(snapshot(snapshot_id, vec![], vec![]));

            let mut previous = reconciler.last_sequence();
            for e in events.into_iter().skip(5) {
                let _ = reconciler.on_event(e);
                prop_assert!(reconciler.last_sequence() >= previous);
                previous = reconciler.last_sequence();
            }

            let view = reconciler.view();
            prop_assert!(view.bids.iter().chain(view.asks.iter()).all(|l| l.quantity > Decimal::ZERO));
        }
    }
}
