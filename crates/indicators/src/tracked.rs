use crate::Streaming;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Timestamp-aware state of a streaming indicator.
///
/// Samples strictly older than the computed timestamp are final and committed once;
/// the sample at the computed timestamp may belong to a candle that is still open,
/// so it is evaluated on a clone of the committed state and replaced on the next
/// call. Calling [`compute`](Tracked::compute) twice for the same timestamp
/// therefore never counts a sample twice.
#[derive(Debug, Clone)]
pub struct Tracked<S: Streaming> {
    initial: S,
    committed: S,
    committed_at: Option<i64>,
    /// One entry per candle, oldest first. The last entry is provisional when
    /// `provisional` is set.
    values: VecDeque<Option<S::Output>>,
    provisional: bool,
    capacity: usize,
    last_timestamp: Option<i64>,
}

impl<S: Streaming> Tracked<S> {
    /// `capacity` bounds the per-candle history (at least 2 to keep `prev`).
    pub fn new(indicator: S, capacity: usize) -> Self {
        Self {
            initial: indicator.clone(),
            committed: indicator,
            committed_at: None,
            values: VecDeque::with_capacity(capacity.max(2) + 1),
            provisional: false,
            capacity: capacity.max(2),
            last_timestamp: None,
        }
    }

    /// Feed the timestamped samples of the current window, up to `timestamp`.
    ///
    /// Samples already committed by a previous call are skipped, so the same
    /// overlapping window can be passed on every tick.
    pub fn compute<I>(&mut self, timestamp: i64, samples: I)
    where
        I: IntoIterator<Item = (i64, S::Input)>,
    {
        if self.provisional {
            self.values.pop_back();
            self.provisional = false;
        }

        let mut open_sample = None;
        for (ts, input) in samples {
            if ts > timestamp {
                break;
            }
            if self.committed_at.is_some_and(|at| ts <= at) {
                continue;
            }
            if ts < timestamp {
                let output = self.committed.step(input);
                self.committed_at = Some(ts);
                self.push(output);
            } else {
                open_sample = Some(input);
            }
        }

        if let Some(input) = open_sample {
            let output = self.committed.clone().step(input);
            self.push(output);
            self.provisional = true;
        }

        self.last_timestamp = Some(timestamp);
    }

    fn push(&mut self, output: Option<S::Output>) {
        self.values.push_back(output);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// Value at the most recent candle.
    pub fn last(&self) -> Option<S::Output> {
        self.back(0)
    }

    /// Value at the candle before the most recent one.
    pub fn prev(&self) -> Option<S::Output> {
        self.back(1)
    }

    /// Value `n` candles back from the most recent (0 is the most recent).
    pub fn back(&self, n: usize) -> Option<S::Output> {
        let len = self.values.len();
        if n >= len {
            return None;
        }
        self.values[len - 1 - n]
    }

    /// Number of candles with a recorded value (ready or not).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    pub fn is_ready(&self) -> bool {
        self.last().is_some()
    }

    pub fn reset(&mut self) {
        self.committed = self.initial.clone();
        self.committed_at = None;
        self.values.clear();
        self.provisional = false;
        self.last_timestamp = None;
    }
}

impl<S: Streaming<Output = Decimal>> Tracked<S> {
    /// `(last, prev)` snapshot of a single-valued indicator.
    pub fn trace(&self) -> (Option<Decimal>, Option<Decimal>) {
        (self.last(), self.prev())
    }
}
