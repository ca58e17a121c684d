use alphabot_core::Signal;

/// Suppresses a signal repeating the last retained one on the same candle.
///
/// Two signals are the same when kind, direction and base time match. Only
/// admitted signals become the reference.
#[derive(Debug, Clone, Default)]
pub struct SignalDedup {
    last: Option<Signal>,
}

impl SignalDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the signal when it is not a repeat of the last retained one.
    pub fn admit(&mut self, signal: Signal) -> Option<Signal> {
        if self.last.as_ref().is_some_and(|last| last.same_slot(&signal)) {
            return None;
        }
        self.last = Some(signal.clone());
        Some(signal)
    }

    pub fn last(&self) -> Option<&Signal> {
        self.last.as_ref()
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}
