//! Per-session sequence numbering for client frames.

use crate::error::{Result, VoxwireError};

/// Marks a counter that has issued `i32::MAX`.
const EXHAUSTED: i32 = i32::MIN;

/// Monotonic signed counter starting at 1.
///
/// Every constructed client frame takes the current value; the final audio
/// frame carries the negated value without advancing the counter further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCounter {
    next: i32,
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Take the next sequence number.
    ///
    /// # Errors
    /// Returns `VoxwireError::SequenceExhausted` once `i32::MAX` has been
    /// issued; a number is never handed out twice.
    pub fn next_sequence(&mut self) -> Result<i32> {
        if self.next == EXHAUSTED {
            return Err(VoxwireError::SequenceExhausted { last: i32::MAX });
        }
        let current = self.next;
        self.next = current.checked_add(1).unwrap_or(EXHAUSTED);
        Ok(current)
    }

    /// Value the next call to [`next_sequence`](Self::next_sequence) returns,
    /// or `None` once the counter is exhausted.
    pub fn peek(&self) -> Option<i32> {
        (self.next != EXHAUSTED).then_some(self.next)
    }

    /// Negate `seq` to mark the last packet. Does not touch the counter.
    pub fn mark_last(seq: i32) -> i32 {
        -seq
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: i32) -> Self {
        Self { next }
    }

    pub fn reset(&mut self) {
        self.next = 1;
    }
}
