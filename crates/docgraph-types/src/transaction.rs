use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide transaction id counter. Shared by every document so that
/// edits spanning several documents can be grouped under one id.
static LAST_TRANSACTION_ID: AtomicU64 = AtomicU64::new(0);

/// Identifier of one undoable unit of document mutation.
///
/// Ids are drawn from a single monotonically increasing counter shared
/// across the whole process; they are never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Draw a fresh id from the process-wide counter.
    pub fn next() -> Self {
        Self(LAST_TRANSACTION_ID.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The most recently issued id, or `None` if no id was drawn yet.
    pub fn last() -> Option<Self> {
        match LAST_TRANSACTION_ID.load(Ordering::SeqCst) {
            0 => None,
            n => Some(Self(n)),
        }
    }

    /// Wrap a raw id (e.g. one read back from a journal).
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}
