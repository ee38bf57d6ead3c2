use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Generation-counted handle of an object stored in a document arena.
///
/// The `index` names an arena slot; the `generation` is bumped every time
/// the slot is handed to a different object. A handle whose generation no
/// longer matches its slot resolves to nothing, so stale handles can never
/// alias a newer object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Create a handle from its raw parts.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot index.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation this handle was issued for.
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Short textual form, e.g. `#3v1`.
    pub fn short(&self) -> String {
        format!("#{}v{}", self.index, self.generation)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    /// Parse the short form produced by [`ObjectId::short`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidHandle(s.to_string());
        let rest = s.strip_prefix('#').unwrap_or(s);
        let (index, generation) = rest.split_once('v').ok_or_else(invalid)?;
        let index = index.parse().map_err(|_| invalid())?;
        let generation = generation.parse().map_err(|_| invalid())?;
        Ok(Self::new(index, generation))
    }
}
