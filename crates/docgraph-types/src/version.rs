use serde::{Deserialize, Serialize};

/// Current document format version written by this build.
///
/// - 1: initial format, no attribute flags.
/// - 2: attribute flags (`read_only`, `hidden`, `transient`, `output`).
pub const FORMAT_VERSION: u32 = 2;

/// Version token carried through every save/restore call.
///
/// Readers use it to pick field-level compatibility behavior: fields an
/// older writer did not know are defaulted, fields it wrote but this build
/// no longer understands are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Document format version.
    pub format: u32,
    /// Free-form identification of the writing application.
    #[serde(default)]
    pub producer: String,
}

impl VersionInfo {
    /// The version written by this build.
    pub fn current() -> Self {
        Self {
            format: FORMAT_VERSION,
            producer: format!("docgraph {}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn new(format: u32) -> Self {
        Self {
            format,
            producer: String::new(),
        }
    }

    /// Whether records at this version carry attribute flags.
    pub fn has_attribute_flags(&self) -> bool {
        self.format >= 2
    }

    /// Whether the writer was newer than this build.
    pub fn is_newer_than_current(&self) -> bool {
        self.format > FORMAT_VERSION
    }
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self::current()
    }
}
