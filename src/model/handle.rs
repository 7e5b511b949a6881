//! Element handle: the opaque address of a node, edge or link.

use serde::{Deserialize, Serialize};

/// Opaque element identifier.
///
/// The zero value is reserved: [`ElementHandle::NULL`] never names a live
/// element, and every store primitive reports it as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementHandle(pub u32);

impl ElementHandle {
    pub const NULL: ElementHandle = ElementHandle(0);

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Raw integer form used by wire protocols.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for ElementHandle {
    fn from(raw: u32) -> Self {
        ElementHandle(raw)
    }
}
