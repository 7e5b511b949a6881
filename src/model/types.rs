//! # Type Lattice
//!
//! Every element carries a 16-bit type tag built from three layers:
//!
//! | Layer | Bits | Meaning |
//! |-------|------|---------|
//! | sort | `0x001..=0x010` | node, link, undirected common edge, directed common arc, access arc |
//! | modality | `0x020`, `0x040` | const / var |
//! | sub-kind | `0x080..=0x2000` | arc polarity + permanency, or node kind |
//!
//! Sub-kind bits are interpreted per sort: `0x80` is "positive" on an arc and
//! "tuple" on a node. Tags are plain values; a handle's tag is fixed at creation.
//!
//! Composition is explicit ([`Type::compose`]) and refuses ambiguous results,
//! matching is a subset test ([`Type::matches`]).

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Bitmask type tag of a graph element.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Type(u16);

// ============================================================================
// Raw bits
// ============================================================================

impl Type {
    // Sort
    pub const NODE: Type = Type(0x1);
    pub const LINK: Type = Type(0x2);
    pub const EDGE_UCOMMON: Type = Type(0x4);
    pub const EDGE_DCOMMON: Type = Type(0x8);
    pub const EDGE_ACCESS: Type = Type(0x10);

    // Modality
    pub const CONST: Type = Type(0x20);
    pub const VAR: Type = Type(0x40);

    // Arc sub-kinds
    pub const ARC_POS: Type = Type(0x80);
    pub const ARC_NEG: Type = Type(0x100);
    pub const ARC_FUZ: Type = Type(0x200);
    pub const ARC_TEMP: Type = Type(0x400);
    pub const ARC_PERM: Type = Type(0x800);

    // Node sub-kinds
    pub const NODE_TUPLE: Type = Type(0x80);
    pub const NODE_STRUCT: Type = Type(0x100);
    pub const NODE_ROLE: Type = Type(0x200);
    pub const NODE_NOROLE: Type = Type(0x400);
    pub const NODE_CLASS: Type = Type(0x800);
    pub const NODE_ABSTRACT: Type = Type(0x1000);
    pub const NODE_MATERIAL: Type = Type(0x2000);

    /// The "unknown" tag: fails every positive predicate, matches everything
    /// when used as a constraint.
    pub const UNKNOWN: Type = Type(0);

    pub const SORT_MASK: u16 = 0x1 | 0x2 | 0x4 | 0x8 | 0x10;
    pub const EDGE_MASK: u16 = 0x4 | 0x8 | 0x10;
    pub const CONSTANCY_MASK: u16 = 0x20 | 0x40;
    pub const POSITIVITY_MASK: u16 = 0x80 | 0x100 | 0x200;
    pub const PERMANENCY_MASK: u16 = 0x400 | 0x800;
    pub const NODE_KIND_MASK: u16 = 0x80 | 0x100 | 0x200 | 0x400 | 0x800 | 0x1000 | 0x2000;
}

// ============================================================================
// Named composites
// ============================================================================

impl Type {
    pub const NODE_CONST: Type = Type(0x1 | 0x20);
    pub const NODE_VAR: Type = Type(0x1 | 0x40);
    pub const NODE_CONST_TUPLE: Type = Type(0x1 | 0x20 | 0x80);
    pub const NODE_VAR_TUPLE: Type = Type(0x1 | 0x40 | 0x80);
    pub const NODE_CONST_STRUCT: Type = Type(0x1 | 0x20 | 0x100);
    pub const NODE_VAR_STRUCT: Type = Type(0x1 | 0x40 | 0x100);
    pub const NODE_CONST_ROLE: Type = Type(0x1 | 0x20 | 0x200);
    pub const NODE_VAR_ROLE: Type = Type(0x1 | 0x40 | 0x200);
    pub const NODE_CONST_NOROLE: Type = Type(0x1 | 0x20 | 0x400);
    pub const NODE_VAR_NOROLE: Type = Type(0x1 | 0x40 | 0x400);
    pub const NODE_CONST_CLASS: Type = Type(0x1 | 0x20 | 0x800);
    pub const NODE_VAR_CLASS: Type = Type(0x1 | 0x40 | 0x800);
    pub const NODE_CONST_ABSTRACT: Type = Type(0x1 | 0x20 | 0x1000);
    pub const NODE_VAR_ABSTRACT: Type = Type(0x1 | 0x40 | 0x1000);
    pub const NODE_CONST_MATERIAL: Type = Type(0x1 | 0x20 | 0x2000);
    pub const NODE_VAR_MATERIAL: Type = Type(0x1 | 0x40 | 0x2000);

    pub const LINK_CONST: Type = Type(0x2 | 0x20);
    pub const LINK_VAR: Type = Type(0x2 | 0x40);

    pub const EDGE_UCOMMON_CONST: Type = Type(0x4 | 0x20);
    pub const EDGE_UCOMMON_VAR: Type = Type(0x4 | 0x40);
    pub const EDGE_DCOMMON_CONST: Type = Type(0x8 | 0x20);
    pub const EDGE_DCOMMON_VAR: Type = Type(0x8 | 0x40);

    pub const EDGE_ACCESS_CONST_POS_PERM: Type = Type(0x10 | 0x20 | 0x80 | 0x800);
    pub const EDGE_ACCESS_VAR_POS_PERM: Type = Type(0x10 | 0x40 | 0x80 | 0x800);
    pub const EDGE_ACCESS_CONST_NEG_PERM: Type = Type(0x10 | 0x20 | 0x100 | 0x800);
    pub const EDGE_ACCESS_VAR_NEG_PERM: Type = Type(0x10 | 0x40 | 0x100 | 0x800);
    pub const EDGE_ACCESS_CONST_FUZ_PERM: Type = Type(0x10 | 0x20 | 0x200 | 0x800);
    pub const EDGE_ACCESS_VAR_FUZ_PERM: Type = Type(0x10 | 0x40 | 0x200 | 0x800);
    pub const EDGE_ACCESS_CONST_POS_TEMP: Type = Type(0x10 | 0x20 | 0x80 | 0x400);
    pub const EDGE_ACCESS_VAR_POS_TEMP: Type = Type(0x10 | 0x40 | 0x80 | 0x400);
    pub const EDGE_ACCESS_CONST_NEG_TEMP: Type = Type(0x10 | 0x20 | 0x100 | 0x400);
    pub const EDGE_ACCESS_VAR_NEG_TEMP: Type = Type(0x10 | 0x40 | 0x100 | 0x400);
    pub const EDGE_ACCESS_CONST_FUZ_TEMP: Type = Type(0x10 | 0x20 | 0x200 | 0x400);
    pub const EDGE_ACCESS_VAR_FUZ_TEMP: Type = Type(0x10 | 0x40 | 0x200 | 0x400);
}

// ============================================================================
// Construction & raw round trip
// ============================================================================

impl Type {
    /// Wrap raw bits as received from a wire protocol. No validation.
    pub const fn from_bits(bits: u16) -> Self {
        Type(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Bitwise union without any checks; intended for building constants.
    pub const fn union(self, other: Type) -> Type {
        Type(self.0 | other.0)
    }

    /// Merge sort, modality and sub-kind bits of two tags.
    ///
    /// Fails with [`Error::TypeConflict`] when both sides name a sort and the
    /// sorts differ, or when one side is const and the other var.
    pub fn compose(self, other: Type) -> Result<Type> {
        let (ls, rs) = (self.sort_bits(), other.sort_bits());
        if ls != 0 && rs != 0 && ls != rs {
            return Err(Error::TypeConflict {
                left: self,
                right: other,
                message: "different element sorts".into(),
            });
        }
        let (lc, rc) = (self.0 & Type::CONSTANCY_MASK, other.0 & Type::CONSTANCY_MASK);
        if lc != 0 && rc != 0 && lc != rc {
            return Err(Error::TypeConflict {
                left: self,
                right: other,
                message: "const and var modality".into(),
            });
        }
        Ok(Type(self.0 | other.0))
    }

    /// Replace var modality by const. Tags without modality are unchanged.
    pub const fn to_const(self) -> Type {
        if self.0 & Type::VAR.0 != 0 {
            Type((self.0 & !Type::VAR.0) | Type::CONST.0)
        } else {
            self
        }
    }

    /// Replace const modality by var. Tags without modality are unchanged.
    pub const fn to_var(self) -> Type {
        if self.0 & Type::CONST.0 != 0 {
            Type((self.0 & !Type::CONST.0) | Type::VAR.0)
        } else {
            self
        }
    }
}

// ============================================================================
// Predicates
// ============================================================================

impl Type {
    /// Subset test: every bit of `self` (the constraint) is set in `concrete`.
    /// The unknown tag is the top of the lattice and matches any element.
    pub const fn matches(self, concrete: Type) -> bool {
        concrete.0 & self.0 == self.0
    }

    /// True when the two tags share at least one bit.
    pub const fn intersects(self, other: Type) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn sort_bits(self) -> u16 {
        self.0 & Type::SORT_MASK
    }

    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }

    pub const fn is_node(self) -> bool {
        self.0 & Type::NODE.0 != 0
    }

    pub const fn is_link(self) -> bool {
        self.0 & Type::LINK.0 != 0
    }

    pub const fn is_edge(self) -> bool {
        self.0 & Type::EDGE_MASK != 0
    }

    /// Directed edge: common arc or access arc.
    pub const fn is_arc(self) -> bool {
        self.0 & (Type::EDGE_DCOMMON.0 | Type::EDGE_ACCESS.0) != 0
    }

    /// Undirected common edge: matches in both orientations.
    pub const fn is_undirected(self) -> bool {
        self.0 & Type::EDGE_UCOMMON.0 != 0
    }

    pub const fn is_const(self) -> bool {
        self.0 & Type::CONST.0 != 0
    }

    pub const fn is_var(self) -> bool {
        self.0 & Type::VAR.0 != 0
    }

    pub const fn has_constancy(self) -> bool {
        self.0 & Type::CONSTANCY_MASK != 0
    }

    /// Exactly one sort bit is set.
    pub const fn is_valid(self) -> bool {
        self.sort_bits().count_ones() == 1
    }
}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Type({self} = {:#06x})", self.0)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            return f.write_str("Unknown");
        }
        let mut parts: Vec<&str> = Vec::new();
        if self.is_const() {
            parts.push("Const");
        }
        if self.is_var() {
            parts.push("Var");
        }
        if self.is_node() {
            parts.push("Node");
            for (bit, name) in [
                (Type::NODE_TUPLE, "Tuple"),
                (Type::NODE_STRUCT, "Struct"),
                (Type::NODE_ROLE, "Role"),
                (Type::NODE_NOROLE, "NoRole"),
                (Type::NODE_CLASS, "Class"),
                (Type::NODE_ABSTRACT, "Abstract"),
                (Type::NODE_MATERIAL, "Material"),
            ] {
                if self.intersects(bit) {
                    parts.push(name);
                }
            }
        } else {
            if self.is_link() {
                parts.push("Link");
            }
            if self.intersects(Type::EDGE_UCOMMON) {
                parts.push("UCommon");
            }
            if self.intersects(Type::EDGE_DCOMMON) {
                parts.push("DCommon");
            }
            if self.intersects(Type::EDGE_ACCESS) {
                parts.push("Access");
            }
            if self.is_edge() {
                for (bit, name) in [
                    (Type::ARC_POS, "Pos"),
                    (Type::ARC_NEG, "Neg"),
                    (Type::ARC_FUZ, "Fuz"),
                    (Type::ARC_TEMP, "Temp"),
                    (Type::ARC_PERM, "Perm"),
                ] {
                    if self.intersects(bit) {
                        parts.push(name);
                    }
                }
            }
        }
        if parts.is_empty() {
            return write!(f, "{:#06x}", self.0);
        }
        f.write_str(&parts.join(""))
    }
}
