use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coords::Coord;

/// The individual invariant checks performed by an audit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCheck {
    /// Grid holds every token 0..N³ exactly once.
    Permutation,
    /// The 24 rotations are closed under composition and each has an inverse.
    GroupClosure,
    /// The global index map used by the last action is a bijection.
    GlobalMapBijection,
    /// The local index map is a bijection of the ball onto itself.
    LocalRegionBijection,
    /// Sites outside the local ball were not touched.
    OutsideRegionUnchanged,
    /// Undoing then redoing the last action reproduces the current bytes.
    InverseRoundtrip,
    /// The audit itself left the state hash unchanged.
    HashStable,
}

impl fmt::Display for AuditCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditCheck::Permutation => "permutation",
            AuditCheck::GroupClosure => "rotation group closure",
            AuditCheck::GlobalMapBijection => "global map bijection",
            AuditCheck::LocalRegionBijection => "local region bijection",
            AuditCheck::OutsideRegionUnchanged => "outside region unchanged",
            AuditCheck::InverseRoundtrip => "inverse roundtrip",
            AuditCheck::HashStable => "audit hash stability",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum LatticeError {
    /// Invalid lattice size, schedule or other parameter. Raised before any mutation.
    Config(String),
    /// A local region does not fit inside the lattice. Engine state untouched.
    OutOfBounds { center: Coord, radius: i32, k: i32 },
    /// Unknown op_id, negative radius, or an operation issued in the wrong state.
    InvalidOperation(String),
    /// An audit check failed. Fatal: the engine must be discarded.
    InvariantViolation { check: AuditCheck, detail: String },
}

impl LatticeError {
    pub(crate) fn violation(check: AuditCheck, detail: impl Into<String>) -> Self {
        LatticeError::InvariantViolation {
            check,
            detail: detail.into(),
        }
    }

    /// True for errors that indicate a bug in the reversible-operation machinery.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LatticeError::InvariantViolation { .. })
    }
}

impl fmt::Display for LatticeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatticeError::Config(msg) => write!(f, "config error: {msg}"),
            LatticeError::OutOfBounds { center, radius, k } => write!(
                f,
                "local region out of bounds: center {center} radius {radius} exceeds [-{k}, {k}]"
            ),
            LatticeError::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
            LatticeError::InvariantViolation { check, detail } => {
                write!(f, "invariant violation ({check}): {detail}")
            }
        }
    }
}

impl std::error::Error for LatticeError {}

pub type Result<T> = std::result::Result<T, LatticeError>;
