//! Reversible permutation lattice on an odd N×N×N cube.
//!
//! The state is a permutation of N³ tokens over the cube's sites. It is
//! mutated only by the 24 proper cube rotations, applied to the whole
//! lattice or to a Chebyshev ball, so every move has an exact inverse.
//! On top of the engine sit two diagnostic energies, a Metropolis
//! annealer that rolls back rejected moves, and a basin-recovery protocol
//! that measures how far a state can be pushed and still find its way back.
//!
//! Every mutation is audited; an invariant violation is an error, never a
//! silent repair. Zero I/O.

pub mod anneal;
pub mod audit;
pub mod constants;
pub mod coords;
pub mod energy;
pub mod engine;
pub mod error;
pub mod hash;
pub mod lattice;
pub mod moves;
pub mod recovery;
pub mod rotation;
pub mod schedule;
mod visits;
pub mod walk;

pub use anneal::{AnnealOptions, AnnealStep, AnnealTrace, AnnealingExplorer};
pub use audit::{AuditReport, audit_state};
pub use constants::{
    DEFAULT_ANNEAL_STEPS, DEFAULT_RECOVERY_THRESHOLD, DEFAULT_T0, DEFAULT_TMIN, HOME_WEIGHT,
    MAX_PROPOSAL_RADIUS, NEIGHBOR_WEIGHT, ROTATION_COUNT,
};
pub use coords::{Coord, CoordinateIndexer};
pub use energy::{
    EnergyModel, HomeDistance, NeighborDisagreement, WeightedEnergy, home_distance_smooth_energy,
    neighbor_disagreement_energy,
};
pub use engine::{LastAction, LatticeEngine, LocalOp};
pub use error::{AuditCheck, LatticeError, Result};
pub use hash::{canonical_bytes, short_hash, state_hash};
pub use lattice::Lattice;
pub use moves::LocalMoveSampler;
pub use recovery::{
    RecoveryConfig, RecoveryExperiment, RecoveryRecord, RecoverySummary, Stats, SweepPoint,
    recovery_rate, stability_radius,
};
pub use rotation::{Matrix3, RotationGroup};
pub use schedule::{ScheduleConfig, TemperatureSchedule};
pub use visits::visit_entropy;
pub use walk::{RandomWalk, WalkMode, WalkSummary};
