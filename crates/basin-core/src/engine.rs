//! The reversible permutation engine.
//!
//! A `LatticeEngine` owns one grid: a permutation of the tokens 0..N³, where
//! token `t` is "at home" when it sits at linear index `t`. All mutation goes
//! through global or local rotations, each of which is a bijection with a
//! known inverse, and every applied operation can be audited.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditReport, audit_state};
use crate::constants::MAX_PROPOSAL_RADIUS;
use crate::coords::{Coord, CoordinateIndexer};
use crate::error::{AuditCheck, LatticeError, Result};
use crate::hash::{canonical_bytes, state_hash};
use crate::lattice::Lattice;
use crate::moves::LocalMoveSampler;
use crate::rotation::mat_vec;

/// A rotation restricted to the Chebyshev ball of `radius` around `center`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalOp {
    pub op_id: usize,
    pub center: Coord,
    pub radius: i32,
}

/// The most recent mutation, which scopes what an audit verifies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastAction {
    #[default]
    None,
    Global {
        op_id: usize,
    },
    Local(LocalOp),
}

#[derive(Clone, Debug)]
pub struct LatticeEngine {
    lattice: Arc<Lattice>,
    grid: Vec<u32>,
    last_action: LastAction,
}

impl LatticeEngine {
    /// Identity-state engine on the shared lattice of size `n`.
    pub fn new(n: u32) -> Result<Self> {
        Ok(Self::with_lattice(Lattice::shared(n)?))
    }

    pub fn with_lattice(lattice: Arc<Lattice>) -> Self {
        let grid = (0..lattice.len() as u32).collect();
        Self {
            lattice,
            grid,
            last_action: LastAction::None,
        }
    }

    pub fn lattice(&self) -> &Arc<Lattice> {
        &self.lattice
    }

    pub fn n(&self) -> u32 {
        self.lattice.n()
    }

    pub fn grid(&self) -> &[u32] {
        &self.grid
    }

    pub fn last_action(&self) -> LastAction {
        self.last_action
    }

    /// op_id of the identity rotation.
    pub fn identity_op(&self) -> usize {
        self.lattice.rotations().identity()
    }

    /// Replace the grid with a seeded shuffle and forget the last action.
    pub fn randomize(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.grid.shuffle(&mut rng);
        self.last_action = LastAction::None;
    }

    /// Install an explicit grid. Rejects anything that is not a permutation
    /// of 0..N³ before touching the current state, then audits.
    pub fn load_grid(&mut self, grid: &[u32]) -> Result<AuditReport> {
        if grid.len() != self.lattice.len() {
            return Err(LatticeError::Config(format!(
                "grid length {} does not match lattice of {} sites",
                grid.len(),
                self.lattice.len()
            )));
        }
        let mut seen = vec![false; grid.len()];
        for &token in grid {
            match seen.get_mut(token as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(LatticeError::Config(format!(
                        "grid is not a permutation: token {token} duplicated or out of range"
                    )));
                }
            }
        }
        self.grid.clear();
        self.grid.extend_from_slice(grid);
        self.last_action = LastAction::None;
        self.audit()
    }

    /// Global rotation: `new_grid[map[i]] = old_grid[i]`.
    pub fn apply(&mut self, op_id: usize) -> Result<()> {
        let map = self.lattice.rotations().map(op_id)?;
        self.grid = permute_global(&self.grid, map);
        self.last_action = LastAction::Global { op_id };
        Ok(())
    }

    /// Rotation restricted to a Chebyshev ball. Sites outside the ball keep
    /// their tokens. All validation happens before the grid is touched.
    pub fn apply_local(&mut self, op_id: usize, center: Coord, radius: i32) -> Result<()> {
        let mapping = local_index_map(&self.lattice, op_id, center, radius)?;
        self.grid = permute_local(&self.grid, &mapping);
        self.last_action = LastAction::Local(LocalOp {
            op_id,
            center,
            radius,
        });
        Ok(())
    }

    pub fn apply_local_op(&mut self, op: LocalOp) -> Result<()> {
        self.apply_local(op.op_id, op.center, op.radius)
    }

    pub fn inverse_op(&self, op_id: usize) -> Result<usize> {
        self.lattice.rotations().inverse(op_id)
    }

    /// The local operation that exactly undoes `(op_id, center, radius)`.
    pub fn inverse_local(&self, op_id: usize, center: Coord, radius: i32) -> Result<LocalOp> {
        Ok(LocalOp {
            op_id: self.inverse_op(op_id)?,
            center,
            radius,
        })
    }

    /// Apply `steps` uniformly random valid local rotations, ignoring energy,
    /// auditing after each one. The first failed audit aborts.
    pub fn perturb(&mut self, steps: usize, seed: u64) -> Result<()> {
        self.perturb_with_radius(steps, seed, MAX_PROPOSAL_RADIUS)
    }

    /// `perturb` with proposals capped at `max_radius` instead of the default.
    pub fn perturb_with_radius(&mut self, steps: usize, seed: u64, max_radius: i32) -> Result<()> {
        let sampler = LocalMoveSampler::new(&self.lattice, max_radius)?;
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..steps {
            let mv = sampler.sample(&mut rng);
            self.apply_local_op(mv)?;
            self.audit()?;
        }
        tracing::trace!(steps, seed, "perturbed engine");
        Ok(())
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_bytes(self.n(), &self.grid)
    }

    /// SHA-256 of the canonical encoding, lowercase hex.
    pub fn hash(&self) -> String {
        state_hash(self.n(), &self.grid)
    }

    /// Verify every invariant for the current grid and last action.
    ///
    /// Works on scratch copies only; the hash is compared before and after
    /// and a mismatch is reported as a violation.
    pub fn audit(&self) -> Result<AuditReport> {
        let before = self.hash();
        let mut checks = audit_state(&self.lattice, &self.grid, &self.last_action)?;
        let after = self.hash();
        if before != after {
            return Err(LatticeError::violation(
                AuditCheck::HashStable,
                format!("hash changed during audit: {before} -> {after}"),
            ));
        }
        checks.push(AuditCheck::HashStable);
        Ok(AuditReport {
            hash: after,
            scope: self.last_action,
            checks,
        })
    }

    #[cfg(test)]
    pub(crate) fn grid_mut(&mut self) -> &mut Vec<u32> {
        &mut self.grid
    }

    #[cfg(test)]
    pub(crate) fn set_last_action(&mut self, action: LastAction) {
        self.last_action = action;
    }
}

/// `out[map[i]] = grid[i]` for every site.
pub(crate) fn permute_global(grid: &[u32], map: &[usize]) -> Vec<u32> {
    let mut out = vec![0; grid.len()];
    for (&token, &to) in grid.iter().zip(map) {
        out[to] = token;
    }
    out
}

/// `out[to] = grid[from]` for each pair; every other site is copied.
pub(crate) fn permute_local(grid: &[u32], mapping: &[(usize, usize)]) -> Vec<u32> {
    let mut out = grid.to_vec();
    for &(from, to) in mapping {
        out[to] = grid[from];
    }
    out
}

/// (old index, new index) pairs induced by rotating the ball about its center,
/// in lexicographic order of the old coordinate.
pub(crate) fn local_index_map(
    lattice: &Lattice,
    op_id: usize,
    center: Coord,
    radius: i32,
) -> Result<Vec<(usize, usize)>> {
    let matrix = lattice.rotations().matrix(op_id)?;
    if radius < 0 {
        return Err(LatticeError::InvalidOperation(format!(
            "radius must be non-negative, got {radius}"
        )));
    }
    let indexer = lattice.indexer();
    if !indexer.contains(center) || !indexer.ball_fits(center, radius) {
        return Err(LatticeError::OutOfBounds {
            center,
            radius,
            k: indexer.k(),
        });
    }

    let out_of_bounds = || LatticeError::OutOfBounds {
        center,
        radius,
        k: indexer.k(),
    };
    CoordinateIndexer::ball(center, radius)
        .map(|c| {
            let from = indexer.coord_to_index(c).ok_or_else(out_of_bounds)?;
            let rotated = center.offset(mat_vec(matrix, c.delta(center)));
            let to = indexer.coord_to_index(rotated).ok_or_else(out_of_bounds)?;
            Ok((from, to))
        })
        .collect()
}
