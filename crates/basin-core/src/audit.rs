//! Non-mutating invariant checks.
//!
//! `audit_state` is a pure function of (lattice, grid, last action): every
//! probe runs on scratch copies, never on the engine's grid.

use std::collections::HashSet;

use serde::Serialize;

use crate::engine::{LastAction, LocalOp, local_index_map, permute_global, permute_local};
use crate::error::{AuditCheck, LatticeError, Result};
use crate::hash::canonical_bytes;
use crate::lattice::Lattice;
use crate::rotation::check_bijection;

/// Outcome of a successful audit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditReport {
    /// State hash, identical before and after the audit.
    pub hash: String,
    /// The action the audit was scoped to.
    pub scope: LastAction,
    /// Checks that ran and passed, in order.
    pub checks: Vec<AuditCheck>,
}

impl AuditReport {
    pub fn passed(&self, check: AuditCheck) -> bool {
        self.checks.contains(&check)
    }
}

pub fn audit_state(lattice: &Lattice, grid: &[u32], last: &LastAction) -> Result<Vec<AuditCheck>> {
    let mut checks = Vec::with_capacity(5);

    check_permutation(lattice, grid)?;
    checks.push(AuditCheck::Permutation);

    match *last {
        LastAction::None => {
            // No operation to scope to: validate every global map instead.
            for op in 0..lattice.rotations().len() {
                check_global_map(lattice, op)?;
            }
            checks.push(AuditCheck::GlobalMapBijection);
        }
        LastAction::Global { op_id } => {
            check_global_map(lattice, op_id)?;
            checks.push(AuditCheck::GlobalMapBijection);
            check_global_roundtrip(lattice, grid, op_id)?;
            checks.push(AuditCheck::InverseRoundtrip);
        }
        LastAction::Local(op) => {
            let region = check_local_map(lattice, op)?;
            checks.push(AuditCheck::LocalRegionBijection);
            check_local_roundtrip(lattice, grid, op, &region)?;
            checks.push(AuditCheck::OutsideRegionUnchanged);
            checks.push(AuditCheck::InverseRoundtrip);
        }
    }

    Ok(checks)
}

fn check_permutation(lattice: &Lattice, grid: &[u32]) -> Result<()> {
    if grid.len() != lattice.len() {
        return Err(LatticeError::violation(
            AuditCheck::Permutation,
            format!("grid has {} tokens, lattice has {} sites", grid.len(), lattice.len()),
        ));
    }
    let tokens: Vec<usize> = grid.iter().map(|&t| t as usize).collect();
    check_bijection(&tokens).map_err(|detail| {
        LatticeError::violation(AuditCheck::Permutation, format!("grid tokens: {detail}"))
    })
}

fn check_global_map(lattice: &Lattice, op_id: usize) -> Result<()> {
    let map = lattice.rotations().map(op_id).map_err(|e| {
        LatticeError::violation(AuditCheck::GlobalMapBijection, e.to_string())
    })?;
    if map.len() != lattice.len() {
        return Err(LatticeError::violation(
            AuditCheck::GlobalMapBijection,
            format!("op {op_id} map has {} entries for {} sites", map.len(), lattice.len()),
        ));
    }
    check_bijection(map).map_err(|detail| {
        LatticeError::violation(AuditCheck::GlobalMapBijection, format!("op {op_id}: {detail}"))
    })
}

/// Recompute the restricted map and confirm it permutes the region onto
/// itself. Returns the region's index set.
fn check_local_map(lattice: &Lattice, op: LocalOp) -> Result<HashSet<usize>> {
    let fail = |detail: String| LatticeError::violation(AuditCheck::LocalRegionBijection, detail);
    let mapping = local_index_map(lattice, op.op_id, op.center, op.radius)
        .map_err(|e| fail(e.to_string()))?;

    let side = (2 * op.radius + 1) as usize;
    if mapping.len() != side.pow(3) {
        return Err(fail(format!(
            "region of radius {} has {} sites, expected {}",
            op.radius,
            mapping.len(),
            side.pow(3)
        )));
    }

    let domain: HashSet<usize> = mapping.iter().map(|&(from, _)| from).collect();
    let image: HashSet<usize> = mapping.iter().map(|&(_, to)| to).collect();
    if domain.len() != mapping.len() {
        return Err(fail("domain has collisions".into()));
    }
    if image.len() != mapping.len() {
        return Err(fail("image has collisions".into()));
    }
    if let Some(&bad) = domain.iter().chain(&image).find(|&&i| i >= lattice.len()) {
        return Err(fail(format!("index {bad} outside lattice")));
    }
    if domain != image {
        return Err(fail("image is not the region itself".into()));
    }
    Ok(domain)
}

fn check_global_roundtrip(lattice: &Lattice, grid: &[u32], op_id: usize) -> Result<()> {
    let rotations = lattice.rotations();
    let fail = |detail: String| LatticeError::violation(AuditCheck::InverseRoundtrip, detail);
    let inv = rotations.inverse(op_id).map_err(|e| fail(e.to_string()))?;
    let forward = rotations.map(op_id).map_err(|e| fail(e.to_string()))?;
    let backward = rotations.map(inv).map_err(|e| fail(e.to_string()))?;

    let before = permute_global(grid, backward);
    let redone = permute_global(&before, forward);
    if canonical_bytes(lattice.n(), &redone) != canonical_bytes(lattice.n(), grid) {
        return Err(fail(format!(
            "undoing op {op_id} with {inv} and re-applying does not restore the state"
        )));
    }
    Ok(())
}

fn check_local_roundtrip(
    lattice: &Lattice,
    grid: &[u32],
    op: LocalOp,
    region: &HashSet<usize>,
) -> Result<()> {
    let fail = |detail: String| LatticeError::violation(AuditCheck::InverseRoundtrip, detail);
    let inv = lattice
        .rotations()
        .inverse(op.op_id)
        .map_err(|e| fail(e.to_string()))?;
    let backward =
        local_index_map(lattice, inv, op.center, op.radius).map_err(|e| fail(e.to_string()))?;
    let forward = local_index_map(lattice, op.op_id, op.center, op.radius)
        .map_err(|e| fail(e.to_string()))?;

    let before = permute_local(grid, &backward);
    if let Some(i) = (0..grid.len()).find(|i| !region.contains(i) && before[*i] != grid[*i]) {
        return Err(LatticeError::violation(
            AuditCheck::OutsideRegionUnchanged,
            format!("site {i} outside the region differs from the pre-operation state"),
        ));
    }

    let redone = permute_local(&before, &forward);
    if canonical_bytes(lattice.n(), &redone) != canonical_bytes(lattice.n(), grid) {
        return Err(fail(format!(
            "undoing local op {} with {inv} and re-applying does not restore the state",
            op.op_id
        )));
    }
    Ok(())
}
