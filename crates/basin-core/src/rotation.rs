//! The 24 proper rotations of the cube as precomputed index permutations.
//!
//! Rotations are the signed axis-permutation matrices with determinant +1,
//! sorted lexicographically by rows. That ordering fixes the op_id of every
//! rotation; the identity is located by search rather than assumed to be 0.
//!
//! Everything is computed once per lattice size and never mutated, so a
//! `RotationGroup` can be shared freely between engines and threads.

use crate::constants::ROTATION_COUNT;
use crate::coords::{Coord, CoordinateIndexer};
use crate::error::{AuditCheck, LatticeError, Result};

/// Integer 3×3 matrix, row-major.
pub type Matrix3 = [[i32; 3]; 3];

pub const IDENTITY_MATRIX: Matrix3 = [[1, 0, 0], [0, 1, 0], [0, 0, 1]];

const AXIS_PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

pub fn det3(m: &Matrix3) -> i32 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

pub fn mat_mul(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut out = [[0; 3]; 3];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|i| a[r][i] * b[i][c]).sum();
        }
    }
    out
}

pub fn mat_vec(m: &Matrix3, v: Coord) -> Coord {
    Coord::new(
        m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
        m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
        m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
    )
}

/// Orthogonal matrices invert by transposition.
pub fn transpose(m: &Matrix3) -> Matrix3 {
    let mut out = [[0; 3]; 3];
    for (r, row) in m.iter().enumerate() {
        for (c, &v) in row.iter().enumerate() {
            out[c][r] = v;
        }
    }
    out
}

/// The 24 proper cube rotations in canonical (sorted) order.
pub fn proper_rotations() -> Vec<Matrix3> {
    let mut mats = Vec::with_capacity(ROTATION_COUNT);
    for perm in AXIS_PERMUTATIONS {
        for sign_bits in 0..8u8 {
            let mut m = [[0; 3]; 3];
            for (r, &axis) in perm.iter().enumerate() {
                m[r][axis] = if sign_bits & (1 << r) == 0 { 1 } else { -1 };
            }
            if det3(&m) == 1 {
                mats.push(m);
            }
        }
    }
    mats.sort_unstable();
    mats.dedup();
    mats
}

/// Precomputed rotation tables for one lattice size.
#[derive(Clone, Debug)]
pub struct RotationGroup {
    matrices: Vec<Matrix3>,
    /// maps[op][old_index] = new_index
    maps: Vec<Vec<usize>>,
    /// compose[a][b] = rotation equal to applying `a`, then `b`
    compose: Vec<[usize; ROTATION_COUNT]>,
    inverse: [usize; ROTATION_COUNT],
    identity: usize,
}

impl RotationGroup {
    /// Build and verify the group for the given indexer's lattice.
    pub fn new(indexer: &CoordinateIndexer) -> Result<Self> {
        let matrices = proper_rotations();
        if matrices.len() != ROTATION_COUNT {
            return Err(LatticeError::violation(
                AuditCheck::GroupClosure,
                format!("expected {ROTATION_COUNT} proper rotations, got {}", matrices.len()),
            ));
        }

        let lookup = |m: &Matrix3| -> Result<usize> {
            matrices.binary_search(m).map_err(|_| {
                LatticeError::violation(
                    AuditCheck::GroupClosure,
                    format!("matrix {m:?} is not one of the {ROTATION_COUNT} rotations"),
                )
            })
        };

        let mut maps = Vec::with_capacity(ROTATION_COUNT);
        for m in &matrices {
            let mut map = Vec::with_capacity(indexer.len());
            for &c in indexer.coords() {
                let rotated = mat_vec(m, c);
                let new_i = indexer.coord_to_index(rotated).ok_or_else(|| {
                    LatticeError::violation(
                        AuditCheck::GlobalMapBijection,
                        format!("rotation maps {c} outside the lattice to {rotated}"),
                    )
                })?;
                map.push(new_i);
            }
            maps.push(map);
        }

        let mut compose = Vec::with_capacity(ROTATION_COUNT);
        for a in &matrices {
            let mut row = [0; ROTATION_COUNT];
            for (slot, b) in row.iter_mut().zip(&matrices) {
                // apply a, then b: v -> B(A v)
                *slot = lookup(&mat_mul(b, a))?;
            }
            compose.push(row);
        }

        let mut inverse = [0; ROTATION_COUNT];
        for (slot, m) in inverse.iter_mut().zip(&matrices) {
            *slot = lookup(&transpose(m))?;
        }

        let identity = lookup(&IDENTITY_MATRIX)?;

        let group = Self {
            matrices,
            maps,
            compose,
            inverse,
            identity,
        };
        group.verify()?;
        Ok(group)
    }

    /// Number of rotations (always 24).
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Number of lattice sites each map acts on.
    pub fn domain_len(&self) -> usize {
        self.maps.first().map_or(0, Vec::len)
    }

    pub fn check_op(&self, op_id: usize) -> Result<()> {
        if op_id < self.len() {
            Ok(())
        } else {
            Err(LatticeError::InvalidOperation(format!(
                "op_id must be in [0, {}), got {op_id}",
                self.len()
            )))
        }
    }

    /// op_id of the identity rotation.
    pub fn identity(&self) -> usize {
        self.identity
    }

    pub fn matrix(&self, op_id: usize) -> Result<&Matrix3> {
        self.check_op(op_id)?;
        Ok(&self.matrices[op_id])
    }

    /// Full index map (old index → new index) for `op_id`.
    pub fn map(&self, op_id: usize) -> Result<&[usize]> {
        self.check_op(op_id)?;
        Ok(&self.maps[op_id])
    }

    /// New index of the site at `old_index` under `op_id`.
    pub fn apply(&self, op_id: usize, old_index: usize) -> Result<usize> {
        self.map(op_id)?
            .get(old_index)
            .copied()
            .ok_or_else(|| {
                LatticeError::InvalidOperation(format!(
                    "index {old_index} outside lattice of {} sites",
                    self.domain_len()
                ))
            })
    }

    pub fn inverse(&self, op_id: usize) -> Result<usize> {
        self.check_op(op_id)?;
        Ok(self.inverse[op_id])
    }

    /// The rotation equal to applying `a` first, then `b`.
    pub fn compose(&self, a: usize, b: usize) -> Result<usize> {
        self.check_op(a)?;
        self.check_op(b)?;
        Ok(self.compose[a][b])
    }

    /// Re-verify every group invariant against the index maps:
    /// each map is a bijection, the composition table agrees with map
    /// composition, and each inverse undoes its rotation.
    pub fn verify(&self) -> Result<()> {
        for op in 0..self.len() {
            check_bijection(&self.maps[op]).map_err(|detail| {
                LatticeError::violation(AuditCheck::GlobalMapBijection, format!("op {op}: {detail}"))
            })?;
        }

        if self.maps[self.identity].iter().enumerate().any(|(i, &j)| i != j) {
            return Err(LatticeError::violation(
                AuditCheck::GroupClosure,
                format!("op {} is not the identity permutation", self.identity),
            ));
        }

        for a in 0..self.len() {
            for b in 0..self.len() {
                let c = self.compose[a][b];
                let (ma, mb, mc) = (&self.maps[a], &self.maps[b], &self.maps[c]);
                if (0..ma.len()).any(|i| mb[ma[i]] != mc[i]) {
                    return Err(LatticeError::violation(
                        AuditCheck::GroupClosure,
                        format!("compose({a}, {b}) = {c} disagrees with the index maps"),
                    ));
                }
            }
            if self.compose[a][self.inverse[a]] != self.identity {
                return Err(LatticeError::violation(
                    AuditCheck::GroupClosure,
                    format!("op {a} followed by its inverse {} is not the identity", self.inverse[a]),
                ));
            }
        }
        Ok(())
    }
}

/// Checks that `map` is a permutation of 0..map.len().
pub(crate) fn check_bijection(map: &[usize]) -> std::result::Result<(), String> {
    let mut seen = vec![false; map.len()];
    for (i, &j) in map.iter().enumerate() {
        match seen.get_mut(j) {
            None => return Err(format!("index {i} maps out of range to {j}")),
            Some(true) => return Err(format!("index {i} collides at image {j}")),
            Some(slot) => *slot = true,
        }
    }
    Ok(())
}
