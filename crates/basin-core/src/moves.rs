use rand::Rng;

use crate::coords::Coord;
use crate::engine::LocalOp;
use crate::error::{LatticeError, Result};
use crate::lattice::Lattice;

/// Uniform sampler over every valid local move of a lattice.
///
/// The valid (center, radius) pairs are enumerated up front for radii
/// `1..=min(max_radius, k)`, so a draw is one uniform op_id plus one uniform
/// pair: every in-bounds (op_id, center, radius) triple is equally likely.
#[derive(Clone, Debug)]
pub struct LocalMoveSampler {
    sites: Vec<(Coord, i32)>,
    op_count: usize,
}

impl LocalMoveSampler {
    pub fn new(lattice: &Lattice, max_radius: i32) -> Result<Self> {
        if max_radius < 1 {
            return Err(LatticeError::Config(format!(
                "max proposal radius must be >= 1, got {max_radius}"
            )));
        }
        let indexer = lattice.indexer();
        let top = max_radius.min(indexer.k());
        let sites: Vec<(Coord, i32)> = (1..=top)
            .flat_map(|radius| {
                indexer
                    .coords()
                    .iter()
                    .filter(move |&&c| indexer.ball_fits(c, radius))
                    .map(move |&c| (c, radius))
            })
            .collect();
        Ok(Self {
            sites,
            op_count: lattice.rotations().len(),
        })
    }

    /// Number of distinct valid local moves.
    pub fn len(&self) -> usize {
        self.sites.len() * self.op_count
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Valid (center, radius) pairs.
    pub fn sites(&self) -> &[(Coord, i32)] {
        &self.sites
    }

    /// Draw order is fixed (op_id, then site) so seeded streams replay exactly.
    pub fn sample(&self, rng: &mut impl Rng) -> LocalOp {
        let op_id = rng.random_range(0..self.op_count);
        let (center, radius) = self.sites[rng.random_range(0..self.sites.len())];
        LocalOp {
            op_id,
            center,
            radius,
        }
    }
}
