//! Scalar energies over engine state. Diagnostic heuristics, 0 at the
//! identity arrangement, never mutating.

use serde::{Deserialize, Serialize};

use crate::constants::{HOME_WEIGHT, NEIGHBOR_WEIGHT};
use crate::engine::LatticeEngine;

pub trait EnergyModel {
    fn evaluate(&self, engine: &LatticeEngine) -> f64;
}

/// Number of 6-neighbor site pairs whose tokens' home coordinates are not
/// themselves 6-neighbors.
pub fn neighbor_disagreement_energy(engine: &LatticeEngine) -> u64 {
    let lattice = engine.lattice();
    let home = lattice.indexer().coords();
    let grid = engine.grid();
    lattice
        .edges()
        .iter()
        .filter(|&&(a, b)| home[grid[a] as usize].manhattan(home[grid[b] as usize]) != 1)
        .count() as u64
}

/// Sum over sites of the squared distance between the site and the home
/// coordinate of the token sitting on it.
pub fn home_distance_smooth_energy(engine: &LatticeEngine) -> f64 {
    let home = engine.lattice().indexer().coords();
    engine
        .grid()
        .iter()
        .zip(home)
        .map(|(&token, &site)| site.distance_squared(home[token as usize]))
        .sum::<i64>() as f64
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NeighborDisagreement;

impl EnergyModel for NeighborDisagreement {
    fn evaluate(&self, engine: &LatticeEngine) -> f64 {
        neighbor_disagreement_energy(engine) as f64
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HomeDistance;

impl EnergyModel for HomeDistance {
    fn evaluate(&self, engine: &LatticeEngine) -> f64 {
        home_distance_smooth_energy(engine)
    }
}

/// `neighbor * neighbor_disagreement + home * home_distance_smooth`.
/// The default weights (1.0, 0.2) are the energy used by annealing and recovery.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedEnergy {
    pub neighbor: f64,
    pub home: f64,
}

impl Default for WeightedEnergy {
    fn default() -> Self {
        Self {
            neighbor: NEIGHBOR_WEIGHT,
            home: HOME_WEIGHT,
        }
    }
}

impl EnergyModel for WeightedEnergy {
    fn evaluate(&self, engine: &LatticeEngine) -> f64 {
        let mut e = 0.0;
        if self.neighbor != 0.0 {
            e += self.neighbor * neighbor_disagreement_energy(engine) as f64;
        }
        if self.home != 0.0 {
            e += self.home * home_distance_smooth_energy(engine);
        }
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Coord;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_is_zero() {
        for n in [3, 5, 7] {
            let e = LatticeEngine::new(n).unwrap();
            assert_eq!(neighbor_disagreement_energy(&e), 0);
            assert_eq!(home_distance_smooth_energy(&e), 0.0);
            assert_eq!(WeightedEnergy::default().evaluate(&e), 0.0);
        }
    }

    #[test]
    fn test_single_swap() {
        let mut e = LatticeEngine::new(3).unwrap();
        // swap the corner (-1,-1,-1) with the center (0,0,0)
        let mut grid: Vec<u32> = (0..27).collect();
        grid.swap(0, 13);
        e.load_grid(&grid).unwrap();

        // each swapped token is sqrt(3) from home
        assert_relative_eq!(home_distance_smooth_energy(&e), 6.0);

        // Corner site has 3 edges, center site 6; all 9 now disagree.
        assert_eq!(neighbor_disagreement_energy(&e), 9);
    }

    #[test]
    fn test_global_rotation_keeps_adjacency() {
        let mut e = LatticeEngine::new(5).unwrap();
        let op = (0..24).find(|&op| op != e.identity_op()).unwrap();
        e.apply(op).unwrap();
        assert_eq!(neighbor_disagreement_energy(&e), 0);
        assert!(home_distance_smooth_energy(&e) > 0.0);
    }

    #[test]
    fn test_weighted_combination() {
        let mut e = LatticeEngine::new(5).unwrap();
        e.randomize(11);
        let nd = neighbor_disagreement_energy(&e) as f64;
        let hd = home_distance_smooth_energy(&e);
        assert_relative_eq!(WeightedEnergy::default().evaluate(&e), nd + 0.2 * hd);
        assert_relative_eq!(NeighborDisagreement.evaluate(&e), nd);
        assert_relative_eq!(HomeDistance.evaluate(&e), hd);
        let custom = WeightedEnergy {
            neighbor: 0.0,
            home: 2.0,
        };
        assert_relative_eq!(custom.evaluate(&e), 2.0 * hd);
    }

    #[test]
    fn test_evaluation_does_not_mutate() {
        let mut e = LatticeEngine::new(5).unwrap();
        e.apply_local(4, Coord::ORIGIN, 1).unwrap();
        let h = e.hash();
        let last = e.last_action();
        let _ = WeightedEnergy::default().evaluate(&e);
        assert_eq!(e.hash(), h);
        assert_eq!(e.last_action(), last);
    }
}
