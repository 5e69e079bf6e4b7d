use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use crate::coords::{Coord, CoordinateIndexer};
use crate::error::Result;
use crate::rotation::RotationGroup;

static REGISTRY: LazyLock<Mutex<HashMap<u32, Arc<Lattice>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Immutable structure shared by every engine of one lattice size:
/// coordinate indexer, rotation tables and the 6-neighbor edge list.
#[derive(Debug)]
pub struct Lattice {
    indexer: CoordinateIndexer,
    rotations: RotationGroup,
    edges: Vec<(usize, usize)>,
}

impl Lattice {
    /// Build a fresh lattice structure. Prefer `shared` outside of tests.
    pub fn new(n: u32) -> Result<Self> {
        let indexer = CoordinateIndexer::new(n)?;
        let rotations = RotationGroup::new(&indexer)?;
        let edges = unit_edges(&indexer);
        Ok(Self {
            indexer,
            rotations,
            edges,
        })
    }

    /// Process-wide instance for size `n`, built on first use.
    pub fn shared(n: u32) -> Result<Arc<Self>> {
        let mut registry = REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lattice) = registry.get(&n) {
            return Ok(Arc::clone(lattice));
        }
        let lattice = Arc::new(Self::new(n)?);
        tracing::debug!(n, sites = lattice.len(), "built shared lattice");
        registry.insert(n, Arc::clone(&lattice));
        Ok(lattice)
    }

    pub fn n(&self) -> u32 {
        self.indexer.n()
    }

    pub fn k(&self) -> i32 {
        self.indexer.k()
    }

    /// Number of sites, N³.
    pub fn len(&self) -> usize {
        self.indexer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexer.is_empty()
    }

    pub fn indexer(&self) -> &CoordinateIndexer {
        &self.indexer
    }

    pub fn rotations(&self) -> &RotationGroup {
        &self.rotations
    }

    /// Unordered axis-aligned unit-distance site pairs, each listed once.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }
}

fn unit_edges(indexer: &CoordinateIndexer) -> Vec<(usize, usize)> {
    const STEPS: [Coord; 3] = [Coord::new(1, 0, 0), Coord::new(0, 1, 0), Coord::new(0, 0, 1)];
    let mut edges = Vec::new();
    for (i, &c) in indexer.coords().iter().enumerate() {
        for step in STEPS {
            if let Some(j) = indexer.coord_to_index(c.offset(step)) {
                edges.push((i, j));
            }
        }
    }
    edges
}
