use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::MIN_LATTICE_SIZE;
use crate::error::{LatticeError, Result};

/// Integer lattice coordinate. Each component lies in [-k, k] for k = N / 2.
///
/// The derived ordering is lexicographic over (x, y, z), which is also the
/// linear index order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const ORIGIN: Coord = Coord { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise sum.
    pub fn offset(self, d: Coord) -> Self {
        Self::new(self.x + d.x, self.y + d.y, self.z + d.z)
    }

    /// Component-wise difference `self - other`.
    pub fn delta(self, other: Coord) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// L∞ distance.
    pub fn chebyshev(self, other: Coord) -> i32 {
        let d = self.delta(other);
        d.x.abs().max(d.y.abs()).max(d.z.abs())
    }

    /// L1 distance. Two sites are 6-neighbors iff this is 1.
    pub fn manhattan(self, other: Coord) -> i32 {
        let d = self.delta(other);
        d.x.abs() + d.y.abs() + d.z.abs()
    }

    /// Squared Euclidean distance.
    pub fn distance_squared(self, other: Coord) -> i64 {
        let d = self.delta(other);
        let (x, y, z) = (d.x as i64, d.y as i64, d.z as i64);
        x * x + y * y + z * z
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<(i32, i32, i32)> for Coord {
    fn from((x, y, z): (i32, i32, i32)) -> Self {
        Self::new(x, y, z)
    }
}

/// Bijection between lattice coordinates and linear indices 0..N³.
///
/// Indices follow lexicographic (x, y, z) order, so index 0 is (-k, -k, -k)
/// and index N³-1 is (k, k, k). Immutable once built.
#[derive(Clone, Debug)]
pub struct CoordinateIndexer {
    n: u32,
    k: i32,
    coords: Vec<Coord>,
}

impl CoordinateIndexer {
    /// Build the indexer. Fails if `n` is even or smaller than 3.
    pub fn new(n: u32) -> Result<Self> {
        if n < MIN_LATTICE_SIZE || n % 2 == 0 {
            return Err(LatticeError::Config(format!(
                "lattice size must be odd and >= {MIN_LATTICE_SIZE}, got {n}"
            )));
        }
        let k = (n / 2) as i32;
        let mut coords = Vec::with_capacity((n as usize).pow(3));
        for x in -k..=k {
            for y in -k..=k {
                for z in -k..=k {
                    coords.push(Coord::new(x, y, z));
                }
            }
        }
        Ok(Self { n, k, coords })
    }

    /// Lattice edge length N.
    pub fn n(&self) -> u32 {
        self.n
    }

    /// Half-width k = N / 2.
    pub fn k(&self) -> i32 {
        self.k
    }

    /// Number of sites, N³.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// All coordinates in linear-index order.
    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    pub fn contains(&self, c: Coord) -> bool {
        let k = self.k;
        (-k..=k).contains(&c.x) && (-k..=k).contains(&c.y) && (-k..=k).contains(&c.z)
    }

    pub fn index_to_coord(&self, index: usize) -> Option<Coord> {
        self.coords.get(index).copied()
    }

    pub fn coord_to_index(&self, c: Coord) -> Option<usize> {
        if !self.contains(c) {
            return None;
        }
        let n = self.n as usize;
        let k = self.k;
        let (x, y, z) = ((c.x + k) as usize, (c.y + k) as usize, (c.z + k) as usize);
        Some((x * n + y) * n + z)
    }

    /// Whether the whole Chebyshev ball of `radius` around `center` is in bounds.
    pub fn ball_fits(&self, center: Coord, radius: i32) -> bool {
        radius >= 0
            && self.contains(center)
            && [center.x, center.y, center.z]
                .iter()
                .all(|c| radius <= self.k - c.abs())
    }

    /// Coordinates of the Chebyshev ball, in lexicographic order.
    /// The caller is responsible for checking `ball_fits` first.
    pub fn ball(center: Coord, radius: i32) -> impl Iterator<Item = Coord> {
        (-radius..=radius).flat_map(move |dx| {
            (-radius..=radius).flat_map(move |dy| {
                (-radius..=radius).map(move |dz| center.offset(Coord::new(dx, dy, dz)))
            })
        })
    }
}
