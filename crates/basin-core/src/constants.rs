/// Number of proper rotations of the cube.
pub const ROTATION_COUNT: usize = 24;

/// Smallest supported lattice edge length.
pub const MIN_LATTICE_SIZE: u32 = 3;

/// Canonical starting temperature of the exponential cooling schedule.
pub const DEFAULT_T0: f64 = 3.0;

/// Canonical final temperature of the exponential cooling schedule.
pub const DEFAULT_TMIN: f64 = 0.05;

/// Canonical annealing window, used for both the basin search and the re-anneal.
pub const DEFAULT_ANNEAL_STEPS: usize = 3000;

/// Weight of the neighbor-disagreement term in the default energy.
pub const NEIGHBOR_WEIGHT: f64 = 1.0;

/// Weight of the home-distance term in the default energy.
pub const HOME_WEIGHT: f64 = 0.2;

/// Largest Chebyshev radius proposed by the random local move sampler.
pub const MAX_PROPOSAL_RADIUS: i32 = 2;

/// Minimum empirical recovery probability for a perturbation size to count
/// toward the stability radius.
pub const DEFAULT_RECOVERY_THRESHOLD: f64 = 0.5;

/// Seed offsets that derive independent per-trial streams from the
/// experiment seed: basin anneal, perturbation, re-anneal.
pub const BASIN_SEED_OFFSET: u64 = 10_000;
pub const PERTURB_SEED_OFFSET: u64 = 20_000;
pub const REANNEAL_SEED_OFFSET: u64 = 30_000;

/// Hex prefix length used when labelling basin transitions.
pub const SHORT_HASH_LEN: usize = 12;
