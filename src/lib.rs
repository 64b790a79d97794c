//! # gravtree
//!
//! Hierarchical agglomerative clustering of weighted geographic points,
//! driven by a gravitational-potential attraction score.
//!
//! This library provides:
//! - A planar-approximate geographic distance kernel (miles², cosine table)
//! - Exact pair potentials summed over region member points
//! - A sparse symmetric potential cache with explicit invalidation on merge
//! - The merge scheduler: N singletons down to one root, one record per merge
//! - CSV ingest and plain-text merge-record emission
//!
//! The output is a complete merge tree as a record stream: downstream tools
//! (map rendering, surface generation, tree annotation) consume the stream;
//! the tree itself is never held in memory.
//!
//! ## Features
//!
//! - **`parallel`** - Parallel pair scan and refresh with rayon, with a
//!   deterministic reduction that preserves serial tie-breaking
//!
//! ## Quick Start
//!
//! ```rust
//! use gravtree::{ClusterConfig, ClusterEngine, MergeRecord, Point};
//!
//! let points = vec![
//!     Point::new(0, -0.1278, 51.5074, 12.0),
//!     Point::new(1, -0.1290, 51.5080, 7.0),
//!     Point::new(2, 2.3522, 48.8566, 30.0),
//! ];
//!
//! let mut records: Vec<MergeRecord> = Vec::new();
//! let mut engine = ClusterEngine::new(points, ClusterConfig::default());
//! let stats = engine.run(&mut records).unwrap();
//!
//! assert_eq!(stats.merges, 2);
//! assert_eq!(records.len(), 2);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{ClusterError, OptionExt, Result};

// Geographic distance kernel (squared/quartic distance, closest-pair query)
pub mod geo;

// Point-by-point potential evaluator
pub mod potential;
pub use potential::pair_potential;

// Region model (weighted centroid + member list)
pub mod region;
pub use region::{Region, RegionId};

// Sparse symmetric potential cache
pub mod cache;
pub use cache::PotentialCache;

// Merge scheduler and live-set arena
pub mod engine;
pub use engine::{ClusterEngine, EngineStats, LiveSet};

// Ingest / emit adapters
pub mod ingest;
pub use ingest::{read_points, read_points_file};

pub mod emit;
pub use emit::{MergeSink, MergeWriter};

// ============================================================================
// Core Types
// ============================================================================

/// An original input point: coordinate plus weight.
///
/// Immutable once ingested. The id is the pre-filter row index assigned at
/// ingest; weights are strictly positive (zero-weight rows never get here).
///
/// # Example
/// ```
/// use gravtree::Point;
/// let point = Point::new(0, -73.93, 40.86, 1756.0); // a Bronx census tract
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Id assigned at ingest, inherited by the region carrying this point.
    pub id: u32,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Strictly positive weight (population count or similar).
    pub weight: f64,
}

impl Point {
    pub fn new(id: u32, lon: f64, lat: f64, weight: f64) -> Self {
        Self {
            id,
            lon,
            lat,
            weight,
        }
    }

    /// Check that the coordinates are finite and within geographic range.
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && self.weight.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// One record per merge, thirteen fields.
///
/// Side A is the larger-weight region at the moment of merge. Centroids are
/// pre-merge values; the `orig_*` fields are the primordial coordinates of
/// the input point whose id each side carries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    /// 1-based sequence number, monotonically increasing by 1 per merge.
    pub seq: u64,
    pub id_a: u32,
    pub n_a: f64,
    pub lat_a: f64,
    pub lon_a: f64,
    pub orig_lat_a: f64,
    pub orig_lon_a: f64,
    pub id_b: u32,
    pub n_b: f64,
    pub lat_b: f64,
    pub lon_b: f64,
    pub orig_lat_b: f64,
    pub orig_lon_b: f64,
}

/// Configuration for a clustering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Member-count threshold above which a freshly merged region caches its
    /// potentials against survivors.
    /// Default: 100
    pub cache_threshold: usize,

    /// Maximum number of input rows to ingest; `None` is unlimited.
    /// Default: None
    pub max_records: Option<usize>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cache_threshold: 100,
            max_records: None,
        }
    }
}
