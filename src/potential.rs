//! Point-by-point potential evaluator.
//!
//! The attraction score between two regions is a gravitational-style sum over
//! their member-point pairs:
//!
//! ```text
//! pot(A, B) = Σ_{a ∈ A} Σ_{b ∈ B} (a.weight · b.weight) / d(a, b)⁴
//! ```
//!
//! Member lists are retained on every region precisely so this sum can be
//! evaluated exactly; the centroid alone is not enough. Potentials span many
//! orders of magnitude, so everything here is `f64`.

use crate::geo::distance_quad;
use crate::Point;

/// Potential between two disjoint member lists.
///
/// Symmetric: `pair_potential(a, b) == pair_potential(b, a)` up to summation
/// order. A member pair at identical coordinates contributes `+∞`, which is
/// the correct signal that the two regions must merge next; the infinity is
/// propagated, not guarded against.
///
/// Self-potential is undefined: callers must never pass overlapping lists.
pub fn pair_potential(a: &[Point], b: &[Point]) -> f64 {
    let mut pot = 0.0;
    for pa in a {
        for pb in b {
            pot += pa.weight * pb.weight / distance_quad(pa.lon, pa.lat, pb.lon, pb.lat);
        }
    }
    pot
}
