//! # Merge scheduler
//!
//! Drives the agglomerative loop over the live set:
//! 1. select the region with the globally highest best-partner potential,
//! 2. order the pair so the larger-weight side absorbs,
//! 3. emit a merge record,
//! 4. construct the merged region and retire both parents,
//! 5. refresh the best-partner slots of every survivor using the additive
//!    cache shortcut.
//!
//! Each iteration shrinks the live set by exactly one, so the loop terminates
//! after N−1 merges. With the `parallel` feature the initial pair scan and
//! the per-merge potential evaluation run on rayon with a deterministic
//! per-region reduction that preserves the serial tie-breaking.

pub mod live_set;
pub use live_set::LiveSet;

use log::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::cache::PotentialCache;
use crate::emit::MergeSink;
use crate::error::{ClusterError, OptionExt, Result};
use crate::potential::pair_potential;
use crate::region::{Region, RegionId};
use crate::{ClusterConfig, MergeRecord, Point};

/// Counters accumulated over a clustering run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Merges performed; also the last sequence number issued.
    pub merges: u64,
    /// Records actually written (merges minus zero-weight suppressions).
    pub records_emitted: u64,
    /// Refresh summands answered from the potential cache.
    pub cache_hits: u64,
    /// Refresh summands evaluated point-by-point.
    pub cache_misses: u64,
    /// Survivor slots rebuilt because their best partner was retired.
    pub rescans: u64,
}

/// A single clustering session: live set, potential cache, and the loop that
/// drives N singletons down to one root.
///
/// Single-threaded cooperative: no suspension points, no
/// asynchronous I/O inside the loop. Create it, drive it to completion with
/// [`run`], discard it. The merge tree is not retained in memory; it lives
/// only in the emitted record stream.
///
/// [`run`]: ClusterEngine::run
pub struct ClusterEngine {
    live: LiveSet,
    cache: PotentialCache,
    config: ClusterConfig,
    stats: EngineStats,
}

impl ClusterEngine {
    /// Build a session from ingested points; each becomes a singleton region.
    pub fn new(points: Vec<Point>, config: ClusterConfig) -> Self {
        let mut live = LiveSet::with_capacity(points.len());
        for point in points {
            live.insert(Region::singleton(point));
        }
        Self {
            live,
            cache: PotentialCache::new(),
            config,
            stats: EngineStats::default(),
        }
    }

    /// Number of live regions.
    pub fn live_regions(&self) -> usize {
        self.live.len()
    }

    /// Counters so far.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// The single surviving region, once the run is complete.
    pub fn root(&self) -> Option<&Region> {
        if self.live.len() == 1 {
            self.live.iter().next().map(|(_, r)| r)
        } else {
            None
        }
    }

    /// Run the full merge loop, emitting one record per merge into `sink`.
    ///
    /// Consumes the live set down to a single root and returns the final
    /// counters. Any invariant or numeric violation aborts the run.
    pub fn run(&mut self, sink: &mut impl MergeSink) -> Result<EngineStats> {
        self.seed_best_partners()?;
        info!(
            "initial pair scan complete over {} regions",
            self.live.len()
        );

        while self.live.len() > 1 {
            self.step(sink)?;
            if self.stats.merges % 1000 == 0 {
                debug!(
                    "{} merges done, {} regions live",
                    self.stats.merges,
                    self.live.len()
                );
            }
        }
        sink.finish()?;

        info!(
            "clustering complete: {} merges, {} records emitted, cache {}/{} hit/miss, {} rescans",
            self.stats.merges,
            self.stats.records_emitted,
            self.stats.cache_hits,
            self.stats.cache_misses,
            self.stats.rescans
        );
        Ok(self.stats)
    }

    /// One merge: select, emit, construct, retire, refresh, invalidate.
    fn step(&mut self, sink: &mut impl MergeSink) -> Result<()> {
        let (slot_i, slot_j) = self.select()?;

        self.stats.merges += 1;
        let record = self.build_record(self.stats.merges, slot_i, slot_j)?;
        // Degenerate zero-weight side: suppress the row, keep the merge.
        if record.n_b > 0.0 {
            sink.record(&record)?;
            self.stats.records_emitted += 1;
        }

        let mut parent_a = self
            .live
            .remove(slot_i)
            .ok_or_invariant("absorbing region vanished before merge")?;
        let mut parent_b = self
            .live
            .remove(slot_j)
            .ok_or_invariant("absorbed region vanished before merge")?;

        let split = parent_a.members.len();
        let q_id = parent_b.id;
        let merged = Region::merge(&mut parent_a, &mut parent_b);
        let merged_size = merged.size();
        let p_id = merged.id;
        let m_slot = self.live.insert(merged);
        // Both parents are left with empty member lists; the members now
        // belong solely to the merged region.
        drop(parent_a);
        drop(parent_b);

        self.refresh(m_slot, split, q_id, [slot_i, slot_j])?;

        // Parent-era cache entries survive only long enough for the refresh
        // above to consume them. When the merged region is too small to
        // cache, the id-inheriting side is tombstoned (its id lives on in the
        // merged region) and the other side is dropped outright (its id is
        // dead).
        if merged_size <= self.config.cache_threshold {
            self.cache.tombstone_all(p_id);
            self.cache.purge(q_id);
        }
        Ok(())
    }

    /// Pick the live pair with the globally maximum potential.
    ///
    /// Scans best-partner slots in live order; the first strict maximum wins,
    /// so equal potentials resolve to the earliest-inserted region. Returns
    /// (heavier slot, lighter slot).
    fn select(&mut self) -> Result<(usize, usize)> {
        let mut best_slot = None;
        let mut max_pot = 0.0;
        for (slot, region) in self.live.iter() {
            if region.best_pot > max_pot {
                max_pot = region.best_pot;
                best_slot = Some(slot);
            }
        }

        let slot_i = best_slot.ok_or_invariant("no positive potential among live regions")?;
        let slot_j = self
            .live
            .get(slot_i)
            .ok_or_invariant("selected region vanished")?
            .best_partner
            .ok_or_invariant("selected region has no best partner")?;
        if !self.live.is_live(slot_j) {
            return Err(ClusterError::invariant(
                "selected region's best partner is not live",
            ));
        }

        let (ri, rj) = self
            .live
            .get2_mut(slot_i, slot_j)
            .ok_or_invariant("selected pair not distinct and live")?;
        if ri.n < rj.n {
            Ok((slot_j, slot_i))
        } else {
            Ok((slot_i, slot_j))
        }
    }

    /// Merge record for a pair about to merge: side A is the heavier region,
    /// centroids are pre-merge, primordial coordinates trace each id back to
    /// its original input point.
    fn build_record(&self, seq: u64, slot_a: usize, slot_b: usize) -> Result<MergeRecord> {
        let a = self
            .live
            .get(slot_a)
            .ok_or_invariant("record side A not live")?;
        let b = self
            .live
            .get(slot_b)
            .ok_or_invariant("record side B not live")?;

        Ok(MergeRecord {
            seq,
            id_a: a.id,
            n_a: a.n,
            lat_a: a.y,
            lon_a: a.x,
            orig_lat_a: a.orig_lat,
            orig_lon_a: a.orig_lon,
            id_b: b.id,
            n_b: b.n,
            lat_b: b.y,
            lon_b: b.x,
            orig_lat_b: b.orig_lat,
            orig_lon_b: b.orig_lon,
        })
    }

    // ========================================================================
    // Initial pair scan
    // ========================================================================

    /// Seed every region's best-partner slot from the full O(N²) pair scan.
    #[cfg(not(feature = "parallel"))]
    fn seed_best_partners(&mut self) -> Result<()> {
        let slots = self.live.live_slots().to_vec();
        for (pos, &si) in slots.iter().enumerate() {
            if pos % 1000 == 0 {
                debug!("pair scan at region {} of {}", pos, slots.len());
            }
            for &sj in &slots[pos + 1..] {
                let pot = self.checked_pair_potential(si, sj)?;
                let (ri, rj) = self
                    .live
                    .get2_mut(si, sj)
                    .ok_or_invariant("dead region in pair scan")?;
                if pot > ri.best_pot {
                    ri.best_pot = pot;
                    ri.best_partner = Some(sj);
                }
                if pot > rj.best_pot {
                    rj.best_pot = pot;
                    rj.best_partner = Some(si);
                }
            }
        }
        Ok(())
    }

    /// Seed every region's best-partner slot, in parallel.
    ///
    /// Each region scans all others in live order with a strict `>`, so ties
    /// resolve to the earliest partner, the same slot the serial pairwise
    /// pass produces.
    #[cfg(feature = "parallel")]
    fn seed_best_partners(&mut self) -> Result<()> {
        let slots = self.live.live_slots().to_vec();
        let seeded: Vec<(usize, f64, Option<usize>)> = slots
            .par_iter()
            .map(|&si| -> Result<(usize, f64, Option<usize>)> {
                let mut best_pot = 0.0;
                let mut best_partner = None;
                for &sj in &slots {
                    if sj == si {
                        continue;
                    }
                    let pot = self.checked_pair_potential(si, sj)?;
                    if pot > best_pot {
                        best_pot = pot;
                        best_partner = Some(sj);
                    }
                }
                Ok((si, best_pot, best_partner))
            })
            .collect::<Result<_>>()?;

        for (slot, pot, partner) in seeded {
            let region = self
                .live
                .get_mut(slot)
                .ok_or_invariant("dead region in pair scan")?;
            region.best_pot = pot;
            region.best_partner = partner;
        }
        Ok(())
    }

    // ========================================================================
    // Post-merge refresh
    // ========================================================================

    /// Refresh every survivor against the freshly merged region at `m_slot`.
    ///
    /// `split` is the boundary between the two parents' members inside the
    /// merged list, `q_id` the retired non-inheriting parent's id, `retired`
    /// the two vacated slots. Survivors whose best partner was retired get a
    /// full slot rebuild before the merged region is folded in.
    fn refresh(
        &mut self,
        m_slot: usize,
        split: usize,
        q_id: RegionId,
        retired: [usize; 2],
    ) -> Result<()> {
        let survivors: Vec<usize> = self
            .live
            .live_slots()
            .iter()
            .copied()
            .filter(|&s| s != m_slot)
            .collect();

        let (p_id, merged_caches) = {
            let merged = self
                .live
                .get(m_slot)
                .ok_or_invariant("merged region not live during refresh")?;
            (merged.id, merged.size() > self.config.cache_threshold)
        };

        let evaluated = self.evaluate_survivors(&survivors, m_slot, split, q_id)?;

        for (r_slot, pot) in evaluated {
            if merged_caches {
                let r_id = self
                    .live
                    .get(r_slot)
                    .ok_or_invariant("survivor vanished during refresh")?
                    .id;
                self.cache.insert(p_id, r_id, pot);
            }

            // A slot pointing at a retired region is reconstructed from
            // scratch before the merged region competes for it.
            let partner_retired = {
                let r = self
                    .live
                    .get(r_slot)
                    .ok_or_invariant("survivor vanished during refresh")?;
                matches!(r.best_partner, Some(p) if p == retired[0] || p == retired[1])
            };
            if partner_retired {
                self.rescan(r_slot, &survivors)?;
            }

            let (merged, r) = self
                .live
                .get2_mut(m_slot, r_slot)
                .ok_or_invariant("refresh pair not distinct and live")?;
            if pot > merged.best_pot {
                merged.best_pot = pot;
                merged.best_partner = Some(r_slot);
            }
            if pot > r.best_pot {
                r.best_pot = pot;
                r.best_partner = Some(m_slot);
            }
        }
        Ok(())
    }

    /// Potentials of every survivor against the merged region.
    #[cfg(not(feature = "parallel"))]
    fn evaluate_survivors(
        &mut self,
        survivors: &[usize],
        m_slot: usize,
        split: usize,
        q_id: RegionId,
    ) -> Result<Vec<(usize, f64)>> {
        let mut evaluated = Vec::with_capacity(survivors.len());
        for &r_slot in survivors {
            let (pot, hits, misses) = self.additive_potential(m_slot, split, r_slot, q_id)?;
            self.stats.cache_hits += hits;
            self.stats.cache_misses += misses;
            evaluated.push((r_slot, pot));
        }
        Ok(evaluated)
    }

    /// Potentials of every survivor against the merged region, in parallel.
    ///
    /// The evaluation only reads the live set and the cache; cache insertion
    /// and slot updates happen afterwards in live order, so results and
    /// tie-breaking match the serial pass exactly.
    #[cfg(feature = "parallel")]
    fn evaluate_survivors(
        &mut self,
        survivors: &[usize],
        m_slot: usize,
        split: usize,
        q_id: RegionId,
    ) -> Result<Vec<(usize, f64)>> {
        let results: Vec<(usize, f64, u64, u64)> = survivors
            .par_iter()
            .map(|&r_slot| -> Result<(usize, f64, u64, u64)> {
                let (pot, hits, misses) = self.additive_potential(m_slot, split, r_slot, q_id)?;
                Ok((r_slot, pot, hits, misses))
            })
            .collect::<Result<_>>()?;

        let mut evaluated = Vec::with_capacity(results.len());
        for (r_slot, pot, hits, misses) in results {
            self.stats.cache_hits += hits;
            self.stats.cache_misses += misses;
            evaluated.push((r_slot, pot));
        }
        Ok(evaluated)
    }

    /// `pot(M, R)` as `pot(R, P) + pot(R, Q)` over the merged member list.
    ///
    /// Exact by linearity: the merged members are precisely the two parents'
    /// members concatenated at `split`. Each summand comes from the cache
    /// when present, otherwise from a fresh point-by-point evaluation that is
    /// not cached; insertion is governed by the merged side's size, not the
    /// survivor's. Returns (potential, cache hits, cache misses).
    fn additive_potential(
        &self,
        m_slot: usize,
        split: usize,
        r_slot: usize,
        q_id: RegionId,
    ) -> Result<(f64, u64, u64)> {
        let merged = self
            .live
            .get(m_slot)
            .ok_or_invariant("merged region vacated during refresh")?;
        let r = self
            .live
            .get(r_slot)
            .ok_or_invariant("dead region in refresh")?;
        // The merged region inherited the absorbing parent's id, so
        // parent-era entries are still keyed under it.
        let p_id = merged.id;

        let mut hits = 0;
        let mut misses = 0;
        let pot_p = match self.cache.get(r.id, p_id) {
            Some(v) => {
                hits += 1;
                v
            }
            None => {
                misses += 1;
                pair_potential(&r.members, &merged.members[..split])
            }
        };
        let pot_q = match self.cache.get(r.id, q_id) {
            Some(v) => {
                hits += 1;
                v
            }
            None => {
                misses += 1;
                pair_potential(&r.members, &merged.members[split..])
            }
        };

        let pot = validate_potential(pot_p + pot_q, p_id, r.id)?;
        Ok((pot, hits, misses))
    }

    /// Rebuild a survivor's best-partner slot from scratch against every
    /// other survivor, in live order. The merged region is folded in by the
    /// caller afterwards, matching its position at the end of the live set.
    fn rescan(&mut self, r_slot: usize, survivors: &[usize]) -> Result<()> {
        self.stats.rescans += 1;
        {
            let r = self
                .live
                .get_mut(r_slot)
                .ok_or_invariant("rescan target not live")?;
            r.best_pot = 0.0;
            r.best_partner = None;
        }

        for &s_slot in survivors {
            if s_slot == r_slot {
                continue;
            }
            let (pot, hit) = self.cached_or_fresh(r_slot, s_slot)?;
            if hit {
                self.stats.cache_hits += 1;
            } else {
                self.stats.cache_misses += 1;
            }
            let r = self
                .live
                .get_mut(r_slot)
                .ok_or_invariant("rescan target not live")?;
            if pot > r.best_pot {
                r.best_pot = pot;
                r.best_partner = Some(s_slot);
            }
        }
        Ok(())
    }

    /// Potential between two live regions: cached value when available,
    /// point-by-point otherwise. Returns (potential, whether it was a hit).
    fn cached_or_fresh(&self, a_slot: usize, b_slot: usize) -> Result<(f64, bool)> {
        let a = self
            .live
            .get(a_slot)
            .ok_or_invariant("dead region in pair lookup")?;
        let b = self
            .live
            .get(b_slot)
            .ok_or_invariant("dead region in pair lookup")?;

        if let Some(pot) = self.cache.get(a.id, b.id) {
            return Ok((pot, true));
        }
        let pot = validate_potential(pair_potential(&a.members, &b.members), a.id, b.id)?;
        Ok((pot, false))
    }

    /// Fresh point-by-point potential between two live regions, validated.
    fn checked_pair_potential(&self, a_slot: usize, b_slot: usize) -> Result<f64> {
        let a = self
            .live
            .get(a_slot)
            .ok_or_invariant("dead region in pair scan")?;
        let b = self
            .live
            .get(b_slot)
            .ok_or_invariant("dead region in pair scan")?;
        validate_potential(pair_potential(&a.members, &b.members), a.id, b.id)
    }
}

/// Reject NaN and negative potentials; +∞ is valid (duplicate coordinates
/// force an immediate merge).
fn validate_potential(pot: f64, a: RegionId, b: RegionId) -> Result<f64> {
    if pot.is_nan() || pot < 0.0 {
        return Err(ClusterError::Numeric {
            region_a: a,
            region_b: b,
            value: pot,
        });
    }
    Ok(pot)
}
