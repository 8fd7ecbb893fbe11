//! Clique bookkeeping for the correspondence engine.
//!
//! Cliques live in an arena indexed by creation order, peaks point to their
//! clique through a membership map. A clique never holds two peaks of the
//! same run; additions that would break this are rejected and counted.

use nohash_hasher::{
    BuildNoHashHasher,
    IsEnabled,
};
use ridgepeaks::{
    Peak,
    PeakId,
    RunId,
};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::{
    Hash,
    Hasher,
};
use tracing::debug;

pub type CliqueId = usize;

/// Identifies a peak across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PeakKey {
    pub run_id: RunId,
    pub peak_id: PeakId,
}

impl PeakKey {
    pub fn new(run_id: RunId, peak_id: PeakId) -> Self {
        Self { run_id, peak_id }
    }

    pub fn of(peak: &Peak) -> Self {
        Self::new(peak.run_id, peak.id)
    }

    fn packed(&self) -> u64 {
        ((self.run_id as u64) << 32) | self.peak_id as u64
    }
}

impl Hash for PeakKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.packed());
    }
}

impl IsEnabled for PeakKey {}

pub type PeakKeyMap<V> = HashMap<PeakKey, V, BuildNoHashHasher<PeakKey>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentStats {
    pub created: usize,
    pub joins: usize,
    pub merges: usize,
    /// Joins refused because the clique already had a peak of that run.
    pub rejected_additions: usize,
    /// Members left behind during merges because of a run collision.
    pub dropped_in_merges: usize,
    /// Members removed for lacking a bidirectional best hit inside their clique.
    pub unconnected_removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created(CliqueId),
    Joined(CliqueId),
    Rejected(CliqueId),
    Merged { into: CliqueId, from: CliqueId },
    AlreadyLinked(CliqueId),
}

#[derive(Debug, Default)]
pub struct CliqueArena {
    slots: Vec<Option<Vec<PeakKey>>>,
    membership: PeakKeyMap<CliqueId>,
    stats: AssignmentStats,
}

impl CliqueArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clique_of(&self, key: &PeakKey) -> Option<CliqueId> {
        self.membership.get(key).copied()
    }

    pub fn members(&self, id: CliqueId) -> Option<&[PeakKey]> {
        self.slots.get(id).and_then(|s| s.as_deref())
    }

    pub fn stats(&self) -> AssignmentStats {
        self.stats
    }

    /// Number of live cliques.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has_run(&self, id: CliqueId, run_id: RunId) -> bool {
        self.members(id)
            .is_some_and(|m| m.iter().any(|k| k.run_id == run_id))
    }

    /// Records an edge between two peaks of different runs.
    pub fn link(&mut self, a: PeakKey, b: PeakKey) -> LinkOutcome {
        match (self.clique_of(&a), self.clique_of(&b)) {
            (None, None) => {
                let id = self.slots.len();
                self.slots.push(Some(vec![a, b]));
                self.membership.insert(a, id);
                self.membership.insert(b, id);
                self.stats.created += 1;
                LinkOutcome::Created(id)
            }
            (Some(id), None) => self.join(id, b),
            (None, Some(id)) => self.join(id, a),
            (Some(x), Some(y)) if x == y => LinkOutcome::AlreadyLinked(x),
            (Some(x), Some(y)) => self.merge(x, y),
        }
    }

    fn join(&mut self, id: CliqueId, key: PeakKey) -> LinkOutcome {
        if self.has_run(id, key.run_id) {
            self.stats.rejected_additions += 1;
            debug!("Rejected {:?} from clique {}, run already present", key, id);
            return LinkOutcome::Rejected(id);
        }
        if let Some(Some(members)) = self.slots.get_mut(id) {
            members.push(key);
            self.membership.insert(key, id);
            self.stats.joins += 1;
        }
        LinkOutcome::Joined(id)
    }

    /// Moves the smaller clique into the larger one. On equal sizes the
    /// later clique moves into the earlier one. Moving members whose run is
    /// already present in the target lose their clique.
    fn merge(&mut self, x: CliqueId, y: CliqueId) -> LinkOutcome {
        let len_of = |arena: &Self, id| arena.members(id).map_or(0, |m| m.len());
        let (into, from) = match len_of(self, x).cmp(&len_of(self, y)) {
            std::cmp::Ordering::Greater => (x, y),
            std::cmp::Ordering::Less => (y, x),
            std::cmp::Ordering::Equal => (x.min(y), x.max(y)),
        };

        let moving = self.slots[from].take().unwrap_or_default();
        for key in moving {
            if self.has_run(into, key.run_id) {
                self.membership.remove(&key);
                self.stats.dropped_in_merges += 1;
                debug!("Dropped {:?} while merging clique {} into {}", key, from, into);
                continue;
            }
            if let Some(Some(members)) = self.slots.get_mut(into) {
                members.push(key);
            }
            self.membership.insert(key, into);
        }
        self.stats.merges += 1;
        LinkOutcome::Merged { into, from }
    }

    fn remove(&mut self, key: &PeakKey) {
        if let Some(id) = self.membership.remove(key) {
            if let Some(Some(members)) = self.slots.get_mut(id) {
                members.retain(|k| k != key);
            }
        }
    }

    fn dissolve(&mut self, id: CliqueId) {
        if let Some(members) = self.slots.get_mut(id).and_then(Option::take) {
            for key in members.iter() {
                self.membership.remove(key);
            }
        }
    }

    /// Removes members without a `connected` partner inside their clique,
    /// repeating until nothing changes. Cliques left with fewer than two
    /// members are dissolved.
    pub fn retain_connected(&mut self, connected: impl Fn(&PeakKey, &PeakKey) -> bool) {
        loop {
            let mut changed = false;
            for id in 0..self.slots.len() {
                let Some(members) = self.members(id) else {
                    continue;
                };
                let lonely: Vec<PeakKey> = members
                    .iter()
                    .filter(|a| !members.iter().any(|b| a != &b && connected(a, b)))
                    .copied()
                    .collect();
                for key in lonely.iter() {
                    self.remove(key);
                }
                self.stats.unconnected_removed += lonely.len();
                changed |= !lonely.is_empty();

                if self.members(id).is_some_and(|m| m.len() < 2) {
                    self.dissolve(id);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Live cliques in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (CliqueId, &[PeakKey])> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, s)| s.as_deref().map(|m| (id, m)))
    }
}

/// A group of corresponding peaks, at most one per run, sorted by run id.
#[derive(Debug, Clone, Serialize)]
pub struct Clique {
    pub id: CliqueId,
    pub members: Vec<Peak>,
    /// Bidirectional best hit pairs among the members.
    pub bbh_edges: usize,
}

impl Clique {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, run_id: RunId) -> Option<&Peak> {
        self.members.iter().find(|p| p.run_id == run_id)
    }

    pub fn run_ids(&self) -> impl Iterator<Item = RunId> + '_ {
        self.members.iter().map(|p| p.run_id)
    }

    pub fn rt_mean(&self) -> Option<f64> {
        if self.members.is_empty() {
            return None;
        }
        let sum: f64 = self.members.iter().map(|p| p.apex_retention_time).sum();
        Some(sum / self.members.len() as f64)
    }

    /// Population variance of the apex retention times.
    pub fn rt_variance(&self) -> Option<f64> {
        let mean = self.rt_mean()?;
        let ss: f64 = self
            .members
            .iter()
            .map(|p| (p.apex_retention_time - mean).powi(2))
            .sum();
        Some(ss / self.members.len() as f64)
    }
}
