//! Optimistic set membership with rollback.
//!
//! A toggle flips membership immediately. For every key with requests in
//! flight the set remembers the server-side baseline; when the last request
//! for a key settles, membership is restored to that baseline (which
//! already includes every toggle the server accepted).

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    /// Membership as the server sees it, given the settled requests.
    baseline: bool,
    /// Requests not yet settled.
    in_flight: u32,
}

/// A set whose toggles are applied locally before the server confirms them.
#[derive(Debug, Clone)]
pub struct OptimisticSet<K> {
    members: BTreeSet<K>,
    pending: HashMap<K, Pending>,
}

impl<K> Default for OptimisticSet<K> {
    fn default() -> Self {
        Self {
            members: BTreeSet::new(),
            pending: HashMap::new(),
        }
    }
}

impl<K: Ord + Hash + Clone> OptimisticSet<K> {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `key` and return the new membership.
    ///
    /// Every toggle must be followed by exactly one [`settle`](Self::settle).
    pub fn toggle(&mut self, key: K) -> bool {
        let was_member = self.members.contains(&key);
        let pending = self.pending.entry(key.clone()).or_insert(Pending {
            baseline: was_member,
            in_flight: 0,
        });
        pending.in_flight += 1;

        if was_member {
            self.members.remove(&key);
        } else {
            self.members.insert(key);
        }
        !was_member
    }

    /// Record the outcome of one toggle request for `key`.
    pub fn settle(&mut self, key: &K, succeeded: bool) {
        let Some(pending) = self.pending.get_mut(key) else {
            return;
        };
        if succeeded {
            pending.baseline = !pending.baseline;
        }
        pending.in_flight = pending.in_flight.saturating_sub(1);
        if pending.in_flight > 0 {
            return;
        }

        let baseline = pending.baseline;
        self.pending.remove(key);
        if baseline {
            self.members.insert(key.clone());
        } else {
            self.members.remove(key);
        }
    }

    /// Add many keys as confirmed members.
    pub fn union(&mut self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            if let Some(pending) = self.pending.get_mut(&key) {
                pending.baseline = true;
                // An odd number of toggles in flight means the local view is
                // the opposite of the baseline.
                if pending.in_flight % 2 == 1 {
                    self.members.remove(&key);
                    continue;
                }
            }
            self.members.insert(key);
        }
    }

    /// Replace the confirmed members with a server snapshot, keeping the
    /// effect of toggles still in flight.
    pub fn replace(&mut self, keys: impl IntoIterator<Item = K>) {
        self.members = keys.into_iter().collect();
        for (key, pending) in &mut self.pending {
            pending.baseline = self.members.contains(key);
            if pending.in_flight % 2 == 1 {
                if pending.baseline {
                    self.members.remove(key);
                } else {
                    self.members.insert(key.clone());
                }
            }
        }
    }

    /// Drop every member and pending record.
    pub fn clear(&mut self) {
        self.members.clear();
        self.pending.clear();
    }

    /// Whether `key` is currently a member (including unconfirmed toggles).
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.members.contains(key)
    }

    /// Whether `key` has toggles in flight.
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Members in order.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.members.iter()
    }

    /// Members as a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<K> {
        self.members.iter().cloned().collect()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<K: Ord + Hash + Clone> FromIterator<K> for OptimisticSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
            pending: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&'static str]) -> OptimisticSet<&'static str> {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_successful_toggle_sticks() {
        let mut liked = set(&["a"]);
        assert!(liked.toggle("b"));
        assert!(liked.contains(&"b"));
        assert!(liked.is_pending(&"b"));

        liked.settle(&"b", true);
        assert!(liked.contains(&"b"));
        assert!(!liked.is_pending(&"b"));
    }

    #[test]
    fn test_failed_toggle_rolls_back() {
        let mut liked = set(&["a"]);
        assert!(!liked.toggle("a"));
        assert!(!liked.contains(&"a"));

        liked.settle(&"a", false);
        assert_eq!(liked.to_vec(), vec!["a"]);
    }

    #[test]
    fn test_double_toggle_both_succeed_restores_original() {
        let mut liked = set(&["a"]);
        liked.toggle("b");
        liked.toggle("b");
        liked.settle(&"b", true);
        liked.settle(&"b", true);
        assert_eq!(liked.to_vec(), vec!["a"]);
    }

    #[test]
    fn test_out_of_order_settlement() {
        // First request fails, second succeeds: the server applied one toggle.
        let mut liked = set(&[]);
        liked.toggle("x");
        liked.toggle("x");
        assert!(!liked.contains(&"x"));

        liked.settle(&"x", false);
        assert!(!liked.contains(&"x"), "still one request in flight");
        liked.settle(&"x", true);
        assert!(liked.contains(&"x"));
    }

    #[test]
    fn test_replace_keeps_in_flight_toggle() {
        let mut liked = set(&["a"]);
        liked.toggle("b");
        liked.replace(["a", "c"]);
        assert_eq!(liked.to_vec(), vec!["a", "b", "c"]);

        liked.settle(&"b", false);
        assert_eq!(liked.to_vec(), vec!["a", "c"]);
    }

    #[test]
    fn test_union() {
        let mut liked = set(&["p2"]);
        liked.union(["p1", "p3"]);
        assert_eq!(liked.to_vec(), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_settle_unknown_key_is_noop() {
        let mut liked = set(&["a"]);
        liked.settle(&"zzz", false);
        assert_eq!(liked.len(), 1);
    }
}
