// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::slice;

use crate::util::bit_vec::{BitIter, BitVec, Idx};

const SMALL_SET_CAPACITY: usize = 32;

pub trait PointsToSet<T> {
    type Iter<'a>: Iterator<Item = T>
    where
        Self: 'a;

    fn new() -> Self;
    fn clear(&mut self);
    fn count(&self) -> usize;
    fn contains(&self, elem: T) -> bool;
    fn is_empty(&self) -> bool;
    fn superset(&self, other: &Self) -> bool;
    fn insert(&mut self, elem: T) -> bool;
    fn remove(&mut self, elem: T) -> bool;
    fn union(&mut self, other: &Self) -> bool;
    /// Adds all elements of `other` and returns the ones that were not
    /// already present.
    fn union_diff(&mut self, other: &Self) -> Self;
    fn subtract(&mut self, other: &Self) -> bool;
    fn iter<'a>(&'a self) -> Self::Iter<'a>;
}

/// Hybrid implementation of points to set,
/// which uses an explicit array for small sets, and a bit vector for large sets.
#[derive(Clone)]
pub struct HybridPointsToSet<T> {
    points_to: HybridSet<T>,
}

impl<T: Idx> fmt::Debug for HybridPointsToSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.points_to.fmt(f)
    }
}

impl<T: Idx> Default for HybridPointsToSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Idx> PartialEq for HybridPointsToSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.count() == other.count() && self.superset(other)
    }
}

impl<T: Idx> Eq for HybridPointsToSet<T> {}

impl<'a, T: Idx> IntoIterator for &'a HybridPointsToSet<T> {
    type Item = T;
    type IntoIter = HybridIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Idx> FromIterator<T> for HybridPointsToSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = HybridPointsToSet::new();
        for elem in iter {
            set.insert(elem);
        }
        set
    }
}

impl<T: Idx> HybridPointsToSet<T> {
    pub fn singleton(elem: T) -> Self {
        let mut set = HybridPointsToSet::new();
        set.insert(elem);
        set
    }
}

impl<T: Idx> PointsToSet<T> for HybridPointsToSet<T> {
    fn new() -> Self {
        HybridPointsToSet {
            points_to: HybridSet::new(),
        }
    }

    fn clear(&mut self) {
        self.points_to.clear();
    }

    fn count(&self) -> usize {
        self.points_to.count()
    }

    fn contains(&self, elem: T) -> bool {
        self.points_to.contains(elem)
    }

    fn is_empty(&self) -> bool {
        self.points_to.is_empty()
    }

    fn superset(&self, other: &HybridPointsToSet<T>) -> bool {
        self.points_to.superset(&other.points_to)
    }

    /// Adds `elem` to this set, returns true if it was not already in this set.
    fn insert(&mut self, elem: T) -> bool {
        self.points_to.insert(elem)
    }

    fn remove(&mut self, elem: T) -> bool {
        self.points_to.remove(elem)
    }

    fn union(&mut self, other: &HybridPointsToSet<T>) -> bool {
        self.points_to.union(&other.points_to)
    }

    fn union_diff(&mut self, other: &HybridPointsToSet<T>) -> HybridPointsToSet<T> {
        let mut diff = HybridPointsToSet::new();
        for elem in other.iter() {
            if self.insert(elem) {
                diff.insert(elem);
            }
        }
        diff
    }

    fn subtract(&mut self, other: &HybridPointsToSet<T>) -> bool {
        self.points_to.subtract(&other.points_to)
    }

    type Iter<'a> = HybridIter<'a, T>;
    fn iter(&self) -> HybridIter<'_, T> {
        self.points_to.iter()
    }
}

#[derive(Clone)]
pub enum HybridSet<T> {
    SmallSet(Vec<T>),
    LargeSet(BitVec<T>),
}

impl<T: Idx> fmt::Debug for HybridSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallSet(s) => s.fmt(f),
            Self::LargeSet(s) => s.fmt(f),
        }
    }
}

impl<T: Idx> HybridSet<T> {
    pub fn new() -> Self {
        HybridSet::SmallSet(Vec::new())
    }

    pub fn clear(&mut self) {
        match self {
            HybridSet::SmallSet(small) => small.clear(),
            HybridSet::LargeSet(_) => *self = HybridSet::new(),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            HybridSet::SmallSet(small) => small.len(),
            HybridSet::LargeSet(large) => large.count(),
        }
    }

    pub fn contains(&self, elem: T) -> bool {
        match self {
            HybridSet::SmallSet(small) => small.contains(&elem),
            HybridSet::LargeSet(large) => large.contains(elem),
        }
    }

    pub fn superset(&self, other: &HybridSet<T>) -> bool {
        match (self, other) {
            (HybridSet::LargeSet(self_large), HybridSet::LargeSet(other_large)) => {
                self_large.superset(other_large)
            }
            _ => other.iter().all(|elem| self.contains(elem)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            HybridSet::SmallSet(small) => small.is_empty(),
            HybridSet::LargeSet(large) => large.is_empty(),
        }
    }

    pub fn insert(&mut self, elem: T) -> bool {
        match self {
            HybridSet::SmallSet(small) if small.contains(&elem) => false,
            HybridSet::SmallSet(small) if small.len() < SMALL_SET_CAPACITY => {
                small.push(elem);
                true
            }
            HybridSet::SmallSet(small) => {
                // Full small set, switch to the dense representation.
                let mut large = BitVec::new_empty();
                for elem in small.iter() {
                    large.insert(*elem);
                }
                let changed = large.insert(elem);
                *self = HybridSet::LargeSet(large);
                changed
            }
            HybridSet::LargeSet(large) => large.insert(elem),
        }
    }

    pub fn remove(&mut self, elem: T) -> bool {
        // Large sets are never shrunk back into small ones.
        match self {
            HybridSet::SmallSet(small) => match small.iter().position(|x| *x == elem) {
                Some(pos) => {
                    small.swap_remove(pos);
                    true
                }
                None => false,
            },
            HybridSet::LargeSet(large) => large.remove(elem),
        }
    }

    pub fn iter(&self) -> HybridIter<'_, T> {
        match self {
            HybridSet::SmallSet(small) => HybridIter::SmallIter(small.iter()),
            HybridSet::LargeSet(large) => HybridIter::LargeIter(large.iter()),
        }
    }

    pub fn union(&mut self, other: &HybridSet<T>) -> bool {
        match (&mut *self, other) {
            (HybridSet::LargeSet(self_large), HybridSet::LargeSet(other_large)) => {
                self_large.union(other_large)
            }
            (HybridSet::LargeSet(self_large), HybridSet::SmallSet(other_small)) => {
                let mut changed = false;
                for elem in other_small.iter() {
                    changed |= self_large.insert(*elem);
                }
                changed
            }
            (HybridSet::SmallSet(self_small), HybridSet::LargeSet(other_large)) => {
                let mut large = BitVec::new_empty();
                for elem in self_small.iter() {
                    large.insert(*elem);
                }
                let changed = large.union(other_large);
                *self = HybridSet::LargeSet(large);
                changed
            }
            (HybridSet::SmallSet(_), HybridSet::SmallSet(other_small)) => {
                let mut changed = false;
                for &elem in other_small.iter() {
                    changed |= self.insert(elem);
                }
                changed
            }
        }
    }

    pub fn subtract(&mut self, other: &HybridSet<T>) -> bool {
        match (self, other) {
            (HybridSet::LargeSet(self_large), HybridSet::LargeSet(other_large)) => {
                self_large.subtract(other_large)
            }
            (HybridSet::LargeSet(self_large), HybridSet::SmallSet(other_small)) => {
                let mut changed = false;
                for &elem in other_small.iter() {
                    changed |= self_large.remove(elem);
                }
                changed
            }
            (HybridSet::SmallSet(self_small), other) => {
                let before = self_small.len();
                self_small.retain(|&elem| !other.contains(elem));
                before != self_small.len()
            }
        }
    }
}

pub enum HybridIter<'a, T: Idx> {
    SmallIter(slice::Iter<'a, T>),
    LargeIter(BitIter<'a, T>),
}

impl<'a, T: Idx> Iterator for HybridIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self {
            HybridIter::SmallIter(small) => small.next().copied(),
            HybridIter::LargeIter(large) => large.next(),
        }
    }
}

#[cfg(test)]
mod test {
    use rand::Rng;
    use std::collections::HashSet;

    use super::{HybridPointsToSet, HybridSet, PointsToSet, SMALL_SET_CAPACITY};

    fn random_set(len: usize) -> HashSet<u32> {
        let mut rng = rand::thread_rng();
        let mut set = HashSet::new();
        while set.len() < len {
            set.insert(rng.gen_range(1..1000));
        }
        set
    }

    fn to_pts(set: &HashSet<u32>) -> HybridPointsToSet<u32> {
        set.iter().copied().collect()
    }

    #[test]
    fn small_set_test() {
        let rand_set = random_set(8);
        let mut small_set = to_pts(&rand_set);
        assert_eq!(small_set.count(), 8);
        assert!(matches!(small_set.points_to, HybridSet::SmallSet(_)));
        assert_eq!(small_set.iter().collect::<HashSet<_>>(), rand_set);

        let val = *rand_set.iter().next().unwrap();
        assert!(small_set.contains(val));
        assert!(small_set.remove(val));
        assert!(!small_set.contains(val));
        assert_eq!(small_set.count(), 7);
    }

    #[test]
    fn large_set_test() {
        let rand_set = random_set(SMALL_SET_CAPACITY + 3);
        let mut large_set = to_pts(&rand_set);
        assert_eq!(large_set.count(), SMALL_SET_CAPACITY + 3);
        assert!(matches!(large_set.points_to, HybridSet::LargeSet(_)));
        assert_eq!(large_set.iter().collect::<HashSet<_>>(), rand_set);

        let val = *rand_set.iter().next().unwrap();
        assert!(large_set.remove(val));
        assert!(!large_set.contains(val));
        assert_eq!(large_set.count(), SMALL_SET_CAPACITY + 2);
    }

    #[test]
    fn union_across_representations() {
        let rand_small = random_set(8);
        let rand_large = random_set(SMALL_SET_CAPACITY + 3);
        let expected: HashSet<u32> = rand_small.union(&rand_large).copied().collect();

        let mut small_first = to_pts(&rand_small);
        small_first.union(&to_pts(&rand_large));
        assert_eq!(small_first.iter().collect::<HashSet<_>>(), expected);
        assert!(small_first.superset(&to_pts(&rand_small)));
        assert!(small_first.superset(&to_pts(&rand_large)));

        let mut large_first = to_pts(&rand_large);
        large_first.union(&to_pts(&rand_small));
        assert_eq!(large_first, small_first);
    }

    #[test]
    fn union_diff_returns_only_new_elements() {
        let rand_old = random_set(SMALL_SET_CAPACITY + 3);
        let mut incoming = random_set(10);
        for &x in rand_old.iter().take(4) {
            incoming.insert(x);
        }
        let mut pts = to_pts(&rand_old);
        let diff = pts.union_diff(&to_pts(&incoming));
        assert_eq!(
            diff.iter().collect::<HashSet<_>>(),
            incoming.difference(&rand_old).copied().collect::<HashSet<_>>()
        );
        assert!(pts.union_diff(&to_pts(&incoming)).is_empty());
    }

    #[test]
    fn subtract_test() {
        let rand_small = random_set(8);
        let mut rand_large = random_set(SMALL_SET_CAPACITY + 3);
        for &x in rand_small.iter().take(5) {
            rand_large.insert(x);
        }

        let mut set = to_pts(&rand_small);
        assert!(set.subtract(&to_pts(&rand_large)));
        assert_eq!(
            set.iter().collect::<HashSet<_>>(),
            rand_small.difference(&rand_large).copied().collect::<HashSet<_>>()
        );

        let mut set = to_pts(&rand_large);
        assert!(set.subtract(&to_pts(&rand_small)));
        assert_eq!(
            set.iter().collect::<HashSet<_>>(),
            rand_large.difference(&rand_small).copied().collect::<HashSet<_>>()
        );
    }
}
