// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use super::points_to::PointsToSet;
use crate::util::bit_vec::Idx;

/// Points-to data that separates, for every key, the objects that have
/// already been propagated from the ones that were added since the last
/// propagation.
///
/// K  (Key):     "owning" pointer of a points-to set.
/// D  (Data):    elements in points-to sets.
/// DS (DataSet): the points-to set; a collection of Data.
pub struct DiffPTData<K, D, DS> {
    /// Points-to added since the key was last flushed.
    pub(crate) diff_pts_map: HashMap<K, DS>,
    /// Points-to already propagated.
    pub(crate) propa_pts_map: HashMap<K, DS>,

    marker: PhantomData<D>,
}

impl<K, D, DS> fmt::Debug for DiffPTData<K, D, DS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "DiffPTData".fmt(f)
    }
}

impl<K, D, DS> Default for DiffPTData<K, D, DS>
where
    K: Hash + Eq + Copy,
    D: Idx,
    DS: PointsToSet<D> + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, D, DS> DiffPTData<K, D, DS>
where
    K: Hash + Eq + Copy,
    D: Idx,
    DS: PointsToSet<D> + Clone,
{
    pub fn new() -> DiffPTData<K, D, DS> {
        DiffPTData {
            diff_pts_map: HashMap::new(),
            propa_pts_map: HashMap::new(),
            marker: PhantomData,
        }
    }

    /// Adds element to the points-to set associated with var.
    /// Returns false if elem is already in this set.
    #[inline]
    pub fn add_pts(&mut self, var: K, elem: D) -> bool {
        if let Some(propa) = self.propa_pts_map.get(&var) {
            if propa.contains(elem) {
                return false;
            }
        }
        self.diff_pts_map.entry(var).or_insert_with(DS::new).insert(elem)
    }

    /// Performs diff_pts(dst_var) = diff_pts(dst_var) U (src_ds - propa_pts(dst_var)).
    #[inline]
    pub fn union_pts_to(&mut self, dst_var: K, src_ds: &DS) -> bool {
        let mut new = src_ds.clone();
        if let Some(propa) = self.propa_pts_map.get(&dst_var) {
            new.subtract(propa);
        }
        if new.is_empty() {
            return false;
        }
        self.diff_pts_map.entry(dst_var).or_insert_with(DS::new).union(&new)
    }

    /// diff_pts(dst_var) = diff_pts(dst_var) U (pts(src_var) - propa_pts(dst_var)).
    pub fn union_pts(&mut self, dst_var: K, src_var: K) -> bool {
        if dst_var == src_var {
            return false;
        }
        let mut changed = false;
        if let Some(diff) = self.diff_pts_map.get(&src_var) {
            let src_ds = diff.clone();
            changed |= self.union_pts_to(dst_var, &src_ds);
        }
        if let Some(propa) = self.propa_pts_map.get(&src_var) {
            let src_ds = propa.clone();
            changed |= self.union_pts_to(dst_var, &src_ds);
        }
        changed
    }

    #[inline]
    pub fn get_diff_pts(&self, var: K) -> Option<&DS> {
        self.diff_pts_map.get(&var)
    }

    #[inline]
    pub fn get_propa_pts(&self, var: K) -> Option<&DS> {
        self.propa_pts_map.get(&var)
    }

    /// Sets all diff elems to propa elems.
    pub fn flush(&mut self, var: K) {
        if let Some(diff) = self.diff_pts_map.get_mut(&var) {
            self.propa_pts_map.entry(var).or_insert_with(DS::new).union(diff);
            diff.clear();
        }
    }

    /// Flushes `var` and hands back the elements that were pending, i.e.
    /// the delta that still has to be propagated to its successors.
    pub fn take_diff(&mut self, var: K) -> Option<DS> {
        let diff = self.diff_pts_map.remove(&var)?;
        if diff.is_empty() {
            return None;
        }
        self.propa_pts_map.entry(var).or_insert_with(DS::new).union(&diff);
        Some(diff)
    }

    /// Iterates over every key with its propagated points-to set.
    pub fn propa_iter(&self) -> impl Iterator<Item = (&K, &DS)> {
        self.propa_pts_map.iter()
    }

    /// Returns true if no key holds unpropagated elements.
    pub fn is_flushed(&self) -> bool {
        self.diff_pts_map.values().all(|diff| diff.is_empty())
    }
}

#[cfg(test)]
mod test {
    use super::DiffPTData;
    use crate::pts_set::points_to::{HybridPointsToSet, PointsToSet};

    type Data = DiffPTData<u32, u32, HybridPointsToSet<u32>>;

    #[test]
    fn diff_is_separated_from_propagated() {
        let mut pt_data = Data::new();
        assert!(pt_data.add_pts(1, 10));
        assert!(pt_data.add_pts(1, 11));
        assert!(!pt_data.add_pts(1, 10));

        let diff = pt_data.take_diff(1).unwrap();
        assert_eq!(diff.count(), 2);
        assert!(pt_data.take_diff(1).is_none());
        assert_eq!(pt_data.get_propa_pts(1).unwrap().count(), 2);

        // Elements that were already propagated never reappear as diff.
        let incoming: HybridPointsToSet<u32> = [10, 12].into_iter().collect();
        assert!(pt_data.union_pts_to(1, &incoming));
        let diff = pt_data.take_diff(1).unwrap();
        assert_eq!(diff.iter().collect::<Vec<_>>(), vec![12]);
        assert!(!pt_data.union_pts_to(1, &incoming));
    }

    #[test]
    fn union_between_keys() {
        let mut pt_data = Data::new();
        pt_data.add_pts(1, 3);
        pt_data.flush(1);
        pt_data.add_pts(1, 4);
        assert!(pt_data.union_pts(2, 1));
        assert_eq!(pt_data.get_diff_pts(2).unwrap().count(), 2);
        assert!(!pt_data.union_pts(1, 1));
        assert!(!pt_data.is_flushed());
        pt_data.flush(1);
        pt_data.flush(2);
        assert!(pt_data.is_flushed());
    }
}
