// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{HashSet, VecDeque};

use super::cs_manager::{CSCallSiteId, CSMethodId, PointerId};
use crate::ir::call_site::CallKind;

/// A call edge discovered by the solver or injected by a plugin.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallEdge {
    pub kind: CallKind,
    pub callsite: CSCallSiteId,
    pub callee: CSMethodId,
}

impl CallEdge {
    pub fn new(kind: CallKind, callsite: CSCallSiteId, callee: CSMethodId) -> Self {
        CallEdge { kind, callsite, callee }
    }
}

/// Pending work of the solver. Objects newly added to a pointer are kept
/// as the pointer's diff in the points-to data; the list only records
/// which pointers have a pending diff.
#[derive(Debug, Default)]
pub struct WorkList {
    pointers: VecDeque<PointerId>,
    queued: HashSet<PointerId>,
    call_edges: VecDeque<CallEdge>,
}

impl WorkList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `pointer` gained objects. A pointer is queued at most
    /// once until it is polled.
    pub fn add_pointer_entry(&mut self, pointer: PointerId) {
        if self.queued.insert(pointer) {
            self.pointers.push_back(pointer);
        }
    }

    pub fn add_call_edge(&mut self, edge: CallEdge) {
        self.call_edges.push_back(edge);
    }

    pub fn poll_pointer_entry(&mut self) -> Option<PointerId> {
        let pointer = self.pointers.pop_front()?;
        self.queued.remove(&pointer);
        Some(pointer)
    }

    pub fn poll_call_edge(&mut self) -> Option<CallEdge> {
        self.call_edges.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty() && self.call_edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pointers.len() + self.call_edges.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::bit_vec::Idx;

    #[test]
    fn pointer_entries_are_merged() {
        let mut wl = WorkList::new();
        let (p, q) = (PointerId::new(0), PointerId::new(1));
        wl.add_pointer_entry(p);
        wl.add_pointer_entry(q);
        wl.add_pointer_entry(p);
        assert_eq!(wl.len(), 2);
        assert_eq!(wl.poll_pointer_entry(), Some(p));
        wl.add_pointer_entry(p);
        assert_eq!(wl.poll_pointer_entry(), Some(q));
        assert_eq!(wl.poll_pointer_entry(), Some(p));
        assert!(wl.is_empty());

        let edge = CallEdge::new(CallKind::Static, CSCallSiteId::new(0), CSMethodId::new(1));
        wl.add_call_edge(edge);
        assert!(!wl.is_empty());
        assert_eq!(wl.poll_call_edge(), Some(edge));
        assert_eq!(wl.poll_call_edge(), None);
    }
}
