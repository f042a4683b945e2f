// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};
use std::hash::Hash;
use std::rc::Rc;

use crate::util::bit_vec::Idx;

crate::index_type! {
    /// The unique identifier for each context.
    pub struct ContextId;
}

impl ContextId {
    /// The empty context, always interned first.
    pub const EMPTY: ContextId = ContextId(0);
}

pub trait ContextElement: Clone + Eq + PartialEq + Debug + Hash {}

/// A bounded sequence of context elements, most recent first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Context<E: ContextElement> {
    pub(crate) context_elems: Vec<E>,
}

impl<E: ContextElement> Debug for Context<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.context_elems.fmt(f)
    }
}

impl<E: ContextElement> Context<E> {
    pub fn new_empty() -> Rc<Self> {
        Rc::new(Context {
            context_elems: Vec::new(),
        })
    }

    pub fn new(context_elems: Vec<E>) -> Rc<Self> {
        Rc::new(Context { context_elems })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.context_elems.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.context_elems.is_empty()
    }

    pub fn elems(&self) -> &[E] {
        &self.context_elems
    }

    /// Compose a new context from a given context and a new context element.
    /// Discard the last old context element if the length of context exceeds the depth limit
    pub fn new_k_limited_context(old_ctx: &Context<E>, elem: E, k: usize) -> Rc<Self> {
        let mut elems = Vec::with_capacity(k);
        if k > 0 {
            elems.push(elem);
            if old_ctx.len() < k {
                elems.extend_from_slice(&old_ctx.context_elems[..])
            } else {
                elems.extend_from_slice(&old_ctx.context_elems[..k - 1])
            }
        }
        Rc::new(Context { context_elems: elems })
    }

    /// Keeps the `k` most recent elements of `ctx`.
    pub fn k_limited_context(ctx: &Rc<Context<E>>, k: usize) -> Rc<Self> {
        if ctx.len() <= k {
            ctx.clone()
        } else {
            let elems = ctx.context_elems[..k].to_vec();
            Rc::new(Context { context_elems: elems })
        }
    }

    pub fn first_context_element(&self) -> Option<&E> {
        self.context_elems.first()
    }
}

/// Interns contexts, handing out one id per distinct element sequence.
#[derive(Debug)]
pub struct ContextCache<E: ContextElement> {
    context_list: Vec<Rc<Context<E>>>,
    context_to_index_map: HashMap<Rc<Context<E>>, ContextId>,
}

impl<E: ContextElement> Default for ContextCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ContextElement> ContextCache<E> {
    pub fn new() -> ContextCache<E> {
        let mut cache = ContextCache {
            context_list: Vec::new(),
            context_to_index_map: HashMap::new(),
        };
        let empty = cache.get_context_id(&Context::new_empty());
        debug_assert_eq!(empty, ContextId::EMPTY);
        cache
    }

    /// Returns the id of the context, interning it on first sight.
    pub fn get_context_id(&mut self, context: &Rc<Context<E>>) -> ContextId {
        if let Some(id) = self.context_to_index_map.get(context) {
            *id
        } else {
            let id = ContextId::new(self.context_list.len());
            self.context_list.push(context.clone());
            self.context_to_index_map.insert(context.clone(), id);
            id
        }
    }

    /// Returns the context that was stored at this index, or None if the
    /// index is out of range.
    pub fn get_context(&self, id: ContextId) -> Option<Rc<Context<E>>> {
        self.context_list.get(id.index()).cloned()
    }

    pub fn len(&self) -> usize {
        self.context_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context_list.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    impl ContextElement for u32 {}

    #[test]
    fn k_limited_context_keeps_most_recent_elements() {
        let empty = Context::<u32>::new_empty();
        let c1 = Context::new_k_limited_context(&empty, 1, 2);
        let c2 = Context::new_k_limited_context(&c1, 2, 2);
        let c3 = Context::new_k_limited_context(&c2, 3, 2);
        assert_eq!(c2.elems(), &[2, 1]);
        assert_eq!(c3.elems(), &[3, 2]);
        assert_eq!(Context::k_limited_context(&c3, 1).elems(), &[3]);
        assert!(Context::new_k_limited_context(&c3, 4, 0).is_empty());
    }

    #[test]
    fn interning_is_idempotent() {
        let mut cache = ContextCache::<u32>::new();
        assert_eq!(cache.get_context_id(&Context::new_empty()), ContextId::EMPTY);
        let a = cache.get_context_id(&Context::new(vec![1, 2]));
        let b = cache.get_context_id(&Context::new(vec![1, 2]));
        let c = cache.get_context_id(&Context::new(vec![2, 1]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get_context(c).unwrap().elems(), &[2, 1]);
    }
}
