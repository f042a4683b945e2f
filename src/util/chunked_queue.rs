// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use arrayvec::ArrayVec;
use std::fmt::{Debug, Formatter, Result};
use std::marker::PhantomData;
use std::ptr::NonNull;

// The maximum number of elements a chunk can hold.
const CHUNK_CAP: usize = 60;

/// An append-only queue stored as a linked list of fixed-size chunks.
///
/// Elements are never moved once pushed, so a cursor created by
/// [`ChunkedQueue::iter_copied`] stays valid while the queue keeps growing and
/// picks up elements pushed after it was created. The solver relies on this to
/// walk newly reachable methods while processing them adds more.
pub struct ChunkedQueue<T> {
    head: NonNull<Chunk<T>>,
    tail: NonNull<Chunk<T>>,
    len: usize,
    marker: PhantomData<Box<Chunk<T>>>,
}

struct Chunk<T> {
    next: Option<NonNull<Chunk<T>>>,
    elems: ArrayVec<T, CHUNK_CAP>,
}

impl<T> Chunk<T> {
    fn alloc() -> NonNull<Chunk<T>> {
        let chunk = Box::new(Chunk {
            next: None,
            elems: ArrayVec::new(),
        });
        NonNull::from(Box::leak(chunk))
    }
}

impl<T> Drop for ChunkedQueue<T> {
    fn drop(&mut self) {
        let mut cursor = Some(self.head);
        while let Some(chunk) = cursor {
            // Every chunk was leaked from a `Box` in `Chunk::alloc` and is
            // owned exclusively by this queue.
            let chunk = unsafe { Box::from_raw(chunk.as_ptr()) };
            cursor = chunk.next;
        }
    }
}

impl<T> Default for ChunkedQueue<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChunkedQueue<T> {
    pub fn new() -> Self {
        let chunk = Chunk::alloc();
        ChunkedQueue {
            head: chunk,
            tail: chunk,
            len: 0,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends an element to the back of the queue.
    pub fn push(&mut self, elem: T) {
        unsafe {
            if (*self.tail.as_ptr()).elems.is_full() {
                let chunk = Chunk::alloc();
                (*self.tail.as_ptr()).next = Some(chunk);
                self.tail = chunk;
            }
            (*self.tail.as_ptr()).elems.push(elem);
        }
        self.len += 1;
    }
}

impl<T: Copy> ChunkedQueue<T> {
    /// Returns a cursor over the queue that also observes later pushes.
    #[inline]
    pub fn iter_copied(&self) -> IterCopied<T> {
        IterCopied {
            chunk: self.head,
            index: 0,
            marker: PhantomData,
        }
    }
}

impl<T: Copy + Debug> Debug for ChunkedQueue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_list().entries(self.iter_copied()).finish()
    }
}

/// Cursor over a growing queue of copyable elements.
///
/// The cursor must not outlive the queue it was created from.
#[derive(Copy, Clone)]
pub struct IterCopied<T> {
    chunk: NonNull<Chunk<T>>,
    index: usize,
    marker: PhantomData<T>,
}

impl<T: Copy> Iterator for IterCopied<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.index == CHUNK_CAP {
            match unsafe { (*self.chunk.as_ptr()).next } {
                Some(chunk) => {
                    self.chunk = chunk;
                    self.index = 0;
                }
                None => return None,
            }
        }
        let chunk = unsafe { &*self.chunk.as_ptr() };
        let elem = chunk.elems.get(self.index).copied();
        if elem.is_some() {
            self.index += 1;
        }
        elem
    }
}
