//! Fixed-capacity block ring shared between the planner and the step engine.
//!
//! Slots are addressed by index, never by pointer. Indices run over
//! `0..2N` so a full ring and an empty ring are distinguishable without a
//! spare slot. The ring is split once into a [`Producer`] (foreground,
//! owns the tail) and a [`Consumer`] (step timer, owns the head). Each
//! slot sits behind a critical-section mutex; every access is a short,
//! bounded critical section.

use core::cell::RefCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use critical_section::Mutex;

use crate::error::BufferError;

use super::block::Block;

/// Ring storage. Create once, then [`split`](BlockRing::split).
pub struct BlockRing<const AXES: usize, const N: usize> {
    slots: [Mutex<RefCell<Block<AXES>>>; N],
    head: AtomicUsize,
    tail: AtomicUsize,
}

impl<const AXES: usize, const N: usize> BlockRing<AXES, N> {
    const CAPACITY_OK: () = assert!(N >= 2, "planning needs at least two buffered blocks");

    /// Create an empty ring.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;
        Self {
            slots: core::array::from_fn(|_| Mutex::new(RefCell::new(Block::empty()))),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Split into the planner-side and engine-side handles.
    pub fn split(&mut self) -> (Producer<'_, AXES, N>, Consumer<'_, AXES, N>) {
        let ring: &Self = self;
        (Producer { ring }, Consumer { ring })
    }

    /// Ring capacity.
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    fn head(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }

    #[inline]
    fn tail(&self) -> usize {
        self.tail.load(Ordering::Acquire)
    }

    #[inline]
    fn count(&self) -> usize {
        (self.tail() + 2 * N - self.head()) % (2 * N)
    }

    /// Index after `index`.
    #[inline]
    pub const fn next_index(index: usize) -> usize {
        (index + 1) % (2 * N)
    }

    /// Index before `index`.
    #[inline]
    pub const fn prev_index(index: usize) -> usize {
        (index + 2 * N - 1) % (2 * N)
    }

    /// Storage slot of a ring index.
    #[inline]
    pub const fn slot(index: usize) -> usize {
        index % N
    }

    fn with<R>(&self, index: usize, f: impl FnOnce(&mut Block<AXES>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.slots[Self::slot(index)].borrow_ref_mut(cs)))
    }

    fn with_pair<R>(
        &self,
        first: usize,
        second: usize,
        f: impl FnOnce(&mut Block<AXES>, &mut Block<AXES>) -> R,
    ) -> R {
        debug_assert_ne!(Self::slot(first), Self::slot(second));
        critical_section::with(|cs| {
            let mut a = self.slots[Self::slot(first)].borrow_ref_mut(cs);
            let mut b = self.slots[Self::slot(second)].borrow_ref_mut(cs);
            f(&mut a, &mut b)
        })
    }
}

impl<const AXES: usize, const N: usize> Default for BlockRing<AXES, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Planner-side handle: pushes at the tail, edits resident blocks.
pub struct Producer<'a, const AXES: usize, const N: usize> {
    ring: &'a BlockRing<AXES, N>,
}

impl<'a, const AXES: usize, const N: usize> Producer<'a, AXES, N> {
    /// Append a block.
    ///
    /// # Errors
    ///
    /// Returns `BufferError::Full` and leaves every slot untouched when the
    /// ring is at capacity.
    pub fn push(&mut self, block: Block<AXES>) -> Result<(), BufferError> {
        if self.is_full() {
            return Err(BufferError::Full);
        }
        let tail = self.ring.tail();
        self.ring.with(tail, |slot| *slot = block);
        self.ring
            .tail
            .store(BlockRing::<AXES, N>::next_index(tail), Ordering::Release);
        Ok(())
    }

    /// Number of resident blocks.
    #[inline]
    pub fn count(&self) -> usize {
        self.ring.count()
    }

    /// Whether no block is resident.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Whether every slot is occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count() == N
    }

    /// Index of the head block (the one executing or next to execute).
    #[inline]
    pub fn head_index(&self) -> usize {
        self.ring.head()
    }

    /// Index one past the newest block.
    #[inline]
    pub fn tail_index(&self) -> usize {
        self.ring.tail()
    }

    /// Copy of the block at `index`.
    pub fn get(&self, index: usize) -> Block<AXES> {
        self.ring.with(index, |b| *b)
    }

    /// Edit the block at `index` inside one critical section.
    pub fn with<R>(&mut self, index: usize, f: impl FnOnce(&mut Block<AXES>) -> R) -> R {
        self.ring.with(index, f)
    }

    /// Edit two neighbouring blocks inside one critical section.
    pub fn with_pair<R>(
        &mut self,
        first: usize,
        second: usize,
        f: impl FnOnce(&mut Block<AXES>, &mut Block<AXES>) -> R,
    ) -> R {
        self.ring.with_pair(first, second, f)
    }

    /// Drop every resident block.
    ///
    /// Only valid while the engine holds no block; the controller
    /// guarantees this by flushing from the reset routine.
    pub fn flush(&mut self) {
        let head = self.ring.head();
        self.ring.tail.store(head, Ordering::Release);
    }
}

/// Engine-side handle: loads and retires the head block.
pub struct Consumer<'a, const AXES: usize, const N: usize> {
    ring: &'a BlockRing<AXES, N>,
}

impl<'a, const AXES: usize, const N: usize> Consumer<'a, AXES, N> {
    /// Copy of the head block.
    ///
    /// # Errors
    ///
    /// Returns `BufferError::Empty` when no block is resident.
    pub fn peek_head(&self) -> Result<Block<AXES>, BufferError> {
        if self.ring.count() == 0 {
            return Err(BufferError::Empty);
        }
        Ok(self.ring.with(self.ring.head(), |b| *b))
    }

    /// Mark the head block busy and return a copy of it.
    ///
    /// From here on the planner leaves its entry speed alone.
    pub fn start_head(&mut self) -> Result<Block<AXES>, BufferError> {
        if self.ring.count() == 0 {
            return Err(BufferError::Empty);
        }
        Ok(self.ring.with(self.ring.head(), |b| {
            b.exec.busy = true;
            *b
        }))
    }

    /// Edit the head block inside one critical section.
    pub fn with_head<R>(&mut self, f: impl FnOnce(&mut Block<AXES>) -> R) -> Result<R, BufferError> {
        if self.ring.count() == 0 {
            return Err(BufferError::Empty);
        }
        Ok(self.ring.with(self.ring.head(), f))
    }

    /// Mark the head block as fully executed. Its exit speed is final
    /// from here on.
    pub fn complete_head(&mut self) -> Result<(), BufferError> {
        self.with_head(|b| {
            b.exec.decelerating = true;
            b.exec.complete = true;
        })
    }

    /// Retire the head block.
    ///
    /// # Errors
    ///
    /// `Empty` when no block is resident, `NotComplete` when the head is
    /// still executing.
    pub fn pop_head(&mut self) -> Result<(), BufferError> {
        if !self.with_head(|b| b.exec.complete)? {
            return Err(BufferError::NotComplete);
        }
        let head = self.ring.head();
        self.ring
            .head
            .store(BlockRing::<AXES, N>::next_index(head), Ordering::Release);
        Ok(())
    }

    /// Number of resident blocks.
    #[inline]
    pub fn count(&self) -> usize {
        self.ring.count()
    }
}
