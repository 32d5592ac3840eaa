// src/spsc.rs
//
// Bounded single-producer/single-consumer ring. Exactly one thread may push
// and exactly one may pop; the type does not detect violations.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

#[repr(align(64))]
struct Align64<T>(T);

pub struct SpscRing<T> {
    buf: Vec<UnsafeCell<MaybeUninit<T>>>,
    mask: usize,
    head: Align64<AtomicUsize>,
    tail: Align64<AtomicUsize>,
}

unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// `capacity` is rounded up to a power of two; one slot stays unused to
    /// distinguish full from empty, so the effective capacity is N-1.
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.next_power_of_two().max(2);
        let mut v = Vec::with_capacity(cap);
        for _ in 0..cap {
            v.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Self {
            buf: v,
            mask: cap - 1,
            head: Align64(AtomicUsize::new(0)),
            tail: Align64(AtomicUsize::new(0)),
        }
    }

    /// Never blocks; hands the value back when the ring is full.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= self.mask {
            return Err(value);
        }
        let idx = head & self.mask;
        unsafe { (*self.buf[idx].get()).write(value) };
        self.head.0.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Never blocks; None when empty.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let tail = self.tail.0.load(Ordering::Relaxed);
        let head = self.head.0.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let idx = tail & self.mask;
        let v = unsafe { (*self.buf[idx].get()).assume_init_read() };
        self.tail.0.store(tail.wrapping_add(1), Ordering::Release);
        Some(v)
    }

    /// Best-effort occupancy; racing threads may see a stale count, but it
    /// never exceeds N-1.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Relaxed);
        head.wrapping_sub(tail)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}
