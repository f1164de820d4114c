#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

static SPLITS: AtomicU64 = AtomicU64::new(0);
static MERGES: AtomicU64 = AtomicU64::new(0);
static BORROWS: AtomicU64 = AtomicU64::new(0);
static EVICTIONS: AtomicU64 = AtomicU64::new(0);

pub(crate) fn record_split() {
    SPLITS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_merge() {
    MERGES.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_borrow() {
    BORROWS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_eviction() {
    EVICTIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn reset_debug_counters() {
    SPLITS.store(0, Ordering::Relaxed);
    MERGES.store(0, Ordering::Relaxed);
    BORROWS.store(0, Ordering::Relaxed);
    EVICTIONS.store(0, Ordering::Relaxed);
}

pub fn splits() -> u64 {
    SPLITS.load(Ordering::Relaxed)
}

pub fn merges() -> u64 {
    MERGES.load(Ordering::Relaxed)
}

pub fn borrows() -> u64 {
    BORROWS.load(Ordering::Relaxed)
}

pub fn evictions() -> u64 {
    EVICTIONS.load(Ordering::Relaxed)
}
