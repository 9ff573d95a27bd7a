use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;

use crate::metrics::Metrics;
use crate::store::entry::Entry;

/// The budget cannot hold the value even with every other entry evicted.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("out of memory")]
pub struct OutOfMemory;

/// Insertion-ordered key/value table behind one exclusive lock.
///
/// Order is FIFO by insertion: re-setting a key moves it to the newest slot,
/// GET moves nothing. `bytes_used` counts value bytes only; keys, flags and
/// map overhead are not part of the budget, so this is not a true memory cap.
pub struct Cache {
    inner: Mutex<Inner>,
    metrics: Arc<Metrics>,
}

struct Inner {
    map: HashMap<Bytes, Entry>,
    /// Insertion order, oldest first: seq -> key.
    order: BTreeMap<u64, Bytes>,
    next_seq: u64,
    bytes_used: u64,
    limit: Option<u64>,
}

impl Cache {
    /// `limit` is the value-byte budget; 0 disables eviction entirely.
    pub fn new(limit: u64, metrics: Arc<Metrics>) -> Cache {
        tracing::debug!("created cache with limit={}", limit);
        Cache {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
                bytes_used: 0,
                limit: (limit > 0).then_some(limit),
            }),
            metrics,
        }
    }

    /// Snapshot lookup. The returned value bytes are refcounted, so the lock
    /// is already released while the response is written.
    pub fn get(&self, key: &[u8]) -> Option<(u32, Bytes)> {
        let inner = self.inner.lock();
        inner.map.get(key).map(|e| (e.flags, e.value.clone()))
    }

    /// Insert or replace `key`. A replaced entry gives its bytes and its
    /// ordering slot back first; then, under a limit, oldest entries are
    /// evicted until the new value fits. Evictions performed before a failed
    /// insert stay evicted.
    pub fn put(&self, key: Bytes, flags: u32, value: Bytes) -> Result<(), OutOfMemory> {
        let mut inner = self.inner.lock();

        if let Some(old) = inner.map.remove(&key) {
            tracing::debug!(
                "key exists, releasing {} bytes before re-insert",
                old.value.len()
            );
            inner.bytes_used -= old.value.len() as u64;
            inner.order.remove(&old.seq);
        }

        let new_size = value.len() as u64;
        if let Some(limit) = inner.limit {
            while inner.bytes_used + new_size > limit && !inner.map.is_empty() {
                let Some((_, oldest)) = inner.order.pop_first() else {
                    break;
                };
                if let Some(evicted) = inner.map.remove(&oldest) {
                    inner.bytes_used -= evicted.value.len() as u64;
                    self.metrics.inc_evictions(1);
                    tracing::debug!(
                        "removed oldest entry of size {}, new size {}",
                        evicted.value.len(),
                        inner.bytes_used
                    );
                }
            }
            if inner.bytes_used + new_size > limit {
                tracing::debug!(
                    "reached size limit {}+{} > {}",
                    inner.bytes_used,
                    new_size,
                    limit
                );
                return Err(OutOfMemory);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.map.insert(key, Entry { flags, value, seq });
        inner.bytes_used += new_size;
        Ok(())
    }

    /// Total value bytes currently held.
    pub fn bytes_used(&self) -> u64 {
        self.inner.lock().bytes_used
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(limit: u64) -> Cache {
        Cache::new(limit, Arc::new(Metrics::default()))
    }

    fn put(c: &Cache, key: &'static [u8], value: &'static [u8]) -> Result<(), OutOfMemory> {
        c.put(Bytes::from_static(key), 0, Bytes::from_static(value))
    }

    fn value(c: &Cache, key: &[u8]) -> Option<Bytes> {
        c.get(key).map(|(_, v)| v)
    }

    #[test]
    fn put_then_get_returns_flags_and_value() {
        let c = cache(0);
        c.put(
            Bytes::from_static(b"foo"),
            0xDEAD_BEEF,
            Bytes::from_static(b"bar"),
        )
        .unwrap();
        assert_eq!(
            c.get(b"foo"),
            Some((0xDEAD_BEEF, Bytes::from_static(b"bar")))
        );
        assert_eq!(c.get(b"absent"), None);
    }

    #[test]
    fn replacement_releases_bytes() {
        let c = cache(10);
        put(&c, b"a", b"xxxxx").unwrap();
        assert_eq!(c.bytes_used(), 5);
        put(&c, b"a", b"yy").unwrap();
        assert_eq!(c.bytes_used(), 2);
        assert_eq!(value(&c, b"a").unwrap(), Bytes::from_static(b"yy"));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn eviction_is_fifo_by_insertion() {
        let c = cache(6);
        put(&c, b"a", b"111").unwrap();
        put(&c, b"b", b"222").unwrap();
        assert_eq!(c.bytes_used(), 6);
        put(&c, b"c", b"33").unwrap();
        assert_eq!(c.get(b"a"), None);
        assert_eq!(value(&c, b"b").unwrap(), Bytes::from_static(b"222"));
        assert_eq!(value(&c, b"c").unwrap(), Bytes::from_static(b"33"));
        assert_eq!(c.bytes_used(), 5);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn get_does_not_promote() {
        let c = cache(6);
        put(&c, b"a", b"111").unwrap();
        put(&c, b"b", b"222").unwrap();
        c.get(b"a");
        assert_eq!(c.bytes_used(), 6);
        put(&c, b"c", b"3").unwrap();
        // a is still the oldest in spite of the read
        assert_eq!(c.get(b"a"), None);
        assert!(c.get(b"b").is_some());
    }

    #[test]
    fn reinsert_moves_key_to_newest() {
        let c = cache(6);
        put(&c, b"a", b"11").unwrap();
        put(&c, b"b", b"22").unwrap();
        put(&c, b"a", b"11").unwrap();
        put(&c, b"c", b"333").unwrap();
        // b was oldest after a's re-insert
        assert_eq!(c.get(b"b"), None);
        assert!(c.get(b"a").is_some());
        assert!(c.get(b"c").is_some());
    }

    #[test]
    fn single_value_over_budget_fails_and_store_stays_empty() {
        let c = cache(4);
        assert_eq!(put(&c, b"k", b"hello"), Err(OutOfMemory));
        assert!(c.is_empty());
        assert_eq!(c.bytes_used(), 0);
        assert_eq!(c.get(b"k"), None);
    }

    #[test]
    fn failed_insert_keeps_prior_evictions() {
        let c = cache(5);
        put(&c, b"a", b"111").unwrap();
        assert_eq!(put(&c, b"big", b"xxxxxxxxxx"), Err(OutOfMemory));
        // a was evicted while making room and is not restored
        assert_eq!(c.get(b"a"), None);
        assert_eq!(c.len(), 0);
        assert_eq!(c.bytes_used(), 0);
    }

    #[test]
    fn zero_limit_never_evicts() {
        let c = cache(0);
        for i in 0..100u32 {
            c.put(
                Bytes::copy_from_slice(format!("key{i}").as_bytes()),
                i,
                Bytes::from_static(b"0123456789"),
            )
            .unwrap();
        }
        assert_eq!(c.len(), 100);
        assert_eq!(c.bytes_used(), 1000);
    }

    #[test]
    fn bytes_used_matches_sum_of_values() {
        let c = cache(100);
        put(&c, b"a", b"12345").unwrap();
        put(&c, b"b", b"123").unwrap();
        put(&c, b"a", b"1").unwrap();
        let expected = value(&c, b"a").unwrap().len() + value(&c, b"b").unwrap().len();
        assert_eq!(c.bytes_used(), expected as u64);
    }
}
