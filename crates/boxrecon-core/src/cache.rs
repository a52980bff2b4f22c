//! Memoization keyed by the exact input arguments
//!
//! Keys are SHA-256 digests of the arguments (table contents, credential
//! identity, date range, filters). Entries live until `clear` or drop.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Digest a list of arguments into a cache key
///
/// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn memo_key<I, P>(parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.as_ref();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
pub struct MemoCache<T> {
    entries: HashMap<String, T>,
    hits: usize,
    misses: usize,
}

impl<T> Default for MemoCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<T> MemoCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    /// Store a value computed elsewhere (e.g. by an async fetch)
    pub fn insert(&mut self, key: &str, value: T) {
        self.entries.insert(key.to_string(), value);
    }

    /// Return the cached value for `key`, computing and storing it on a miss
    ///
    /// A failed computation stores nothing.
    pub fn get_or_try_insert_with<F>(&mut self, key: &str, compute: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if self.entries.contains_key(key) {
            self.hits += 1;
        } else {
            self.misses += 1;
            let value = compute()?;
            self.entries.insert(key.to_string(), value);
        }
        Ok(&self.entries[key])
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_memo_key_is_length_prefixed() {
        assert_ne!(memo_key(["ab", "c"]), memo_key(["a", "bc"]));
        assert_eq!(memo_key(["a", "b"]), memo_key(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(memo_key(["a"]).len(), 64);
    }

    #[test]
    fn test_computes_once() {
        let mut cache = MemoCache::new();
        let key = memo_key(["manual.csv", "2024-03-01"]);
        let mut calls = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(&key, || {
                    calls += 1;
                    Ok(42)
                })
                .unwrap();
            assert_eq!(*value, 42);
        }

        assert_eq!(calls, 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_error_not_cached() {
        let mut cache: MemoCache<u32> = MemoCache::new();
        let result = cache.get_or_try_insert_with("k", || Err(Error::InvalidData("bad".into())));
        assert!(result.is_err());
        assert!(cache.is_empty());

        cache.get_or_try_insert_with("k", || Ok(1)).unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_insert_then_get() {
        let mut cache = MemoCache::new();
        let key = memo_key(["https://api.example.com|ops", "2024-03-01", "2024-03-31"]);
        cache.insert(&key, vec!["EV-1001"]);
        assert_eq!(cache.get(&key).map(|v| v.len()), Some(1));
        assert_eq!(cache.hits(), 0);
    }
}
