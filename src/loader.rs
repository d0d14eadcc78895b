//! Loader chain (spec.md §4.7): an ordered list of backing loaders tried in
//! turn for whatever keys remain missing, with last-writer-wins semantics
//! when two loaders both claim the same key and an early exit once nothing
//! is left to find.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// A backing loader: given a batch of missing keys, returns whatever subset
/// it could find. Keys it omits remain missing for the next loader in the
/// chain.
pub type Loader<K, V, E> = Box<dyn Fn(&[K]) -> Result<HashMap<K, V>, E> + Send + Sync>;

pub struct LoaderChain<K, V, E> {
    loaders: Vec<Loader<K, V, E>>,
}

impl<K, V, E> Default for LoaderChain<K, V, E> {
    fn default() -> Self {
        LoaderChain { loaders: Vec::new() }
    }
}

impl<K, V, E> LoaderChain<K, V, E>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, loader: Loader<K, V, E>) {
        self.loaders.push(loader);
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Walks the chain in order for `keys`. Each loader only sees the keys
    /// still unresolved by its predecessors; a later loader that returns a
    /// key an earlier one already found overwrites it (last-writer-wins).
    /// Stops as soon as nothing remains missing, or the first loader error
    /// (in which case everything found so far is discarded).
    pub fn run(&self, keys: &[K]) -> Result<(HashMap<K, V>, Vec<K>), E> {
        let mut still_missing: HashSet<K> = keys.iter().cloned().collect();
        let mut found: HashMap<K, V> = HashMap::new();

        for loader in &self.loaders {
            if still_missing.is_empty() {
                break;
            }

            let pending: Vec<K> = still_missing.iter().cloned().collect();

            let result = match loader(&pending) {
                Ok(result) => result,
                Err(err) => return Err(err),
            };

            for (k, v) in result {
                still_missing.remove(&k);
                found.insert(k, v);
            }
        }

        let still_missing: Vec<K> = keys.iter().filter(|k| still_missing.contains(k)).cloned().collect();

        Ok((found, still_missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_chain_early_exit_when_first_loader_finds_everything() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let calls = std::sync::Arc::new(calls);

        let mut chain: LoaderChain<u32, u32, String> = LoaderChain::new();

        chain.push(Box::new(|keys: &[u32]| Ok(keys.iter().map(|&k| (k, k * 10)).collect())));

        let calls2 = calls.clone();
        chain.push(Box::new(move |_keys: &[u32]| {
            calls2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(HashMap::new())
        }));

        let (found, missing) = chain.run(&[1, 2, 3]).unwrap();

        assert_eq!(found.len(), 3);
        assert!(missing.is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn resolved_keys_are_not_reoffered_to_later_loaders() {
        let mut chain: LoaderChain<u32, u32, String> = LoaderChain::new();

        // loader 1 resolves key 1 only, leaving key 2 pending for loader 2.
        chain.push(Box::new(|keys: &[u32]| Ok(keys.iter().filter(|&&k| k == 1).map(|&k| (k, 1)).collect())));
        // loader 2 would answer for any key it's asked about, but key 1 was
        // already resolved and pruned from the pending set before this runs,
        // so it only ever sees key 2.
        chain.push(Box::new(|keys: &[u32]| Ok(keys.iter().map(|&k| (k, 42)).collect())));

        let (found, missing) = chain.run(&[1, 2]).unwrap();

        assert_eq!(found.get(&1), Some(&1));
        assert_eq!(found.get(&2), Some(&42));
        assert!(missing.is_empty());
    }

    #[test]
    fn s3_loader_error_discards_partial_results() {
        let mut chain: LoaderChain<u32, u32, String> = LoaderChain::new();

        chain.push(Box::new(|_keys: &[u32]| Ok(HashMap::from([(1, 1), (2, 2)]))));
        chain.push(Box::new(|_keys: &[u32]| Ok(HashMap::from([(2, 42), (3, 3)]))));
        chain.push(Box::new(|_keys: &[u32]| Err("boom".to_string())));

        let result = chain.run(&[1, 2, 3, 4]);
        assert_eq!(result, Err("boom".to_string()));
    }

    #[test]
    fn keys_no_loader_finds_remain_missing() {
        let mut chain: LoaderChain<u32, u32, String> = LoaderChain::new();
        chain.push(Box::new(|_keys: &[u32]| Ok(HashMap::new())));

        let (found, missing) = chain.run(&[1, 2]).unwrap();
        assert!(found.is_empty());
        assert_eq!(missing.len(), 2);
    }
}
