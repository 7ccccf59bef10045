use std::borrow::Borrow;
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Immutable one-to-many relation. Keys are unique and values form a set, so
/// inserting the same pair twice while building has no effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multimap<K, V> {
    inner: BTreeMap<K, BTreeSet<V>>,
}

impl<K: Ord, V: Ord> Multimap<K, V> {
    pub fn builder() -> MultimapBuilder<K, V> {
        MultimapBuilder::new()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&BTreeSet<V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.inner.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.inner.contains_key(key)
    }

    /// Number of keys, including keys mapped to an empty set.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn pair_count(&self) -> usize {
        self.inner.values().map(BTreeSet::len).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, K, BTreeSet<V>> {
        self.inner.iter()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key, value)))
    }
}

impl<K: Ord + Clone, V: Ord + Clone> Multimap<K, V> {
    /// Value-to-key relation. Keys with an empty value set have no counterpart.
    pub fn invert(&self) -> Multimap<V, K> {
        let mut builder = MultimapBuilder::new();
        for (key, value) in self.pairs() {
            builder.insert(value.clone(), key.clone());
        }
        builder.build()
    }

    /// Follows `self` and then `next`: for every key `k`, the result holds the
    /// union of `next[v]` over all `v` in `self[k]`. Every key of `self` is
    /// kept, even when nothing is reachable from it.
    pub fn compose<W: Ord + Clone>(&self, next: &Multimap<V, W>) -> Multimap<K, W> {
        let mut builder = MultimapBuilder::new();
        for (key, values) in self.iter() {
            builder.insert_key(key.clone());
            for value in values {
                if let Some(targets) = next.get(value) {
                    for target in targets {
                        builder.insert(key.clone(), target.clone());
                    }
                }
            }
        }
        builder.build()
    }

    pub fn entries(&self) -> Vec<MultimapEntry<K, V>> {
        self.inner
            .iter()
            .map(|(key, values)| MultimapEntry {
                key: key.clone(),
                values: values.iter().cloned().collect(),
            })
            .collect()
    }
}

impl<K: Ord, V: Ord> FromIterator<MultimapEntry<K, V>> for Multimap<K, V> {
    fn from_iter<I: IntoIterator<Item = MultimapEntry<K, V>>>(iter: I) -> Self {
        let mut builder = MultimapBuilder::new();
        for entry in iter {
            builder.extend(entry.key, entry.values);
        }
        builder.build()
    }
}

impl<'a, K, V> IntoIterator for &'a Multimap<K, V> {
    type Item = (&'a K, &'a BTreeSet<V>);
    type IntoIter = btree_map::Iter<'a, K, BTreeSet<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

/// Join of two relations sharing their key domain: `result[z]` is the union
/// of `by_key[x]` over every `x` with `z` in `linked[x]`.
pub fn join<X, Y, Z>(by_key: &Multimap<X, Y>, linked: &Multimap<X, Z>) -> Multimap<Z, Y>
where
    X: Ord + Clone,
    Y: Ord + Clone,
    Z: Ord + Clone,
{
    linked.invert().compose(by_key)
}

#[derive(Debug)]
pub struct MultimapBuilder<K, V> {
    inner: BTreeMap<K, BTreeSet<V>>,
}

impl<K: Ord, V: Ord> MultimapBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> &mut Self {
        self.inner.entry(key).or_default().insert(value);
        self
    }

    /// Registers a key with no values, keeping any values already present.
    pub fn insert_key(&mut self, key: K) -> &mut Self {
        self.inner.entry(key).or_default();
        self
    }

    pub fn extend<I: IntoIterator<Item = V>>(&mut self, key: K, values: I) -> &mut Self {
        self.inner.entry(key).or_default().extend(values);
        self
    }

    pub fn build(self) -> Multimap<K, V> {
        Multimap { inner: self.inner }
    }
}

impl<K: Ord, V: Ord> Default for MultimapBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted form of one multimap key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultimapEntry<K, V> {
    pub key: K,
    pub values: Vec<V>,
}

/// Persisted form of one single-valued map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry<K, V> {
    pub key: K,
    pub value: V,
}

pub fn map_entries<K: Clone, V: Clone>(map: &BTreeMap<K, V>) -> Vec<MapEntry<K, V>> {
    map.iter()
        .map(|(key, value)| MapEntry {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(pairs: &[(&str, &str)]) -> Multimap<String, String> {
        let mut builder = Multimap::builder();
        for (key, value) in pairs {
            builder.insert(key.to_string(), value.to_string());
        }
        builder.build()
    }

    #[test]
    fn duplicate_pairs_collapse() {
        let map = relation(&[("P1", "R1"), ("P1", "R1"), ("P1", "R2")]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.pair_count(), 2);
    }

    #[test]
    fn empty_key_survives_later_inserts_and_build() {
        let mut builder = Multimap::<String, String>::builder();
        builder.insert_key("P9".to_string());
        builder.insert("P1".to_string(), "R1".to_string());
        builder.insert_key("P1".to_string());
        let map = builder.build();

        assert!(map.get("P9").unwrap().is_empty());
        assert_eq!(map.get("P1").unwrap().len(), 1);
    }

    #[test]
    fn invert_swaps_pairs() {
        let map = relation(&[("G1", "P1"), ("G2", "P1"), ("G2", "P2")]);
        let inverted = map.invert();
        let genes: Vec<_> = inverted.get("P1").unwrap().iter().cloned().collect();
        assert_eq!(genes, vec!["G1".to_string(), "G2".to_string()]);
        assert_eq!(inverted.get("P2").unwrap().len(), 1);
    }

    #[test]
    fn join_unions_over_shared_keys() {
        let entity_reactions = relation(&[("E1", "R1"), ("E1", "R2"), ("E2", "R3")]);
        let entity_proteoforms = relation(&[("E1", "F1"), ("E2", "F1"), ("E2", "F2")]);

        let joined = join(&entity_reactions, &entity_proteoforms);

        let f1: Vec<_> = joined.get("F1").unwrap().iter().cloned().collect();
        assert_eq!(f1, vec!["R1", "R2", "R3"]);
        let f2: Vec<_> = joined.get("F2").unwrap().iter().cloned().collect();
        assert_eq!(f2, vec!["R3"]);
    }

    #[test]
    fn compose_keeps_unreachable_keys() {
        let first = relation(&[("F1", "E9")]);
        let second = relation(&[("E1", "R1")]);
        let composed = first.compose(&second);
        assert!(composed.get("F1").unwrap().is_empty());
    }

    #[test]
    fn entries_are_sorted() {
        let map = relation(&[("b", "2"), ("a", "3"), ("a", "1")]);
        let entries = map.entries();
        assert_eq!(entries[0].key, "a");
        assert_eq!(entries[0].values, vec!["1".to_string(), "3".to_string()]);
        assert_eq!(entries[1].key, "b");
        let restored: Multimap<String, String> = entries.into_iter().collect();
        assert_eq!(restored, map);
    }
}
