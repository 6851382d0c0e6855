// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ordered map holding multiple values per key

use std::borrow::Borrow;

/// A map from keys to lists of values. Keys keep the order in which they were first inserted,
/// values keep the order within their key.
///
/// This is meant for small collections like query parameters or request headers, lookups are
/// linear.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkedMultiValueMap<K, V> {
    entries: Vec<(K, Vec<V>)>,
}

impl<K, V> Default for LinkedMultiValueMap<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: PartialEq, V> LinkedMultiValueMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty map with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.entries
            .iter()
            .position(|(existing, _)| <K as Borrow<Q>>::borrow(existing) == key)
    }

    fn values_for(&mut self, key: K) -> &mut Vec<V> {
        let index = match self.position(&key) {
            Some(index) => index,
            None => {
                self.entries.push((key, Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    /// Appends a value to the list of values for the key.
    pub fn add(&mut self, key: K, value: V) {
        self.values_for(key).push(value);
    }

    /// Appends all values to the list of values for the key. The key is added even if there are
    /// no values.
    pub fn add_all(&mut self, key: K, values: impl IntoIterator<Item = V>) {
        self.values_for(key).extend(values);
    }

    /// Replaces all values for the key by a single value. A new key is added at the end.
    pub fn set(&mut self, key: K, value: V) {
        self.put(key, vec![value]);
    }

    /// Replaces the list of values for the key, returning the previous list if any.
    pub fn put(&mut self, key: K, values: Vec<V>) -> Option<Vec<V>> {
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, values)),
            None => {
                self.entries.push((key, values));
                None
            }
        }
    }

    /// Returns all values for the key in insertion order.
    pub fn get<Q>(&self, key: &Q) -> Option<&[V]>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.position(key)
            .map(|index| self.entries[index].1.as_slice())
    }

    /// Returns the first value for the key.
    pub fn get_first<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.get(key).and_then(|values| values.first())
    }

    /// Checks whether the key is present, possibly with an empty list of values.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.position(key).is_some()
    }

    /// Removes the key, returning its values. Remaining keys keep their order.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<Vec<V>>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.position(key)
            .map(|index| self.entries.remove(index).1)
    }

    /// Removes all keys matching the predicate.
    pub fn retain(&mut self, mut predicate: impl FnMut(&K, &[V]) -> bool) {
        self.entries
            .retain(|(key, values)| predicate(key, values.as_slice()));
    }

    /// Number of keys in the map
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the map contains no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all keys.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over keys and their values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[V])> + '_ {
        self.entries
            .iter()
            .map(|(key, values)| (key, values.as_slice()))
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.iter().map(|(key, _)| key)
    }
}

impl<K: PartialEq, V> FromIterator<(K, V)> for LinkedMultiValueMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: PartialEq, V> Extend<(K, V)> for LinkedMultiValueMap<K, V> {
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

impl<K, V> IntoIterator for LinkedMultiValueMap<K, V> {
    type Item = (K, Vec<V>);
    type IntoIter = std::vec::IntoIter<(K, Vec<V>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
