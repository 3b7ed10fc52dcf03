//! A dictionary that can hold multiple values per key.
//!
//! Submitted form data routinely repeats a key (`<select multiple>`,
//! several files under one input), so lookups distinguish between "the
//! value" (the last one submitted) and "all values". Keys iterate in the
//! order they were first submitted.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// An insertion-ordered map from keys to lists of values.
///
/// [`get`](MultiValueDict::get) returns the **last** value for a key, while
/// [`get_list`](MultiValueDict::get_list) returns all values in submission order.
///
/// # Examples
///
/// ```
/// use formbind_core::utils::MultiValueDict;
///
/// let mut d = MultiValueDict::new();
/// d.append("color".to_string(), "red");
/// d.append("size".to_string(), "m");
/// d.append("color".to_string(), "blue");
///
/// assert_eq!(d.get("color"), Some(&"blue"));
/// assert_eq!(d.get_list("color"), Some(&vec!["red", "blue"]));
/// assert_eq!(d.keys().collect::<Vec<_>>(), ["color", "size"]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MultiValueDict<K: Eq + Hash, V> {
    positions: HashMap<K, usize>,
    entries: Vec<(K, Vec<V>)>,
}

impl<K: Eq + Hash, V> Default for MultiValueDict<K, V> {
    fn default() -> Self {
        Self {
            positions: HashMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> MultiValueDict<K, V> {
    /// Creates an empty `MultiValueDict`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last value associated with the key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.get_list(key).and_then(|values| values.last())
    }

    /// Returns every value associated with the key.
    pub fn get_list<Q>(&self, key: &Q) -> Option<&Vec<V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.positions.get(key).map(|&at| &self.entries[at].1)
    }

    /// Sets the value for a key, replacing any existing values.
    pub fn set(&mut self, key: K, value: V) {
        self.set_list(key, vec![value]);
    }

    /// Replaces all values for a key. A new key goes to the end.
    pub fn set_list(&mut self, key: K, values: Vec<V>) {
        *self.slot(key) = values;
    }

    /// Appends a value to the list for the given key.
    pub fn append(&mut self, key: K, value: V) {
        self.slot(key).push(value);
    }

    /// Removes a key, returning its values.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<Vec<V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let at = self.positions.remove(key)?;
        let (_, values) = self.entries.remove(at);
        for position in self.positions.values_mut() {
            if *position > at {
                *position -= 1;
            }
        }
        Some(values)
    }

    /// Returns `true` if the dictionary contains the specified key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.positions.contains_key(key)
    }

    /// Returns an iterator over the keys in first-submitted order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over (key, value-list) pairs in first-submitted order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Vec<V>)> {
        self.entries.iter().map(|(key, values)| (key, values))
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the dictionary contains no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn slot(&mut self, key: K) -> &mut Vec<V> {
        let at = match self.positions.get(&key) {
            Some(&at) => at,
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[at].1
    }
}

impl<K: Eq + Hash + Clone, V> FromIterator<(K, V)> for MultiValueDict<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Self::new();
        dict.extend(iter);
        dict
    }
}

impl<K: Eq + Hash + Clone, V> Extend<(K, V)> for MultiValueDict<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.append(key, value);
        }
    }
}

impl<K: Eq + Hash, V> IntoIterator for MultiValueDict<K, V> {
    type Item = (K, Vec<V>);
    type IntoIter = std::vec::IntoIter<(K, Vec<V>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
