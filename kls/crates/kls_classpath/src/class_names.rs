use serde::{Deserialize, Serialize};
use std::collections::btree_set;
use std::collections::BTreeSet;

/// Deduplicated set of fully-qualified class names, iterated in ascending
/// lexical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassNameSet {
    names: BTreeSet<String>,
}

impl ClassNameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union of every set in `sets`. Order of the inputs does not matter.
    pub fn union<'a, I>(sets: I) -> Self
    where
        I: IntoIterator<Item = &'a ClassNameSet>,
    {
        let mut result = ClassNameSet::new();
        for set in sets {
            result.merge(set);
        }
        result
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn merge(&mut self, other: &ClassNameSet) {
        if self.names.is_empty() {
            self.names = other.names.clone();
            return;
        }
        self.names.extend(other.names.iter().cloned());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}

impl FromIterator<String> for ClassNameSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for ClassNameSet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        iter.into_iter().map(str::to_string).collect()
    }
}

impl Extend<String> for ClassNameSet {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.names.extend(iter);
    }
}

impl From<BTreeSet<String>> for ClassNameSet {
    fn from(names: BTreeSet<String>) -> Self {
        Self { names }
    }
}

impl IntoIterator for ClassNameSet {
    type Item = String;
    type IntoIter = btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter()
    }
}

impl<'a> IntoIterator for &'a ClassNameSet {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> ClassNameSet {
        names.iter().copied().collect()
    }

    #[test]
    fn union_is_commutative_and_deduplicating() {
        let a = set(&["com.lib.Helper", "java.lang.String"]);
        let b = set(&["java.lang.String", "MainActivity"]);

        let ab = ClassNameSet::union([&a, &b]);
        let ba = ClassNameSet::union([&b, &a]);

        assert_eq!(ab, ba);
        assert_eq!(
            ab.to_vec(),
            vec!["MainActivity", "com.lib.Helper", "java.lang.String"]
        );
    }

    #[test]
    fn union_with_itself_is_identity() {
        let a = set(&["b.B", "a.A"]);
        assert_eq!(ClassNameSet::union([&a, &a]), a);
    }

    #[test]
    fn union_of_nothing_is_empty() {
        assert!(ClassNameSet::union(std::iter::empty()).is_empty());
    }

    #[test]
    fn iteration_is_sorted() {
        let names = set(&["z.Z", "a.A", "m.M"]);
        let collected: Vec<&str> = names.iter().collect();
        assert_eq!(collected, vec!["a.A", "m.M", "z.Z"]);
    }
}
