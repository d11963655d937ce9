use std::ops::Index;

use serde::{Deserialize, Serialize};

/// An ordered sequence of optionally named elements.
///
/// With every element named it behaves as an ordered mapping, with none named as a tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Struct<T> {
    elements: Vec<(Option<String>, T)>,
}

impl<T> Default for Struct<T> {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
        }
    }
}

impl<T> Struct<T> {
    /// Creates a new `Struct` from raw `(name, value)` pairs.
    pub fn new<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = (Option<String>, T)>,
    {
        Self {
            elements: elements.into_iter().collect(),
        }
    }

    /// Creates a `Struct` where every element is named.
    pub fn named<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
    {
        Self::new(
            elements
                .into_iter()
                .map(|(name, value)| (Some(name.into()), value)),
        )
    }

    /// Creates a `Struct` where no element is named.
    pub fn unnamed<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::new(elements.into_iter().map(|value| (None, value)))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterates the `(name, value)` pairs in declaration order.
    pub fn iter_elements(&self) -> impl Iterator<Item = (Option<&str>, &T)> {
        self.elements
            .iter()
            .map(|(name, value)| (name.as_deref(), value))
    }

    /// Iterates the values in declaration order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.elements.iter().map(|(_, value)| value)
    }

    /// Iterates the values mutably in declaration order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.elements.iter_mut().map(|(_, value)| value)
    }

    /// Iterates the names of the named elements in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|(name, _)| name.as_deref())
    }

    /// Whether any element carries a name.
    pub fn has_names(&self) -> bool {
        self.elements.iter().any(|(name, _)| name.is_some())
    }

    /// Looks an element up by name.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.elements
            .iter()
            .find(|(n, _)| n.as_deref() == Some(name))
            .map(|(_, value)| value)
    }

    /// Looks an element up by position.
    pub fn get_index(&self, idx: usize) -> Option<&T> {
        self.elements.get(idx).map(|(_, value)| value)
    }

    /// Builds a new `Struct` with the same names and the mapped values.
    pub fn map<U, F>(&self, mut f: F) -> Struct<U>
    where
        F: FnMut(&T) -> U,
    {
        Struct::new(
            self.elements
                .iter()
                .map(|(name, value)| (name.clone(), f(value))),
        )
    }

    /// Fallible version of `map`, stops on the first error.
    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<Struct<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        let elements = self
            .elements
            .iter()
            .map(|(name, value)| Ok((name.clone(), f(value)?)))
            .collect::<Result<Vec<_>, E>>()?;

        Ok(Struct { elements })
    }

    /// Consumes the `Struct` returning its `(name, value)` pairs in order.
    pub fn into_elements(self) -> Vec<(Option<String>, T)> {
        self.elements
    }

    /// Consumes the `Struct` returning its values in order.
    pub fn into_values(self) -> Vec<T> {
        self.elements.into_iter().map(|(_, value)| value).collect()
    }

    /// Whether both structures carry the same names in the same order.
    pub fn same_names<U>(&self, other: &Struct<U>) -> bool {
        self.len() == other.len()
            && self
                .elements
                .iter()
                .zip(&other.elements)
                .all(|((a, _), (b, _))| a == b)
    }
}

impl<T> Index<usize> for Struct<T> {
    type Output = T;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.elements[idx].1
    }
}

impl<T> FromIterator<(String, T)> for Struct<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self::named(iter)
    }
}
