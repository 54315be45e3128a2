use serde::{Deserialize, Serialize};

use crate::math::tensor::Tensor;

/// Named tensors of a network, kept in layer construction order.
///
/// Keys are unique. Inserting an existing key replaces its tensor without
/// moving it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<NamedTensor>", into = "Vec<NamedTensor>")]
pub struct ParameterSet {
    entries: Vec<(String, Tensor)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        ParameterSet { entries: Vec::new() }
    }

    /// Inserts or replaces `key`, returning the previous tensor if any.
    pub fn insert(&mut self, key: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        let key = key.into();
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, tensor)),
            None => {
                self.entries.push((key, tensor));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Tensor> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Tensor> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(k, t)| (k.as_str(), t))
    }

    /// Total number of scalar values across all tensors.
    pub fn element_count(&self) -> usize {
        self.entries.iter().map(|(_, t)| t.len()).sum()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

impl IntoIterator for ParameterSet {
    type Item = (String, Tensor);
    type IntoIter = std::vec::IntoIter<(String, Tensor)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, Tensor)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (k, t) in iter {
            set.insert(k, t);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Serde: a list of named tensors, in construction order
// ---------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize)]
struct NamedTensor {
    key: String,
    #[serde(flatten)]
    tensor: Tensor,
}

impl From<ParameterSet> for Vec<NamedTensor> {
    fn from(set: ParameterSet) -> Self {
        set.entries.into_iter().map(|(key, tensor)| NamedTensor { key, tensor }).collect()
    }
}

impl TryFrom<Vec<NamedTensor>> for ParameterSet {
    type Error = String;

    fn try_from(list: Vec<NamedTensor>) -> Result<Self, Self::Error> {
        let mut set = ParameterSet::new();
        for NamedTensor { key, tensor } in list {
            if set.contains_key(&key) {
                return Err(format!("duplicate parameter key {key:?}"));
            }
            set.insert(key, tensor);
        }
        Ok(set)
    }
}
