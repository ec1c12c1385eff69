// Constraint weights supplied from outside the constraint definitions.

use std::collections::BTreeMap;

use bavet_core::Score;

// Replacement weights keyed by full constraint name (`package/name`).
//
// Consulted once, when a definition is built. Names that match no
// constraint are reported and otherwise ignored.
#[derive(Debug, Clone, Default)]
pub struct ConstraintWeightOverrides<Sc: Score> {
    weights: BTreeMap<String, Sc>,
}

impl<Sc: Score> ConstraintWeightOverrides<Sc> {
    pub fn new() -> Self {
        Self {
            weights: BTreeMap::new(),
        }
    }

    pub fn put(&mut self, name: impl Into<String>, weight: Sc) {
        self.weights.insert(name.into(), weight);
    }

    pub fn remove(&mut self, name: &str) -> Option<Sc> {
        self.weights.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Sc> {
        self.weights.get(name).copied()
    }

    // The override for `name`, or `declared` when there is none.
    pub fn weight_or(&self, name: &str, declared: Sc) -> Sc {
        self.get(name).unwrap_or(declared)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl<Sc: Score, N: Into<String>> FromIterator<(N, Sc)> for ConstraintWeightOverrides<Sc> {
    fn from_iter<I: IntoIterator<Item = (N, Sc)>>(pairs: I) -> Self {
        let mut overrides = Self::new();
        overrides.extend(pairs);
        overrides
    }
}

// Later entries replace earlier ones.
impl<Sc: Score, N: Into<String>> Extend<(N, Sc)> for ConstraintWeightOverrides<Sc> {
    fn extend<I: IntoIterator<Item = (N, Sc)>>(&mut self, pairs: I) {
        for (name, weight) in pairs {
            self.put(name, weight);
        }
    }
}

impl<Sc: Score> IntoIterator for ConstraintWeightOverrides<Sc> {
    type Item = (String, Sc);
    type IntoIter = std::collections::btree_map::IntoIter<String, Sc>;

    fn into_iter(self) -> Self::IntoIter {
        self.weights.into_iter()
    }
}
