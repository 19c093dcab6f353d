//! Ordered sets of live values.

use std::collections::BTreeSet;
use std::fmt;

use deadwood_ir::Function;
use deadwood_ir::printer::value_label;
use deadwood_ir::refs::ValueRef;

/// A set of SSA values, ordered by value index so iteration and rendering
/// are deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LiveSet(BTreeSet<ValueRef>);

impl LiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, v: ValueRef) -> bool {
        self.0.contains(&v)
    }

    /// Returns `true` if the value was not already present.
    pub fn insert(&mut self, v: ValueRef) -> bool {
        self.0.insert(v)
    }

    pub fn remove(&mut self, v: ValueRef) -> bool {
        self.0.remove(&v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueRef> + '_ {
        self.0.iter().copied()
    }

    /// In-place union. Returns `true` if `self` grew.
    pub fn union_with(&mut self, other: &LiveSet) -> bool {
        let before = self.0.len();
        self.0.extend(other.0.iter().copied());
        self.0.len() != before
    }

    /// Values of `self` that are not in `other`.
    pub fn difference(&self, other: &LiveSet) -> LiveSet {
        LiveSet(self.0.difference(&other.0).copied().collect())
    }

    /// A copy of `self` without `v`.
    pub fn without(&self, v: ValueRef) -> LiveSet {
        let mut set = self.clone();
        set.remove(v);
        set
    }

    pub fn is_subset(&self, other: &LiveSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Render as `{%a, %b}` using the function's value names.
    pub fn display<'a>(&'a self, func: &'a Function) -> impl fmt::Display + 'a {
        DisplayLiveSet { set: self, func }
    }
}

impl FromIterator<ValueRef> for LiveSet {
    fn from_iter<I: IntoIterator<Item = ValueRef>>(iter: I) -> Self {
        LiveSet(iter.into_iter().collect())
    }
}

impl Extend<ValueRef> for LiveSet {
    fn extend<I: IntoIterator<Item = ValueRef>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

struct DisplayLiveSet<'a> {
    set: &'a LiveSet,
    func: &'a Function,
}

impl fmt::Display for DisplayLiveSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, v) in self.set.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&value_label(self.func, v))?;
        }
        f.write_str("}")
    }
}
