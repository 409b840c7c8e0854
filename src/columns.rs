//! Column identity model.
//!
//! Every column flowing through the optimizer is identified by a [`ColId`]
//! issued by a session-scoped [`ColumnFactory`]. Identity is by id only, so
//! two sides of a self join get distinct columns even though their names
//! collide.

use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Session-lifetime unique column identity.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ColId(pub u32);

impl Debug for ColId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Display for ColId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named column reference.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct ColumnRef {
    id: ColId,
    name: Arc<str>,
}

impl ColumnRef {
    pub fn id(&self) -> ColId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Debug for ColumnRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:?}", self.name, self.id)
    }
}

/// Issues unique column ids for one optimization session.
///
/// Passed explicitly through the context rather than living in a global so
/// that concurrent sessions and tests stay independent.
#[derive(Default)]
pub struct ColumnFactory {
    next_id: AtomicU32,
}

impl ColumnFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_column(&self, name: impl Into<Arc<str>>) -> ColumnRef {
        let id = ColId(self.next_id.fetch_add(1, Ordering::Relaxed));
        ColumnRef {
            id,
            name: name.into(),
        }
    }
}

/// A set of column identities with the usual set algebra.
///
/// Backed by a `BTreeSet` so debug output and iteration order are
/// deterministic.
#[derive(Clone, Default, Hash, Eq, PartialEq)]
pub struct ColumnRefSet {
    cols: BTreeSet<ColId>,
}

impl ColumnRefSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, col: ColId) -> bool {
        self.cols.insert(col)
    }

    pub fn contains(&self, col: ColId) -> bool {
        self.cols.contains(&col)
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn union_with(&mut self, other: &ColumnRefSet) {
        self.cols.extend(other.cols.iter().copied());
    }

    pub fn intersect(&self, other: &ColumnRefSet) -> ColumnRefSet {
        ColumnRefSet {
            cols: self.cols.intersection(&other.cols).copied().collect(),
        }
    }

    pub fn difference(&self, other: &ColumnRefSet) -> ColumnRefSet {
        ColumnRefSet {
            cols: self.cols.difference(&other.cols).copied().collect(),
        }
    }

    pub fn is_subset_of(&self, other: &ColumnRefSet) -> bool {
        self.cols.is_subset(&other.cols)
    }

    pub fn iter(&self) -> impl Iterator<Item = ColId> + '_ {
        self.cols.iter().copied()
    }
}

impl FromIterator<ColId> for ColumnRefSet {
    fn from_iter<T: IntoIterator<Item = ColId>>(iter: T) -> Self {
        ColumnRefSet {
            cols: iter.into_iter().collect(),
        }
    }
}

impl Debug for ColumnRefSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.cols.iter()).finish()
    }
}

/// Disjoint equivalence classes of columns, grown from equality predicates.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct ColumnEquivalences {
    classes: Vec<ColumnRefSet>,
}

impl ColumnEquivalences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another set of classes into this one, merging overlapping
    /// classes transitively.
    pub fn merge(&mut self, other: &ColumnEquivalences) {
        for class in &other.classes {
            let mut cols = class.iter();
            if let Some(first) = cols.next() {
                for col in cols {
                    self.add_equality(first, col);
                }
            }
        }
    }

    /// Record `a = b`, merging any classes the two columns already belong to.
    pub fn add_equality(&mut self, a: ColId, b: ColId) {
        let mut merged = ColumnRefSet::new();
        merged.insert(a);
        merged.insert(b);

        let (touching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.classes)
            .into_iter()
            .partition(|class| class.contains(a) || class.contains(b));
        for class in touching {
            merged.union_with(&class);
        }

        self.classes = rest;
        self.classes.push(merged);
    }

    /// Columns known equivalent to `col`, including itself.
    pub fn class_of(&self, col: ColId) -> ColumnRefSet {
        self.classes
            .iter()
            .find(|class| class.contains(col))
            .cloned()
            .unwrap_or_else(|| {
                let mut singleton = ColumnRefSet::new();
                singleton.insert(col);
                singleton
            })
    }

    pub fn are_equivalent(&self, a: ColId, b: ColId) -> bool {
        a == b || self.classes.iter().any(|c| c.contains(a) && c.contains(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(ids: &[u32]) -> ColumnRefSet {
        ids.iter().map(|id| ColId(*id)).collect()
    }

    #[test]
    fn test_factory_issues_unique_ids() {
        let factory = ColumnFactory::new();
        let c1 = factory.new_column("c");
        let c2 = factory.new_column("c");
        assert_ne!(c1.id(), c2.id());
        assert_eq!(c1.name(), c2.name());
    }

    #[test]
    fn test_set_algebra() {
        let a = cols(&[1, 2, 3]);
        let b = cols(&[2, 3, 4]);

        assert_eq!(a.intersect(&b), cols(&[2, 3]));
        assert_eq!(a.difference(&b), cols(&[1]));
        assert!(cols(&[2, 3]).is_subset_of(&a));
        assert!(!b.is_subset_of(&a));

        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u, cols(&[1, 2, 3, 4]));
    }

    #[test]
    fn test_equivalence_classes_merge_transitively() {
        let mut eq = ColumnEquivalences::new();
        eq.add_equality(ColId(1), ColId(2));
        eq.add_equality(ColId(3), ColId(4));
        assert!(!eq.are_equivalent(ColId(1), ColId(3)));

        eq.add_equality(ColId(2), ColId(3));
        assert!(eq.are_equivalent(ColId(1), ColId(4)));
        assert_eq!(eq.class_of(ColId(4)), cols(&[1, 2, 3, 4]));
    }

    #[test]
    fn test_merge_bridges_classes() {
        let mut left = ColumnEquivalences::new();
        left.add_equality(ColId(1), ColId(2));
        let mut right = ColumnEquivalences::new();
        right.add_equality(ColId(2), ColId(3));
        right.add_equality(ColId(4), ColId(5));

        left.merge(&right);
        assert!(left.are_equivalent(ColId(1), ColId(3)));
        assert!(left.are_equivalent(ColId(4), ColId(5)));
        assert!(!left.are_equivalent(ColId(1), ColId(4)));
    }
}
