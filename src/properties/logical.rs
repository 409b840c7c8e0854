use crate::columns::{ColumnEquivalences, ColumnRefSet};

/// Properties shared by every expression of a group.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct LogicalProperty {
    /// Columns the group produces.
    output_columns: ColumnRefSet,
    /// Candidate keys, each a subset of the output columns.
    keys: Vec<ColumnRefSet>,
    /// Column equalities implied by predicates below this group.
    equivalences: ColumnEquivalences,
    /// Upper bound on output cardinality. Infinite when unknown.
    max_card: f64,
}

impl LogicalProperty {
    pub fn new(output_columns: ColumnRefSet, keys: Vec<ColumnRefSet>, max_card: f64) -> Self {
        Self {
            output_columns,
            keys,
            equivalences: ColumnEquivalences::new(),
            max_card,
        }
    }

    pub fn with_output(output_columns: ColumnRefSet) -> Self {
        Self {
            output_columns,
            keys: vec![],
            equivalences: ColumnEquivalences::new(),
            max_card: f64::INFINITY,
        }
    }

    pub fn with_equivalences(mut self, equivalences: ColumnEquivalences) -> Self {
        self.equivalences = equivalences;
        self
    }

    pub fn output_columns(&self) -> &ColumnRefSet {
        &self.output_columns
    }

    pub fn keys(&self) -> &[ColumnRefSet] {
        &self.keys
    }

    pub fn equivalences(&self) -> &ColumnEquivalences {
        &self.equivalences
    }

    pub fn max_card(&self) -> f64 {
        self.max_card
    }
}
