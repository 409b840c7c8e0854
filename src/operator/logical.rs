use std::sync::Arc;

use enum_dispatch::enum_dispatch;

use crate::columns::{ColumnRef, ColumnRefSet};
use crate::error::{OptError, OptResult};
use crate::metadata::{MdAccessor, TableId};
use crate::operator::ScalarExprRef;
use crate::properties::LogicalProperty;
use crate::stats::Statistics;

/// Logical relational operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
#[enum_dispatch]
pub enum LogicalOperator {
    LogicalGet(Get),
    LogicalSelect(Select),
    LogicalProject(Project),
    LogicalInnerJoin(InnerJoin),
    LogicalUnionAll(UnionAll),
}

#[enum_dispatch(LogicalOperator)]
pub trait LogicalOperatorTrait {
    /// Derive group logical properties from the children's.
    fn derive_logical_prop(&self, inputs: &[LogicalProperty]) -> OptResult<LogicalProperty>;

    /// Derive group statistics from the children's.
    fn derive_stats(
        &self,
        inputs: &[Arc<Statistics>],
        mda: &dyn MdAccessor,
    ) -> OptResult<Statistics>;

    /// Number of children, `None` for variadic.
    fn arity(&self) -> Option<usize>;
}

fn input_at<'a, T>(inputs: &'a [T], idx: usize, op: &str) -> OptResult<&'a T> {
    inputs
        .get(idx)
        .ok_or_else(|| OptError::internal(format!("{} is missing input {}", op, idx)))
}

/// Base table access.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Get {
    table: TableId,
    columns: Vec<ColumnRef>,
}

impl Get {
    pub fn new(table: TableId, columns: Vec<ColumnRef>) -> Self {
        Self { table, columns }
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }
}

impl LogicalOperatorTrait for Get {
    fn derive_logical_prop(&self, _inputs: &[LogicalProperty]) -> OptResult<LogicalProperty> {
        let output = self.columns.iter().map(|c| c.id()).collect();
        Ok(LogicalProperty::with_output(output))
    }

    fn derive_stats(
        &self,
        _inputs: &[Arc<Statistics>],
        mda: &dyn MdAccessor,
    ) -> OptResult<Statistics> {
        let desc = mda.table_desc(self.table)?;
        Ok(Statistics::with_row_count(desc.row_count))
    }

    fn arity(&self) -> Option<usize> {
        Some(0)
    }
}

/// Row filter.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Select {
    predicate: ScalarExprRef,
}

impl Select {
    pub fn new(predicate: ScalarExprRef) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &ScalarExprRef {
        &self.predicate
    }
}

impl LogicalOperatorTrait for Select {
    fn derive_logical_prop(&self, inputs: &[LogicalProperty]) -> OptResult<LogicalProperty> {
        let input = input_at(inputs, 0, "select")?;
        if !self
            .predicate
            .used_columns()
            .is_subset_of(input.output_columns())
        {
            return Err(OptError::internal(
                "select predicate references columns its input does not produce",
            ));
        }
        let mut equivalences = input.equivalences().clone();
        for (a, b) in self.predicate.equi_join_keys() {
            equivalences.add_equality(a, b);
        }
        Ok(input.clone().with_equivalences(equivalences))
    }

    fn derive_stats(
        &self,
        inputs: &[Arc<Statistics>],
        _mda: &dyn MdAccessor,
    ) -> OptResult<Statistics> {
        let input = input_at(inputs, 0, "select")?;
        Ok(input.scaled(Statistics::DEFAULT_FILTER_SELECTIVITY))
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
}

/// Column projection.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Project {
    exprs: Vec<ScalarExprRef>,
}

impl Project {
    pub fn new(exprs: Vec<ScalarExprRef>) -> Self {
        Self { exprs }
    }

    pub fn exprs(&self) -> &[ScalarExprRef] {
        &self.exprs
    }

    fn output_columns(&self) -> ColumnRefSet {
        let mut cols = ColumnRefSet::new();
        for expr in &self.exprs {
            cols.union_with(&expr.used_columns());
        }
        cols
    }
}

impl LogicalOperatorTrait for Project {
    fn derive_logical_prop(&self, inputs: &[LogicalProperty]) -> OptResult<LogicalProperty> {
        let input = input_at(inputs, 0, "project")?;
        let output = self.output_columns();
        if !output.is_subset_of(input.output_columns()) {
            return Err(OptError::internal(
                "projection references columns its input does not produce",
            ));
        }
        Ok(LogicalProperty::new(output, vec![], input.max_card()))
    }

    fn derive_stats(
        &self,
        inputs: &[Arc<Statistics>],
        _mda: &dyn MdAccessor,
    ) -> OptResult<Statistics> {
        Ok(input_at(inputs, 0, "project")?.as_ref().clone())
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
}

/// Inner join with an arbitrary predicate.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct InnerJoin {
    predicate: ScalarExprRef,
}

impl InnerJoin {
    pub fn new(predicate: ScalarExprRef) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &ScalarExprRef {
        &self.predicate
    }
}

impl LogicalOperatorTrait for InnerJoin {
    fn derive_logical_prop(&self, inputs: &[LogicalProperty]) -> OptResult<LogicalProperty> {
        let left = input_at(inputs, 0, "inner join")?;
        let right = input_at(inputs, 1, "inner join")?;

        let mut output = left.output_columns().clone();
        output.union_with(right.output_columns());
        if !self.predicate.used_columns().is_subset_of(&output) {
            return Err(OptError::internal(
                "join predicate references columns neither side produces",
            ));
        }
        let mut equivalences = left.equivalences().clone();
        equivalences.merge(right.equivalences());
        for (a, b) in self.predicate.equi_join_keys() {
            equivalences.add_equality(a, b);
        }
        Ok(LogicalProperty::new(
            output,
            vec![],
            left.max_card() * right.max_card(),
        )
        .with_equivalences(equivalences))
    }

    fn derive_stats(
        &self,
        inputs: &[Arc<Statistics>],
        _mda: &dyn MdAccessor,
    ) -> OptResult<Statistics> {
        let left = input_at(inputs, 0, "inner join")?;
        let right = input_at(inputs, 1, "inner join")?;

        let row_count = if self.predicate.equi_join_keys().is_empty() {
            left.row_count() * right.row_count() * Statistics::DEFAULT_FILTER_SELECTIVITY
        } else {
            // Classic equi-join estimate with ndv approximated by the larger
            // side's cardinality.
            let max_side = left.row_count().max(right.row_count()).max(1.0);
            left.row_count() * right.row_count() / max_side
        };
        Ok(Statistics::with_row_count(row_count))
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }
}

/// Bag union of any number of inputs producing the first input's columns.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct UnionAll {}

impl UnionAll {
    pub fn new() -> Self {
        Self {}
    }
}

impl LogicalOperatorTrait for UnionAll {
    fn derive_logical_prop(&self, inputs: &[LogicalProperty]) -> OptResult<LogicalProperty> {
        let first = input_at(inputs, 0, "union all")?;
        Ok(LogicalProperty::with_output(first.output_columns().clone()))
    }

    fn derive_stats(
        &self,
        inputs: &[Arc<Statistics>],
        _mda: &dyn MdAccessor,
    ) -> OptResult<Statistics> {
        Ok(Statistics::with_row_count(
            inputs.iter().map(|s| s.row_count()).sum(),
        ))
    }

    fn arity(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColId;
    use crate::operator::ScalarExpr;

    fn prop_with(ids: &[u32]) -> LogicalProperty {
        LogicalProperty::with_output(ids.iter().map(|id| ColId(*id)).collect())
    }

    #[test]
    fn test_equi_join_derives_column_equivalences() {
        let join = InnerJoin::new(ScalarExpr::col_eq(ColId(1), ColId(3)));
        let prop = join
            .derive_logical_prop(&[prop_with(&[1, 2]), prop_with(&[3])])
            .unwrap();

        assert!(prop.equivalences().are_equivalent(ColId(1), ColId(3)));
        assert!(!prop.equivalences().are_equivalent(ColId(1), ColId(2)));
    }

    #[test]
    fn test_select_equality_joins_input_classes() {
        let select = Select::new(ScalarExpr::col_eq(ColId(1), ColId(2)));
        let input = prop_with(&[1, 2, 3]);
        let prop = select.derive_logical_prop(&[input]).unwrap();

        assert!(prop.equivalences().are_equivalent(ColId(1), ColId(2)));
        assert!(!prop.equivalences().are_equivalent(ColId(1), ColId(3)));
    }
}
