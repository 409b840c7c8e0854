//! Expression trees.
//!
//! An [`Expression`] is an operator plus ordered children, immutable and
//! shared through [`ExprRef`]. Expression trees are both the optimizer's
//! input (a logical tree from the host translator) and its output (the
//! winning physical tree).

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::metadata::TableDesc;
use crate::operator::{Get, InnerJoin, LogicalOperator, Operator, Project, ScalarExprRef, Select, UnionAll};

pub type ExprRef = Arc<Expression>;

pub struct Expression {
    op: Operator,
    children: Vec<ExprRef>,
}

impl Expression {
    pub fn new<I>(op: Operator, children: I) -> ExprRef
    where
        I: IntoIterator<Item = ExprRef>,
    {
        Arc::new(Expression {
            op,
            children: children.into_iter().collect(),
        })
    }

    pub fn leaf(op: Operator) -> ExprRef {
        Self::new(op, vec![])
    }

    pub fn op(&self) -> &Operator {
        &self.op
    }

    pub fn children(&self) -> &[ExprRef] {
        &self.children
    }

    fn format(&self, f: &mut Formatter<'_>, level: usize) -> std::fmt::Result {
        if level > 0 {
            write!(f, "{}--", "  ".repeat(level - 1))?;
        }
        writeln!(f, "{:?}", self.op)?;
        for child in &self.children {
            child.format(f, level + 1)?;
        }
        Ok(())
    }
}

impl Debug for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format(f, 0)
    }
}

/// Structural equality, used by tests; memo identity is by group, not here.
impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op && self.children == other.children
    }
}

impl Eq for Expression {}

/// Fluent builder for logical input trees.
pub struct LogicalExprBuilder {
    cur: Option<ExprRef>,
}

impl Default for LogicalExprBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalExprBuilder {
    pub fn new() -> Self {
        Self { cur: None }
    }

    pub fn get(mut self, desc: &TableDesc) -> Self {
        self.cur = Some(Expression::leaf(Operator::Logical(
            LogicalOperator::LogicalGet(Get::new(desc.id, desc.columns.clone())),
        )));
        self
    }

    pub fn select(mut self, predicate: ScalarExprRef) -> Self {
        let input = self.take("select");
        self.cur = Some(Expression::new(
            Operator::Logical(LogicalOperator::LogicalSelect(Select::new(predicate))),
            vec![input],
        ));
        self
    }

    pub fn project(mut self, exprs: Vec<ScalarExprRef>) -> Self {
        let input = self.take("project");
        self.cur = Some(Expression::new(
            Operator::Logical(LogicalOperator::LogicalProject(Project::new(exprs))),
            vec![input],
        ));
        self
    }

    pub fn join(mut self, predicate: ScalarExprRef, right: ExprRef) -> Self {
        let left = self.take("join");
        self.cur = Some(Expression::new(
            Operator::Logical(LogicalOperator::LogicalInnerJoin(InnerJoin::new(predicate))),
            vec![left, right],
        ));
        self
    }

    pub fn union_all(mut self, others: Vec<ExprRef>) -> Self {
        let first = self.take("union all");
        let mut children = vec![first];
        children.extend(others);
        self.cur = Some(Expression::new(
            Operator::Logical(LogicalOperator::LogicalUnionAll(UnionAll::new())),
            children,
        ));
        self
    }

    pub fn build(mut self) -> ExprRef {
        self.take("build")
    }

    fn take(&mut self, op: &str) -> ExprRef {
        self.cur
            .take()
            .unwrap_or_else(|| panic!("{} called on empty builder", op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnFactory;
    use crate::metadata::{MemoryMdProvider, TableId};
    use crate::operator::ScalarExpr;

    #[test]
    fn test_builder_shapes_join_tree() {
        let factory = ColumnFactory::new();
        let provider = MemoryMdProvider::new();
        let t1 = provider.register_table(TableId(1), "t1", &["a"], 10.0, &factory);
        let t2 = provider.register_table(TableId(2), "t2", &["b"], 10.0, &factory);

        let right = LogicalExprBuilder::new().get(&t2).build();
        let pred = ScalarExpr::col_eq(t1.columns[0].id(), t2.columns[0].id());
        let expr = LogicalExprBuilder::new().get(&t1).join(pred, right).build();

        assert!(expr.op().is_logical());
        assert_eq!(2, expr.children().len());
        assert_eq!(0, expr.children()[0].children().len());
    }
}
