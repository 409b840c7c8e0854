//! Pattern binding.
//!
//! Binding pins a rule pattern onto the memo: the root is a concrete group
//! expression, nested pattern nodes fan out over the logical members of
//! child groups, and wildcard leaves collapse to group handles without
//! enumerating anything underneath. Multiple nested matches multiply out via
//! a cartesian product over the per-child candidate lists.

use std::sync::Arc;

use itertools::Itertools;

use crate::memo::{GroupExpression, Memo};
use crate::rules::{ChildPattern, ChildPolicy, OptExpr, Pattern};

/// All bindings of `pattern` rooted at `expr`. Empty when the root does not
/// match.
pub(crate) fn bind_pattern(
    memo: &Memo,
    expr: &Arc<GroupExpression>,
    pattern: &Pattern,
) -> Vec<OptExpr> {
    if !pattern.matches_root(expr.operator()) {
        return vec![];
    }

    match &pattern.children {
        ChildPolicy::MultiLeaf => {
            let inputs = expr
                .inputs()
                .iter()
                .map(|g| OptExpr::with_group(memo.find(*g)))
                .collect::<Vec<_>>();
            vec![OptExpr::with_member(expr.id(), inputs)]
        }
        ChildPolicy::Fixed(children) => {
            if children.len() != expr.inputs().len() {
                return vec![];
            }
            if children.is_empty() {
                return vec![OptExpr::with_member(expr.id(), vec![])];
            }

            let per_child: Vec<Vec<OptExpr>> = children
                .iter()
                .zip(expr.inputs())
                .map(|(child, group)| match child {
                    ChildPattern::Leaf => vec![OptExpr::with_group(memo.find(*group))],
                    ChildPattern::Node(inner) => memo
                        .members(*group)
                        .into_iter()
                        .filter(|m| m.is_logical())
                        .flat_map(|m| bind_pattern(memo, &m, inner))
                        .collect(),
                })
                .collect();

            per_child
                .into_iter()
                .map(IntoIterator::into_iter)
                .multi_cartesian_product()
                .map(|inputs| OptExpr::with_member(expr.id(), inputs))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnFactory;
    use crate::metadata::{MemoryMdProvider, TableId};
    use crate::operator::Operator::Logical;
    use crate::operator::{InnerJoin, LogicalOperator, Operator, ScalarExpr};
    use crate::rules::OptExprNode;

    fn is_join(op: &Operator) -> bool {
        matches!(op, Logical(LogicalOperator::LogicalInnerJoin(_)))
    }

    fn is_get(op: &Operator) -> bool {
        matches!(op, Logical(LogicalOperator::LogicalGet(_)))
    }

    #[test]
    fn test_binary_pattern_binds_group_handles() {
        let factory = ColumnFactory::new();
        let provider = MemoryMdProvider::new();
        let t1 = provider.register_table(TableId(1), "t1", &["a"], 10.0, &factory);
        let t2 = provider.register_table(TableId(2), "t2", &["b"], 10.0, &factory);

        let memo = Memo::new();
        let l = memo
            .insert_expr_tree(&crate::expr::LogicalExprBuilder::new().get(&t1).build(), None)
            .unwrap();
        let r = memo
            .insert_expr_tree(&crate::expr::LogicalExprBuilder::new().get(&t2).build(), None)
            .unwrap();
        let join = Logical(LogicalOperator::LogicalInnerJoin(InnerJoin::new(
            ScalarExpr::col_eq(t1.columns[0].id(), t2.columns[0].id()),
        )));
        let (jid, _) = memo.insert_expr(join, vec![l, r], None, None, false).unwrap();
        let expr = memo.expr(jid).unwrap();

        let bindings = bind_pattern(&memo, &expr, &Pattern::binary(is_join));
        assert_eq!(1, bindings.len());
        assert!(matches!(bindings[0].node(), OptExprNode::Member(id) if *id == jid));
        assert!(matches!(bindings[0][0].node(), OptExprNode::Group(g) if *g == l));
        assert!(matches!(bindings[0][1].node(), OptExprNode::Group(g) if *g == r));

        // Nested pattern descends into the child groups' members.
        let nested = Pattern::node(
            is_join,
            vec![
                ChildPattern::Node(Pattern::nullary(is_get)),
                ChildPattern::Leaf,
            ],
        );
        let bindings = bind_pattern(&memo, &expr, &nested);
        assert_eq!(1, bindings.len());
        assert!(matches!(bindings[0][0].node(), OptExprNode::Member(_)));

        // Non-matching root binds nothing.
        assert!(bind_pattern(&memo, &expr, &Pattern::nullary(is_get)).is_empty());
    }
}
