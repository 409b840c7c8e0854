use crate::error::{OptError, OptResult};
use crate::memo::{GroupExpression, Memo};
use crate::operator::LogicalOperator::LogicalUnionAll;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::{Operator, PhysicalUnionAll};
use crate::rules::{OptExpr, Pattern, Rule, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    // Union is variadic, so the pattern leaves the child list open.
    static ref UNION_ALL_PATTERN: Pattern =
        Pattern::multi_leaf(|op| matches!(op, Logical(LogicalUnionAll(_))));
}

/// Implement a bag union over any number of inputs.
#[derive(Clone, Default)]
pub struct ImplementUnionAllRule {}

impl ImplementUnionAllRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for ImplementUnionAllRule {
    fn apply(&self, input: &OptExpr, memo: &Memo, result: &mut RuleResult) -> OptResult<()> {
        match input.operator(memo)? {
            Logical(LogicalUnionAll(_)) => {
                let op: Operator = Physical(PhysicalUnionAll::new().into());
                result.add(input.clone_with_operator(op));
                Ok(())
            }
            other => Err(OptError::internal(format!(
                "union all rule bound to {:?}",
                other
            ))),
        }
    }

    fn pattern(&self) -> &Pattern {
        &UNION_ALL_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::ImplementUnionAll
    }

    fn promise(&self, _expr: &GroupExpression, _memo: &Memo) -> RulePromise {
        RulePromise::High
    }

    fn compatible_with(&self, _origin: RuleId) -> bool {
        true
    }
}
