use crate::error::{OptError, OptResult};
use crate::memo::{GroupExpression, Memo};
use crate::operator::LogicalOperator::{LogicalProject, LogicalSelect};
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::{PhysicalComputeScalar, PhysicalFilter};
use crate::operator::{ComputeScalar, Filter};
use crate::rules::{OptExpr, Pattern, Rule, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref SELECT_PATTERN: Pattern =
        Pattern::unary(|op| matches!(op, Logical(LogicalSelect(_))));
    static ref PROJECT_PATTERN: Pattern =
        Pattern::unary(|op| matches!(op, Logical(LogicalProject(_))));
}

/// Implement a selection as a streaming filter.
#[derive(Clone, Default)]
pub struct Select2FilterRule {}

impl Select2FilterRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Select2FilterRule {
    fn apply(&self, input: &OptExpr, memo: &Memo, result: &mut RuleResult) -> OptResult<()> {
        match input.operator(memo)? {
            Logical(LogicalSelect(select)) => {
                let filter = Physical(PhysicalFilter(Filter::new(select.predicate().clone())));
                result.add(input.clone_with_operator(filter));
                Ok(())
            }
            other => Err(OptError::internal(format!(
                "filter rule bound to {:?}",
                other
            ))),
        }
    }

    fn pattern(&self) -> &Pattern {
        &SELECT_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::Select2Filter
    }

    fn promise(&self, _expr: &GroupExpression, _memo: &Memo) -> RulePromise {
        RulePromise::High
    }

    fn compatible_with(&self, _origin: RuleId) -> bool {
        true
    }
}

/// Implement a projection as scalar computation over its input.
#[derive(Clone, Default)]
pub struct Project2ComputeScalarRule {}

impl Project2ComputeScalarRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Project2ComputeScalarRule {
    fn apply(&self, input: &OptExpr, memo: &Memo, result: &mut RuleResult) -> OptResult<()> {
        match input.operator(memo)? {
            Logical(LogicalProject(project)) => {
                let compute = Physical(PhysicalComputeScalar(ComputeScalar::new(
                    project.exprs().to_vec(),
                )));
                result.add(input.clone_with_operator(compute));
                Ok(())
            }
            other => Err(OptError::internal(format!(
                "compute scalar rule bound to {:?}",
                other
            ))),
        }
    }

    fn pattern(&self) -> &Pattern {
        &PROJECT_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::Project2ComputeScalar
    }

    fn promise(&self, _expr: &GroupExpression, _memo: &Memo) -> RulePromise {
        RulePromise::High
    }

    fn compatible_with(&self, _origin: RuleId) -> bool {
        true
    }
}
