use crate::error::{OptError, OptResult};
use crate::memo::{GroupExpression, Memo};
use crate::operator::LogicalOperator::LogicalInnerJoin;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::{PhysicalHashJoin, PhysicalNestedLoopJoin};
use crate::operator::{HashJoin, NestedLoopJoin, Operator};
use crate::rules::{OptExpr, Pattern, Rule, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref INNER_JOIN_PATTERN: Pattern = Pattern::binary(is_inner_join);
}

fn is_inner_join(op: &Operator) -> bool {
    matches!(op, Logical(LogicalInnerJoin(_)))
}

/// Swap inner join inputs. Self-inverse, so it refuses its own output.
#[derive(Clone, Default)]
pub struct InnerJoinCommutativityRule {}

impl InnerJoinCommutativityRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for InnerJoinCommutativityRule {
    fn apply(&self, input: &OptExpr, memo: &Memo, result: &mut RuleResult) -> OptResult<()> {
        let op = input.operator(memo)?;
        result.add(OptExpr::with_operator(
            op,
            vec![input[1].clone(), input[0].clone()],
        ));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &INNER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::InnerJoinCommutativity
    }

    fn promise(&self, _expr: &GroupExpression, _memo: &Memo) -> RulePromise {
        RulePromise::High
    }

    fn compatible_with(&self, origin: RuleId) -> bool {
        origin != RuleId::InnerJoinCommutativity
    }
}

/// Implement an equality inner join as a hash join.
#[derive(Clone, Default)]
pub struct Join2HashJoinRule {}

impl Join2HashJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Join2HashJoinRule {
    fn apply(&self, input: &OptExpr, memo: &Memo, result: &mut RuleResult) -> OptResult<()> {
        match input.operator(memo)? {
            Logical(LogicalInnerJoin(join)) => {
                let hash_join = Physical(PhysicalHashJoin(HashJoin::new(join.predicate().clone())));
                result.add(input.clone_with_operator(hash_join));
                Ok(())
            }
            other => Err(OptError::internal(format!(
                "hash join rule bound to {:?}",
                other
            ))),
        }
    }

    fn pattern(&self) -> &Pattern {
        &INNER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::Join2HashJoin
    }

    fn promise(&self, expr: &GroupExpression, _memo: &Memo) -> RulePromise {
        // Hashing needs at least one equality key pair.
        match expr.operator() {
            Logical(LogicalInnerJoin(join)) if !join.predicate().equi_join_keys().is_empty() => {
                RulePromise::High
            }
            _ => RulePromise::DontApply,
        }
    }

    fn compatible_with(&self, _origin: RuleId) -> bool {
        true
    }
}

/// Implement an inner join as a nested-loop join. Always applicable; the
/// cost model keeps it as the fallback.
#[derive(Clone, Default)]
pub struct Join2NestedLoopJoinRule {}

impl Join2NestedLoopJoinRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Join2NestedLoopJoinRule {
    fn apply(&self, input: &OptExpr, memo: &Memo, result: &mut RuleResult) -> OptResult<()> {
        match input.operator(memo)? {
            Logical(LogicalInnerJoin(join)) => {
                let nl_join = Physical(PhysicalNestedLoopJoin(NestedLoopJoin::new(
                    join.predicate().clone(),
                )));
                result.add(input.clone_with_operator(nl_join));
                Ok(())
            }
            other => Err(OptError::internal(format!(
                "nested-loop join rule bound to {:?}",
                other
            ))),
        }
    }

    fn pattern(&self) -> &Pattern {
        &INNER_JOIN_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::Join2NestedLoopJoin
    }

    fn promise(&self, _expr: &GroupExpression, _memo: &Memo) -> RulePromise {
        RulePromise::Low
    }

    fn compatible_with(&self, _origin: RuleId) -> bool {
        true
    }
}
