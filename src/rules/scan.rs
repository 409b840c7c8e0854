use crate::error::{OptError, OptResult};
use crate::memo::{GroupExpression, Memo};
use crate::operator::LogicalOperator::LogicalGet;
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::PhysicalTableScan;
use crate::operator::{Operator, TableScan};
use crate::rules::{OptExpr, Pattern, Rule, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref GET_PATTERN: Pattern = Pattern::nullary(is_get);
}

fn is_get(op: &Operator) -> bool {
    matches!(op, Logical(LogicalGet(_)))
}

/// Implement a table access as a full scan.
#[derive(Clone, Default)]
pub struct Get2TableScanRule {}

impl Get2TableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Get2TableScanRule {
    fn apply(&self, input: &OptExpr, memo: &Memo, result: &mut RuleResult) -> OptResult<()> {
        match input.operator(memo)? {
            Logical(LogicalGet(get)) => {
                let scan = Physical(PhysicalTableScan(TableScan::new(
                    get.table(),
                    get.columns().to_vec(),
                )));
                result.add(scan.into());
                Ok(())
            }
            other => Err(OptError::internal(format!(
                "table scan rule bound to {:?}",
                other
            ))),
        }
    }

    fn pattern(&self) -> &Pattern {
        &GET_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        RuleId::Get2TableScan
    }

    fn promise(&self, _expr: &GroupExpression, _memo: &Memo) -> RulePromise {
        RulePromise::High
    }

    fn compatible_with(&self, _origin: RuleId) -> bool {
        true
    }
}
