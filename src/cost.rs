//! Cost model.
//!
//! Per-operator cost given the row counts of the operator's group and of its
//! children. Children's accumulated cost is added by the optimizer, not here.
//! The coefficients are defaults, not part of the crate contract.

use derive_more::{Add, AddAssign, Sub, SubAssign, Sum};

use crate::error::OptResult;
use crate::operator::PhysicalOperator;

pub const INF: Cost = Cost(f64::INFINITY);

#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Add, Sub, Sum, AddAssign, SubAssign)]
pub struct Cost(f64);

impl From<f64> for Cost {
    fn from(c: f64) -> Self {
        Cost(c)
    }
}

impl Cost {
    pub fn value(&self) -> f64 {
        self.0
    }
}

#[derive(Default, Debug)]
pub struct CostModel {
    /// Actual strategy.
    inner: SimpleCostModel,
}

impl CostModel {
    /// Estimate cost of the operator itself, without children's cost.
    pub fn operator_cost(
        &self,
        op: &PhysicalOperator,
        output_rows: f64,
        input_rows: &[f64],
    ) -> OptResult<Cost> {
        self.inner.cost(op, output_rows, input_rows)
    }
}

const TUPLE_COST: f64 = 1.0;
const HASH_BUILD_COST: f64 = 1.5;
const MOTION_COST: f64 = 2.0;
const MATERIALIZE_COST: f64 = 0.5;

#[derive(Default, Debug)]
struct SimpleCostModel {}

impl SimpleCostModel {
    fn cost(
        &self,
        op: &PhysicalOperator,
        output_rows: f64,
        input_rows: &[f64],
    ) -> OptResult<Cost> {
        let rows_at = |idx: usize| input_rows.get(idx).copied().unwrap_or(1.0).max(1.0);

        let cost = match op {
            PhysicalOperator::PhysicalTableScan(_) => output_rows * TUPLE_COST,
            PhysicalOperator::PhysicalFilter(_) => rows_at(0) * TUPLE_COST,
            PhysicalOperator::PhysicalComputeScalar(_) => rows_at(0) * TUPLE_COST,
            PhysicalOperator::PhysicalHashJoin(_) => {
                // Build the smaller side, probe with the larger.
                let (build, probe) = if rows_at(0) <= rows_at(1) {
                    (rows_at(0), rows_at(1))
                } else {
                    (rows_at(1), rows_at(0))
                };
                build * HASH_BUILD_COST + probe * TUPLE_COST
            }
            PhysicalOperator::PhysicalNestedLoopJoin(_) => rows_at(0) * rows_at(1) * TUPLE_COST,
            PhysicalOperator::PhysicalUnionAll(_) => input_rows.iter().sum::<f64>() * TUPLE_COST,
            PhysicalOperator::PhysicalSort(_) => {
                let rows = rows_at(0);
                rows * rows.log2().max(1.0) * TUPLE_COST
            }
            PhysicalOperator::PhysicalGatherMotion(_)
            | PhysicalOperator::PhysicalHashMotion(_) => rows_at(0) * MOTION_COST,
            PhysicalOperator::PhysicalSpool(_) => rows_at(0) * MATERIALIZE_COST,
        };

        Ok(Cost::from(cost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColId;
    use crate::operator::{HashJoin, NestedLoopJoin, ScalarExpr};

    #[test]
    fn test_hash_join_cheaper_than_nested_loop_on_large_inputs() {
        let model = CostModel::default();
        let pred = ScalarExpr::col_eq(ColId(1), ColId(2));

        let hash = model
            .operator_cost(&HashJoin::new(pred.clone()).into(), 1000.0, &[1000.0, 1000.0])
            .unwrap();
        let nl = model
            .operator_cost(&NestedLoopJoin::new(pred).into(), 1000.0, &[1000.0, 1000.0])
            .unwrap();

        assert!(hash < nl);
    }
}
