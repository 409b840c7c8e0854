//! Property enforcement.
//!
//! When a chosen child plan does not natively deliver a required property,
//! the optimizer appends enforcer operators on top of it. Enforcement is a
//! separate step from implementation rules: enforcers are planned per
//! optimization request against the gap between delivered and required
//! properties.

use crate::columns::ColId;
use crate::operator::{GatherMotion, HashMotion, PhysicalOperator, Sort, Spool};
use crate::properties::{
    DistributionSpec, LogicalProperty, OrderSpec, PhysicalProp, PhysicalPropertySet, Rewindability,
};

/// One enforcer to stack on the current plan, with the properties the stack
/// delivers after it.
#[derive(Debug, Clone)]
pub struct Enforcer {
    pub operator: PhysicalOperator,
    pub output_prop: PhysicalPropertySet,
}

/// Whether the group produces `col` or a column known equal to it, so an
/// enforcer keyed on `col` can run on the group's output.
fn producible(col: ColId, logical: &LogicalProperty) -> bool {
    logical
        .equivalences()
        .class_of(col)
        .iter()
        .any(|c| logical.output_columns().contains(c))
}

/// Plan the enforcer chain turning `delivered` into something satisfying
/// `required`. Returns `None` when the requirement cannot be enforced, e.g.
/// a sort on columns the group does not produce.
///
/// Motions come first since they destroy ordering; the sort runs on top of
/// the final distribution; a spool caps the chain.
pub fn plan_enforcers(
    required: &PhysicalPropertySet,
    delivered: &PhysicalPropertySet,
    logical: &LogicalProperty,
) -> Option<Vec<Enforcer>> {
    let mut chain = Vec::new();
    let mut cur = delivered.clone();

    if !cur.dist.satisfies(&required.dist) {
        let operator = match &required.dist {
            DistributionSpec::Singleton => PhysicalOperator::from(GatherMotion::new()),
            DistributionSpec::Hashed(cols) => {
                if !cols.iter().all(|col| producible(*col, logical)) {
                    return None;
                }
                PhysicalOperator::from(HashMotion::new(cols.clone()))
            }
            // Nothing enforces randomness or the absence of a requirement.
            DistributionSpec::Any | DistributionSpec::Random => return None,
        };
        cur = PhysicalPropertySet {
            order: OrderSpec::default(),
            dist: required.dist.clone(),
            rewind: Rewindability::Any,
        };
        chain.push(Enforcer {
            operator,
            output_prop: cur.clone(),
        });
    }

    if !cur.order.satisfies(&required.order) {
        if !required
            .order
            .columns()
            .iter()
            .all(|col| producible(col, logical))
        {
            return None;
        }
        cur = PhysicalPropertySet {
            order: required.order.clone(),
            dist: cur.dist.clone(),
            rewind: Rewindability::Any,
        };
        chain.push(Enforcer {
            operator: Sort::new(required.order.clone()).into(),
            output_prop: cur.clone(),
        });
    }

    if !cur.rewind.satisfies(&required.rewind) {
        cur = PhysicalPropertySet {
            order: cur.order.clone(),
            dist: cur.dist.clone(),
            rewind: Rewindability::Rewindable,
        };
        chain.push(Enforcer {
            operator: Spool::new().into(),
            output_prop: cur.clone(),
        });
    }

    if cur.satisfies(required) {
        Some(chain)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{ColId, ColumnRefSet};

    fn logical_with(cols: &[u32]) -> LogicalProperty {
        LogicalProperty::with_output(cols.iter().map(|c| ColId(*c)).collect::<ColumnRefSet>())
    }

    fn random() -> PhysicalPropertySet {
        PhysicalPropertySet::with_dist(DistributionSpec::Random)
    }

    #[test]
    fn test_sort_enforcer() {
        let required = PhysicalPropertySet::with_order(OrderSpec::by_columns(&[ColId(1)]));
        let chain = plan_enforcers(&required, &random(), &logical_with(&[1, 2])).unwrap();

        assert_eq!(1, chain.len());
        assert!(matches!(
            chain[0].operator,
            PhysicalOperator::PhysicalSort(_)
        ));
        assert!(chain[0].output_prop.satisfies(&required));
    }

    #[test]
    fn test_motion_precedes_sort() {
        let required = PhysicalPropertySet {
            order: OrderSpec::by_columns(&[ColId(1)]),
            dist: DistributionSpec::Singleton,
            rewind: Rewindability::Any,
        };
        let chain = plan_enforcers(&required, &random(), &logical_with(&[1])).unwrap();

        assert_eq!(2, chain.len());
        assert!(matches!(
            chain[0].operator,
            PhysicalOperator::PhysicalGatherMotion(_)
        ));
        assert!(matches!(
            chain[1].operator,
            PhysicalOperator::PhysicalSort(_)
        ));
    }

    #[test]
    fn test_unsatisfiable_sort_column() {
        // Sort on a column the group does not produce.
        let required = PhysicalPropertySet::with_order(OrderSpec::by_columns(&[ColId(9)]));
        assert!(plan_enforcers(&required, &random(), &logical_with(&[1, 2])).is_none());
    }

    #[test]
    fn test_sort_on_equivalent_column() {
        use crate::columns::ColumnEquivalences;

        // The group produces #1, and a predicate below made #1 = #9, so a
        // sort keyed on #9 is enforceable.
        let mut eq = ColumnEquivalences::new();
        eq.add_equality(ColId(1), ColId(9));
        let logical = logical_with(&[1, 2]).with_equivalences(eq);

        let required = PhysicalPropertySet::with_order(OrderSpec::by_columns(&[ColId(9)]));
        let chain = plan_enforcers(&required, &random(), &logical).unwrap();
        assert_eq!(1, chain.len());
        assert!(matches!(
            chain[0].operator,
            PhysicalOperator::PhysicalSort(_)
        ));
    }

    #[test]
    fn test_spool_enforcer() {
        let required = PhysicalPropertySet {
            rewind: Rewindability::Rewindable,
            ..Default::default()
        };
        let chain = plan_enforcers(&required, &random(), &logical_with(&[1])).unwrap();
        assert_eq!(1, chain.len());
        assert!(matches!(
            chain[0].operator,
            PhysicalOperator::PhysicalSpool(_)
        ));
    }

    #[test]
    fn test_no_enforcer_when_satisfied() {
        let chain = plan_enforcers(&PhysicalPropertySet::default(), &random(), &logical_with(&[1]))
            .unwrap();
        assert!(chain.is_empty());
    }
}
