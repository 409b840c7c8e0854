//! Logical and physical properties.
//!
//! Logical properties are shared by every expression in a group (output
//! columns, keys, cardinality bound). Physical properties are the plan-shaped
//! ones: ordering, distribution and rewindability. Required physical
//! properties flow top-down; delivered ones are derived bottom-up, and
//! [`enforcement`] bridges the gap with enforcer operators.

use std::fmt::Debug;
use std::hash::Hash;

mod distribution;
pub use distribution::*;
mod order;
pub use order::*;
mod rewind;
pub use rewind::*;
mod logical;
pub use logical::*;
pub mod enforcement;

pub trait PhysicalProp: Debug + Hash {
    /// Whether a delivered `self` satisfies the requirement `other`.
    fn satisfies(&self, other: &Self) -> bool;
}

/// All physical properties of one plan fragment.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct PhysicalPropertySet {
    pub order: OrderSpec,
    pub dist: DistributionSpec,
    pub rewind: Rewindability,
}

impl PhysicalPropertySet {
    pub fn with_order(order: OrderSpec) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn with_dist(dist: DistributionSpec) -> Self {
        Self {
            dist,
            ..Default::default()
        }
    }

    pub fn satisfies(&self, required: &PhysicalPropertySet) -> bool {
        self.order.satisfies(&required.order)
            && self.dist.satisfies(&required.dist)
            && self.rewind.satisfies(&required.rewind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColId;

    #[test]
    fn test_property_set_satisfaction_is_componentwise() {
        let delivered = PhysicalPropertySet {
            order: OrderSpec::by_columns(&[ColId(1)]),
            dist: DistributionSpec::Singleton,
            rewind: Rewindability::Rewindable,
        };

        assert!(delivered.satisfies(&PhysicalPropertySet::default()));
        assert!(delivered.satisfies(&PhysicalPropertySet::with_order(OrderSpec::by_columns(
            &[ColId(1)]
        ))));
        assert!(!delivered.satisfies(&PhysicalPropertySet::with_order(OrderSpec::by_columns(
            &[ColId(2)]
        ))));
    }
}
