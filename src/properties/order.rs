use crate::columns::{ColId, ColumnRefSet};
use crate::properties::PhysicalProp;

/// Ordering on one column.
#[derive(Hash, Debug, Clone, Eq, PartialEq)]
pub struct Ordering {
    pub col: ColId,
    pub asc: bool,
    pub nulls_first: bool,
}

impl Ordering {
    pub fn asc(col: ColId) -> Self {
        Self {
            col,
            asc: true,
            nulls_first: false,
        }
    }
}

/// Ordering property specification. Empty means no ordering requirement.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct OrderSpec {
    orders: Vec<Ordering>,
}

impl OrderSpec {
    pub fn new(orders: Vec<Ordering>) -> Self {
        Self { orders }
    }

    pub fn by_columns(cols: &[ColId]) -> Self {
        Self {
            orders: cols.iter().copied().map(Ordering::asc).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &[Ordering] {
        &self.orders
    }

    pub fn columns(&self) -> ColumnRefSet {
        self.orders.iter().map(|o| o.col).collect()
    }
}

impl PhysicalProp for OrderSpec {
    /// A delivered ordering satisfies a required one when the requirement is
    /// a prefix of what is delivered.
    fn satisfies(&self, required: &Self) -> bool {
        required.orders.len() <= self.orders.len()
            && self.orders[..required.orders.len()] == required.orders[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_satisfaction() {
        let delivered = OrderSpec::by_columns(&[ColId(1), ColId(2)]);
        assert!(delivered.satisfies(&OrderSpec::default()));
        assert!(delivered.satisfies(&OrderSpec::by_columns(&[ColId(1)])));
        assert!(delivered.satisfies(&delivered.clone()));
        assert!(!delivered.satisfies(&OrderSpec::by_columns(&[ColId(2)])));
        assert!(!OrderSpec::default().satisfies(&OrderSpec::by_columns(&[ColId(1)])));
    }
}
