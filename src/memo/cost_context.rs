use std::fmt::{Debug, Formatter};

use crate::cost::Cost;
use crate::memo::ExprId;
use crate::properties::PhysicalPropertySet;

/// A costed way to satisfy a property request with a concrete group
/// expression: the properties it delivers, what it asks of each child, and
/// the accumulated cost of the subtree rooted here.
#[derive(Clone)]
pub struct CostContext {
    pub expr: ExprId,
    /// The request this context answers; the key it is stored under.
    pub required: PhysicalPropertySet,
    /// Properties actually delivered. Satisfies `required`.
    pub output: PhysicalPropertySet,
    /// Per-child requests; child winners are looked up with these.
    pub input_reqds: Vec<PhysicalPropertySet>,
    pub cost: Cost,
}

impl Debug for CostContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CostContext {{ expr: {:?}, cost: {:.2}, required: {:?} }}",
            self.expr,
            self.cost.value(),
            self.required
        )
    }
}
