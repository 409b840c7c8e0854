//! Relational operators.
//!
//! Operators come in two memo-resident flavors, logical and physical, kept in
//! separate enums since they implement different capability traits: logical
//! operators derive logical properties and statistics, physical operators
//! derive required child properties. Scalar expressions ([`scalar`]) are
//! payload inside operators; pattern wildcards live in the rules module and
//! never enter the memo.

mod logical;
pub use logical::*;
mod physical;
pub use physical::*;
mod scalar;
pub use scalar::*;

use enum_as_inner::EnumAsInner;

#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner)]
pub enum Operator {
    Logical(LogicalOperator),
    Physical(PhysicalOperator),
}

impl Operator {
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::Logical(_))
    }

    pub fn is_physical(&self) -> bool {
        matches!(self, Operator::Physical(_))
    }

    /// Number of children the operator expects, `None` for variadic.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Operator::Logical(op) => op.arity(),
            Operator::Physical(op) => op.arity(),
        }
    }
}
