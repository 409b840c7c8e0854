//! Transformation rules.
//!
//! A rule defines an equivalence-preserving transformation over a bound
//! pattern, in two kinds:
//!
//! 1. Exploration rules produce alternative logical shapes, e.g.
//!    [`InnerJoinCommutativityRule`] swapping inner join inputs.
//! 2. Implementation rules produce physical counterparts of logical
//!    operators, e.g. [`Join2HashJoinRule`].
//!
//! Rules never touch the memo. The binder feeds them [`OptExpr`] trees cut
//! out of the memo along the rule's [`Pattern`]; rules emit rewritten
//! [`OptExpr`] trees into a [`RuleResult`] and the caller inserts those back.
//! Group and member handles in the output mean "reuse as is", so a rule only
//! materializes the nodes it actually rewrites.
//!
//! Scheduling hints: `promise` ranks rules per bound expression and can veto
//! an application outright, while `compatible_with` breaks two-rule cycles
//! such as commutativity undoing itself.

mod binding;
pub(crate) use binding::*;
mod opt_expr;
pub use opt_expr::*;
mod pattern;
pub use pattern::*;

mod join;
pub use join::*;
mod scan;
pub use scan::*;
mod select;
pub use select::*;
mod union;
pub use union::*;

use std::fmt::{Debug, Formatter};

use enum_dispatch::enum_dispatch;
use enumset::EnumSetType;
use strum_macros::AsRefStr;

use crate::error::OptResult;
use crate::memo::{GroupExpression, Memo};

pub struct RuleResult {
    exprs: Vec<OptExpr>,
}

impl Default for RuleResult {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleResult {
    pub fn new() -> Self {
        Self { exprs: vec![] }
    }

    pub fn add(&mut self, expr: OptExpr) {
        self.exprs.push(expr);
    }

    pub fn results(self) -> impl Iterator<Item = OptExpr> {
        self.exprs.into_iter()
    }
}

#[enum_dispatch(RuleImpl)]
pub trait Rule {
    /// Apply the rule to one binding, adding rewrites to `result`.
    fn apply(&self, input: &OptExpr, memo: &Memo, result: &mut RuleResult) -> OptResult<()>;

    /// Pattern the binder matches before calling `apply`.
    fn pattern(&self) -> &Pattern;

    /// Identifies the rule in applied-rule masks and disable sets.
    fn rule_id(&self) -> RuleId;

    /// Ranks this application against other candidate rules for `expr`.
    /// `DontApply` vetoes it, e.g. a hash join over a predicate with no
    /// equality keys.
    fn promise(&self, expr: &GroupExpression, memo: &Memo) -> RulePromise;

    /// Whether this rule should run on expressions produced by `origin`.
    /// Self-inverse rules return `false` for their own id.
    fn compatible_with(&self, origin: RuleId) -> bool;
}

#[enum_dispatch]
#[derive(Clone, AsRefStr)]
pub enum RuleImpl {
    // Exploration rules
    InnerJoinCommutativityRule,

    // Implementation rules
    Get2TableScanRule,
    Select2FilterRule,
    Project2ComputeScalarRule,
    Join2HashJoinRule,
    Join2NestedLoopJoinRule,
    ImplementUnionAllRule,
}

#[derive(EnumSetType, Debug)]
pub enum RuleId {
    InnerJoinCommutativity,
    Get2TableScan,
    Select2Filter,
    Project2ComputeScalar,
    Join2HashJoin,
    Join2NestedLoopJoin,
    ImplementUnionAll,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum RulePromise {
    DontApply = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Debug for RuleImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// The rules a search stage runs, split by phase.
#[derive(Clone)]
pub struct RuleSet {
    pub exploration: Vec<RuleImpl>,
    pub implementation: Vec<RuleImpl>,
}

impl RuleSet {
    pub fn cascades() -> Self {
        Self {
            exploration: vec![InnerJoinCommutativityRule::new().into()],
            implementation: vec![
                Get2TableScanRule::new().into(),
                Select2FilterRule::new().into(),
                Project2ComputeScalarRule::new().into(),
                Join2HashJoinRule::new().into(),
                Join2NestedLoopJoinRule::new().into(),
                ImplementUnionAllRule::new().into(),
            ],
        }
    }
}
