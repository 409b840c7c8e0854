use std::fmt::{Debug, Formatter};
use std::ops::Index;

use crate::error::{OptError, OptResult};
use crate::memo::{ExprId, GroupId, Memo};
use crate::operator::Operator;

/// One node in an [`OptExpr`].
#[derive(Clone)]
pub enum OptExprNode {
    /// A fresh operator created by a rule.
    Op(Operator),
    /// A handle to an existing group expression, placed by the binder.
    Member(ExprId),
    /// A handle to a whole group, standing in for any of its members.
    Group(GroupId),
}

/// Rewrite tree exchanged between the binder and a rule. Rule input roots are
/// always member handles with leaves bound to group handles; rule output
/// replaces rewritten nodes with operators and reuses handles for everything
/// it leaves untouched, so inserting the output never copies unchanged
/// subtrees.
#[derive(Clone)]
pub struct OptExpr {
    node: OptExprNode,
    inputs: Vec<OptExpr>,
}

impl OptExpr {
    pub fn with_operator<I>(op: Operator, inputs: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self {
            node: OptExprNode::Op(op),
            inputs: inputs.into_iter().collect(),
        }
    }

    pub fn with_member<I>(id: ExprId, inputs: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self {
            node: OptExprNode::Member(id),
            inputs: inputs.into_iter().collect(),
        }
    }

    /// Group handles are always leaves.
    pub fn with_group(id: GroupId) -> Self {
        Self {
            node: OptExprNode::Group(id),
            inputs: vec![],
        }
    }

    /// New root operator over this node's existing inputs.
    pub fn clone_with_operator(&self, op: Operator) -> Self {
        Self {
            node: OptExprNode::Op(op),
            inputs: self.inputs.clone(),
        }
    }

    pub fn node(&self) -> &OptExprNode {
        &self.node
    }

    pub fn inputs(&self) -> &[Self] {
        &self.inputs
    }

    /// The operator at this node, resolving member handles through the memo.
    pub fn operator(&self, memo: &Memo) -> OptResult<Operator> {
        match &self.node {
            OptExprNode::Op(op) => Ok(op.clone()),
            OptExprNode::Member(id) => Ok(memo.expr(*id)?.operator().clone()),
            OptExprNode::Group(_) => {
                Err(OptError::internal("group handle carries no operator"))
            }
        }
    }

    fn format(&self, f: &mut Formatter<'_>, level: usize) -> std::fmt::Result {
        if level > 0 {
            write!(f, "{}--", "  ".repeat(level - 1))?;
        }
        match &self.node {
            OptExprNode::Op(op) => writeln!(f, "{:?}", op)?,
            OptExprNode::Member(id) => writeln!(f, "[member {:?}]", id)?,
            OptExprNode::Group(id) => writeln!(f, "[group {}]", id)?,
        }
        for input in &self.inputs {
            input.format(f, level + 1)?;
        }
        Ok(())
    }
}

impl From<Operator> for OptExpr {
    fn from(op: Operator) -> Self {
        OptExpr::with_operator(op, vec![])
    }
}

impl Index<usize> for OptExpr {
    type Output = OptExpr;

    fn index(&self, index: usize) -> &Self::Output {
        &self.inputs[index]
    }
}

impl Debug for OptExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.format(f, 0)
    }
}
