//! Scalar expressions.
//!
//! Scalar trees are immutable payload carried inside relational operators
//! (join and select predicates, projection lists). They are structurally
//! hashed as part of memo dedup but never form memo groups of their own.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::columns::{ColId, ColumnRefSet};

pub type ScalarExprRef = Arc<ScalarExpr>;

/// Literal value. Floats are excluded on purpose so the tree stays `Eq`.
#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub enum CmpKind {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub enum BoolKind {
    And,
    Or,
}

#[derive(Clone, Hash, Eq, PartialEq)]
pub enum ScalarExpr {
    Column(ColId),
    Literal(Datum),
    Cmp {
        kind: CmpKind,
        left: ScalarExprRef,
        right: ScalarExprRef,
    },
    Bool {
        kind: BoolKind,
        args: Vec<ScalarExprRef>,
    },
}

impl ScalarExpr {
    pub fn column(col: ColId) -> ScalarExprRef {
        Arc::new(ScalarExpr::Column(col))
    }

    pub fn literal(datum: Datum) -> ScalarExprRef {
        Arc::new(ScalarExpr::Literal(datum))
    }

    pub fn cmp(kind: CmpKind, left: ScalarExprRef, right: ScalarExprRef) -> ScalarExprRef {
        Arc::new(ScalarExpr::Cmp { kind, left, right })
    }

    pub fn col_eq(left: ColId, right: ColId) -> ScalarExprRef {
        Self::cmp(CmpKind::Eq, Self::column(left), Self::column(right))
    }

    pub fn conj(kind: BoolKind, args: Vec<ScalarExprRef>) -> ScalarExprRef {
        Arc::new(ScalarExpr::Bool { kind, args })
    }

    /// All column identities referenced anywhere in the tree.
    pub fn used_columns(&self) -> ColumnRefSet {
        let mut cols = ColumnRefSet::new();
        self.collect_columns(&mut cols);
        cols
    }

    fn collect_columns(&self, out: &mut ColumnRefSet) {
        match self {
            ScalarExpr::Column(col) => {
                out.insert(*col);
            }
            ScalarExpr::Literal(_) => {}
            ScalarExpr::Cmp { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            ScalarExpr::Bool { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }

    /// Column equality pairs usable as hash join keys. A top-level `AND`
    /// contributes all conjuncts; anything other than `col = col` yields
    /// nothing.
    pub fn equi_join_keys(&self) -> Vec<(ColId, ColId)> {
        match self {
            ScalarExpr::Cmp {
                kind: CmpKind::Eq,
                left,
                right,
            } => match (left.as_ref(), right.as_ref()) {
                (ScalarExpr::Column(l), ScalarExpr::Column(r)) => vec![(*l, *r)],
                _ => vec![],
            },
            ScalarExpr::Bool {
                kind: BoolKind::And,
                args,
            } => args.iter().flat_map(|arg| arg.equi_join_keys()).collect(),
            _ => vec![],
        }
    }
}

impl Debug for ScalarExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarExpr::Column(col) => write!(f, "{:?}", col),
            ScalarExpr::Literal(datum) => write!(f, "{:?}", datum),
            ScalarExpr::Cmp { kind, left, right } => {
                write!(f, "({:?} {:?} {:?})", left, kind, right)
            }
            ScalarExpr::Bool { kind, args } => {
                write!(f, "{:?}{:?}", kind, args)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_used_columns() {
        let pred = ScalarExpr::conj(
            BoolKind::And,
            vec![
                ScalarExpr::col_eq(ColId(1), ColId(5)),
                ScalarExpr::cmp(
                    CmpKind::Gt,
                    ScalarExpr::column(ColId(2)),
                    ScalarExpr::literal(Datum::Int(10)),
                ),
            ],
        );

        let cols = pred.used_columns();
        assert_eq!(3, cols.len());
        assert!(cols.contains(ColId(5)));
    }

    #[test]
    fn test_equi_join_keys() {
        let eq = ScalarExpr::col_eq(ColId(1), ColId(5));
        assert_eq!(vec![(ColId(1), ColId(5))], eq.equi_join_keys());

        let non_eq = ScalarExpr::cmp(
            CmpKind::Lt,
            ScalarExpr::column(ColId(1)),
            ScalarExpr::column(ColId(5)),
        );
        assert!(non_eq.equi_join_keys().is_empty());

        let conj = ScalarExpr::conj(
            BoolKind::And,
            vec![
                ScalarExpr::col_eq(ColId(1), ColId(5)),
                ScalarExpr::col_eq(ColId(2), ColId(6)),
            ],
        );
        assert_eq!(2, conj.equi_join_keys().len());
    }
}
