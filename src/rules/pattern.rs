use crate::operator::Operator;

pub type OperatorMatcher = fn(&Operator) -> bool;

/// A pattern defines the memo subtree a rule operates on.
///
/// The root matcher runs against a concrete group expression. Children are
/// either pinned to an exact list, where a [`ChildPattern::Leaf`] accepts any
/// subtree and binds the child group wholesale while a nested node descends
/// into the child group's logical members, or left open with
/// [`ChildPolicy::MultiLeaf`] for variable-arity operators.
pub struct Pattern {
    pub matcher: OperatorMatcher,
    pub children: ChildPolicy,
}

pub enum ChildPolicy {
    /// Exact child list; arity must match.
    Fixed(Vec<ChildPattern>),
    /// Any number of children, none examined.
    MultiLeaf,
}

pub enum ChildPattern {
    /// Wildcard: binds the child group without enumerating its members.
    Leaf,
    /// Recursive match against the child group's logical members.
    Node(Pattern),
}

impl Pattern {
    pub fn node<I: IntoIterator<Item = ChildPattern>>(
        matcher: OperatorMatcher,
        children: I,
    ) -> Pattern {
        Pattern {
            matcher,
            children: ChildPolicy::Fixed(children.into_iter().collect()),
        }
    }

    pub fn nullary(matcher: OperatorMatcher) -> Pattern {
        Self::node(matcher, vec![])
    }

    pub fn unary(matcher: OperatorMatcher) -> Pattern {
        Self::node(matcher, vec![ChildPattern::Leaf])
    }

    pub fn binary(matcher: OperatorMatcher) -> Pattern {
        Self::node(matcher, vec![ChildPattern::Leaf, ChildPattern::Leaf])
    }

    pub fn multi_leaf(matcher: OperatorMatcher) -> Pattern {
        Pattern {
            matcher,
            children: ChildPolicy::MultiLeaf,
        }
    }

    pub fn matches_root(&self, op: &Operator) -> bool {
        (self.matcher)(op)
    }
}

pub fn any(_: &Operator) -> bool {
    true
}
