//! Cascades-style cost-based optimizer search core.
//!
//! ## Background
//!
//! The crate implements the search half of a cost-based query optimizer: it
//! accepts a logical expression tree plus required physical properties and
//! returns the minimum-cost physical expression tree, or reports that none
//! satisfies the requirements. The search strategy is the top-down,
//! memoizing one from the Cascades line of optimizers [1]: logically
//! equivalent expressions are folded into groups inside a [`memo::Memo`],
//! transformation rules enumerate alternatives per group rather than per
//! plan, and dynamic programming over (group, required properties) pairs
//! prunes duplicated costing work. Search runs concurrently on a pool of
//! worker threads coordinated by a cooperative job [`scheduler`], following
//! the architecture of Orca [2].
//!
//! ## Design
//!
//! * [`expr`] Immutable operator trees, the optimizer's input and output.
//! * [`operator`] Logical and physical relational operators.
//! * [`properties`] Logical properties, physical property vectors and
//!   enforcement.
//! * [`memo`] Groups, group expressions, deduplication and plan extraction.
//! * [`rules`] Pattern-matched transformation rules.
//! * [`scheduler`] Cooperative multithreaded job scheduler.
//! * [`engine`] The stage machine driving exploration, implementation and
//!   optimization.
//!
//! ## Reference
//!
//! 1. Graefe, G., 1995. The cascades framework for query optimization. IEEE
//! Data Eng. Bull., 18(3), pp.19-29.
//! 2. Soliman, M.A., Antova, L., Raghavan, V., El-Helw, A., Gu, Z., Shen, E.,
//! Caragea, G.C., Garcia-Alvarado, C., Rahman, F., Petropoulos, M. and Waas,
//! F., 2014, June. Orca: a modular query optimizer architecture for big data.
//! In Proceedings of the 2014 ACM SIGMOD international conference on
//! Management of data (pp. 337-348).

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

pub mod columns;
pub mod cost;
pub mod engine;
pub mod error;
pub mod expr;
pub mod memo;
pub mod metadata;
pub mod operator;
pub mod properties;
pub mod rules;
pub mod scheduler;
pub(crate) mod search;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_utils;
