//! Search jobs.
//!
//! Each stage phase is a tree of small jobs: group jobs own a [`JobQueue`]
//! slot so every group is explored, implemented or optimized under a given
//! request exactly once, expression jobs fan out over group members, and
//! xform jobs run one rule against one expression. Jobs communicate only
//! through the memo and the scheduler's suspend/requeue protocol, never by
//! blocking.

mod context;
pub(crate) use context::*;
mod explore;
pub(crate) use explore::*;
mod implement;
pub(crate) use implement::*;
mod optimize;
pub(crate) use optimize::*;
mod xform;
pub(crate) use xform::*;

use enum_dispatch::enum_dispatch;

use crate::error::OptResult;
use crate::scheduler::JobControl;

#[enum_dispatch(JobImpl)]
pub(crate) trait Job {
    /// Run one step of the job's state machine.
    fn execute(&mut self, ctx: &SearchContext) -> OptResult<JobControl>;
}

#[enum_dispatch]
#[derive(Debug)]
pub(crate) enum JobImpl {
    ExploreGroupJob,
    ExploreExprJob,
    ImplementGroupJob,
    ImplementExprJob,
    ApplyXformJob,
    OptimizeGroupJob,
    OptimizeExprJob,
}
