use crate::error::OptResult;
use crate::memo::{ExprId, GroupId};
use crate::scheduler::{AcquireResult, JobControl};
use crate::search::{xform_jobs, Job, JobImpl, SearchContext, XformMode};

/// Explore a group: run every exploration rule over every logical member,
/// transitively. The group's explore queue makes this happen once per stage
/// however many parents request it.
#[derive(Debug)]
pub(crate) struct ExploreGroupJob {
    group: GroupId,
    phase: ExploreGroupPhase,
}

#[derive(Debug)]
enum ExploreGroupPhase {
    Begin,
    Finish,
}

impl ExploreGroupJob {
    pub(crate) fn new(group: GroupId) -> Self {
        Self {
            group,
            phase: ExploreGroupPhase::Begin,
        }
    }
}

impl Job for ExploreGroupJob {
    fn execute(&mut self, ctx: &SearchContext) -> OptResult<JobControl> {
        match self.phase {
            ExploreGroupPhase::Begin => {
                let group = ctx.memo().group(self.group);
                match group.explore_queue().try_acquire() {
                    AcquireResult::Done => Ok(JobControl::Done),
                    AcquireResult::Busy => Ok(JobControl::Park(group.explore_queue())),
                    AcquireResult::Acquired => {
                        self.phase = ExploreGroupPhase::Finish;
                        let children: Vec<JobImpl> = ctx
                            .memo()
                            .members(self.group)
                            .into_iter()
                            .filter(|m| m.is_logical())
                            .map(|m| ExploreExprJob::new(m.id()).into())
                            .collect();
                        Ok(JobControl::Spawn(children))
                    }
                }
            }
            ExploreGroupPhase::Finish => {
                let group = ctx.memo().group(self.group);
                group.explore_queue().complete(ctx.sched());
                Ok(JobControl::Done)
            }
        }
    }
}

/// Explore one expression: first its input groups, then the exploration
/// rules against it. Rules producing new logical members chain follow-up
/// expression jobs until no rule fires, which terminates because applied
/// masks and the xform budget are both finite.
#[derive(Debug)]
pub(crate) struct ExploreExprJob {
    expr: ExprId,
    phase: ExploreExprPhase,
}

#[derive(Debug)]
enum ExploreExprPhase {
    ExploreInputs,
    ApplyRules,
    Finish,
}

impl ExploreExprJob {
    pub(crate) fn new(expr: ExprId) -> Self {
        Self {
            expr,
            phase: ExploreExprPhase::ExploreInputs,
        }
    }
}

impl Job for ExploreExprJob {
    fn execute(&mut self, ctx: &SearchContext) -> OptResult<JobControl> {
        match self.phase {
            ExploreExprPhase::ExploreInputs => {
                self.phase = ExploreExprPhase::ApplyRules;
                let expr = ctx.memo().expr(self.expr)?;
                let children: Vec<JobImpl> = expr
                    .inputs()
                    .iter()
                    .map(|g| ExploreGroupJob::new(*g).into())
                    .collect();
                Ok(JobControl::Spawn(children))
            }
            ExploreExprPhase::ApplyRules => {
                self.phase = ExploreExprPhase::Finish;
                let expr = ctx.memo().expr(self.expr)?;
                let jobs = xform_jobs(ctx, &expr, &ctx.rules().exploration, XformMode::Exploration);
                Ok(JobControl::Spawn(jobs))
            }
            ExploreExprPhase::Finish => Ok(JobControl::Done),
        }
    }
}
