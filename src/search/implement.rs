use crate::error::OptResult;
use crate::memo::{ExprId, GroupId};
use crate::scheduler::{AcquireResult, JobControl};
use crate::search::{xform_jobs, Job, JobImpl, SearchContext, XformMode};

/// Implement a group: run the implementation rules over every logical
/// member so each group holds physical alternatives before optimization
/// costs them.
#[derive(Debug)]
pub(crate) struct ImplementGroupJob {
    group: GroupId,
    phase: ImplementGroupPhase,
}

#[derive(Debug)]
enum ImplementGroupPhase {
    Begin,
    Finish,
}

impl ImplementGroupJob {
    pub(crate) fn new(group: GroupId) -> Self {
        Self {
            group,
            phase: ImplementGroupPhase::Begin,
        }
    }
}

impl Job for ImplementGroupJob {
    fn execute(&mut self, ctx: &SearchContext) -> OptResult<JobControl> {
        match self.phase {
            ImplementGroupPhase::Begin => {
                let group = ctx.memo().group(self.group);
                match group.implement_queue().try_acquire() {
                    AcquireResult::Done => Ok(JobControl::Done),
                    AcquireResult::Busy => Ok(JobControl::Park(group.implement_queue())),
                    AcquireResult::Acquired => {
                        self.phase = ImplementGroupPhase::Finish;
                        let children: Vec<JobImpl> = ctx
                            .memo()
                            .members(self.group)
                            .into_iter()
                            .filter(|m| m.is_logical())
                            .map(|m| ImplementExprJob::new(m.id()).into())
                            .collect();
                        Ok(JobControl::Spawn(children))
                    }
                }
            }
            ImplementGroupPhase::Finish => {
                let group = ctx.memo().group(self.group);
                group.implement_queue().complete(ctx.sched());
                Ok(JobControl::Done)
            }
        }
    }
}

/// Implement one logical expression after its input groups.
#[derive(Debug)]
pub(crate) struct ImplementExprJob {
    expr: ExprId,
    phase: ImplementExprPhase,
}

#[derive(Debug)]
enum ImplementExprPhase {
    ImplementInputs,
    ApplyRules,
    Finish,
}

impl ImplementExprJob {
    pub(crate) fn new(expr: ExprId) -> Self {
        Self {
            expr,
            phase: ImplementExprPhase::ImplementInputs,
        }
    }
}

impl Job for ImplementExprJob {
    fn execute(&mut self, ctx: &SearchContext) -> OptResult<JobControl> {
        match self.phase {
            ImplementExprPhase::ImplementInputs => {
                self.phase = ImplementExprPhase::ApplyRules;
                let expr = ctx.memo().expr(self.expr)?;
                let children: Vec<JobImpl> = expr
                    .inputs()
                    .iter()
                    .map(|g| ImplementGroupJob::new(*g).into())
                    .collect();
                Ok(JobControl::Spawn(children))
            }
            ImplementExprPhase::ApplyRules => {
                self.phase = ImplementExprPhase::Finish;
                let expr = ctx.memo().expr(self.expr)?;
                let jobs = xform_jobs(
                    ctx,
                    &expr,
                    &ctx.rules().implementation,
                    XformMode::Implementation,
                );
                Ok(JobControl::Spawn(jobs))
            }
            ImplementExprPhase::Finish => Ok(JobControl::Done),
        }
    }
}
