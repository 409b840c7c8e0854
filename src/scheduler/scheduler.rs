use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, trace};
use parking_lot::{Condvar, Mutex};

use crate::error::{OptError, OptResult};
use crate::scheduler::{JobControl, JobHandle, JobRef, JobState};
use crate::search::{Job, JobImpl, SearchContext};

/// Runs one search phase on a fixed worker pool. Cheap to clone; clones share
/// the same run state so jobs can enqueue follow-up work through the copy in
/// their context.
#[derive(Clone)]
pub struct Scheduler {
    core: Arc<SchedulerCore>,
}

struct SchedulerCore {
    ready: Mutex<VecDeque<JobRef>>,
    work_available: Condvar,
    /// Jobs created and not yet completed. Workers exit at zero.
    live: AtomicUsize,
    aborted: AtomicBool,
    first_error: Mutex<Option<OptError>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            core: Arc::new(SchedulerCore {
                ready: Mutex::new(VecDeque::new()),
                work_available: Condvar::new(),
                live: AtomicUsize::new(0),
                aborted: AtomicBool::new(false),
                first_error: Mutex::new(None),
            }),
        }
    }

    /// Stop the phase; in-flight jobs finish their current step and workers
    /// drain. The first recorded error is what `run` returns.
    pub fn abort(&self, err: OptError) {
        {
            let mut first = self.core.first_error.lock();
            if first.is_none() {
                *first = Some(err);
            }
        }
        self.core.aborted.store(true, Ordering::Release);
        self.core.work_available.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.core.aborted.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn queued_jobs(&self) -> usize {
        self.core.ready.lock().len()
    }

    pub(crate) fn enqueue(&self, job: JobRef) {
        job.set_state(JobState::Queued);
        self.core.ready.lock().push_back(job);
        self.core.work_available.notify_one();
    }

    /// Run `root` and everything it spawns to completion on `workers`
    /// threads. Returns the first job error, if any.
    pub(crate) fn run(&self, ctx: &SearchContext, root: JobImpl, workers: usize) -> OptResult<()> {
        let workers = workers.max(1);
        self.core.live.store(1, Ordering::Release);
        self.enqueue(JobHandle::root(root));

        thread::scope(|scope| -> OptResult<()> {
            for i in 0..workers {
                thread::Builder::new()
                    .name(format!("opt-worker-{}", i))
                    .spawn_scoped(scope, || self.worker_loop(ctx))
                    .map_err(|e| OptError::internal(format!("worker spawn failed: {}", e)))?;
            }
            Ok(())
        })?;

        if let Some(err) = self.core.first_error.lock().take() {
            return Err(err);
        }
        debug!("search phase complete");
        Ok(())
    }

    fn worker_loop(&self, ctx: &SearchContext) {
        let core = &*self.core;
        loop {
            let job = {
                let mut ready = core.ready.lock();
                loop {
                    if core.aborted.load(Ordering::Acquire) {
                        return;
                    }
                    if let Some(job) = ready.pop_front() {
                        break job;
                    }
                    if core.live.load(Ordering::Acquire) == 0 {
                        // Everyone else may be waiting on this condition too.
                        core.work_available.notify_all();
                        return;
                    }
                    core.work_available.wait(&mut ready);
                }
            };
            if let Err(err) = self.run_job(ctx, &job) {
                self.abort(err);
                return;
            }
        }
    }

    fn run_job(&self, ctx: &SearchContext, job: &JobRef) -> OptResult<()> {
        ctx.ensure_active()?;
        job.set_state(JobState::Running);
        let mut body = job
            .take_body()
            .ok_or_else(|| OptError::internal("job scheduled without a body"))?;
        let control = body.execute(ctx);
        job.put_body(body);

        match control? {
            JobControl::Done => self.complete(job),
            JobControl::Rerun => self.enqueue(job.clone()),
            JobControl::Spawn(children) => {
                if children.is_empty() {
                    self.enqueue(job.clone());
                } else {
                    trace!("job spawns {} children", children.len());
                    job.set_state(JobState::SuspendedOnChild);
                    job.expect_children(children.len());
                    self.core.live.fetch_add(children.len(), Ordering::AcqRel);
                    for child in children {
                        self.enqueue(JobHandle::child(child, job.clone()));
                    }
                }
            }
            JobControl::Park(queue) => {
                job.set_state(JobState::SuspendedOnChild);
                queue.park(job.clone(), self);
            }
        }
        Ok(())
    }

    fn complete(&self, job: &JobRef) {
        job.set_state(JobState::Completed);
        if let Some(parent) = job.parent() {
            if parent.child_finished() {
                self.enqueue(parent.clone());
            }
        }
        if self.core.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.core.work_available.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::LogicalExprBuilder;
    use crate::memo::Memo;
    use crate::operator::ScalarExpr;
    use crate::rules::RuleSet;
    use crate::search::ExploreGroupJob;
    use crate::test_utils::TestCatalog;
    use enumset::EnumSet;

    #[test]
    fn test_explore_runs_on_multiple_workers() {
        let cat = TestCatalog::new();
        let memo = Arc::new(Memo::new());
        let right = LogicalExprBuilder::new().get(&cat.t2).build();
        let pred = ScalarExpr::col_eq(cat.col(&cat.t1, 0), cat.col(&cat.t2, 0));
        let expr = LogicalExprBuilder::new()
            .get(&cat.t1)
            .join(pred, right)
            .build();
        let root = memo.insert_expr_tree(&expr, None).unwrap();
        memo.set_root(root);

        let sched = Scheduler::new();
        let ctx = SearchContext::new(
            memo.clone(),
            RuleSet::cascades(),
            cat.provider.clone(),
            EnumSet::new(),
            sched.clone(),
            Arc::new(AtomicUsize::new(1000)),
            None,
        );
        sched
            .run(&ctx, ExploreGroupJob::new(root).into(), 4)
            .unwrap();
        memo.merge_duplicates();

        // Commutativity produced the swapped join inside the root group.
        assert_eq!(2, memo.members(root).len());
    }

    #[test]
    fn test_abort_returns_first_error() {
        let sched = Scheduler::new();
        sched.abort(OptError::internal("first"));
        sched.abort(OptError::internal("second"));
        assert!(sched.is_aborted());
        let err = sched.core.first_error.lock().take().unwrap();
        assert!(err.to_string().contains("first"));
    }
}
