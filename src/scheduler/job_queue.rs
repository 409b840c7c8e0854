use parking_lot::Mutex;

use crate::scheduler::{JobRef, Scheduler};

/// Execution slot for one unit of group work, e.g. exploring a group or
/// optimizing it under one property request. At most one job ever executes
/// the work; any number of concurrent requesters park and are requeued when
/// the executor completes the slot.
pub struct JobQueue {
    state: Mutex<QueueState>,
}

enum QueueState {
    Idle,
    Running { waiters: Vec<JobRef> },
    Done,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AcquireResult {
    /// The caller is now the executor and must eventually call `complete`.
    Acquired,
    /// Another job is executing; park and retry once woken.
    Busy,
    /// The work is already done; its results are visible.
    Done,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::Idle),
        }
    }

    pub fn try_acquire(&self) -> AcquireResult {
        let mut state = self.state.lock();
        match *state {
            QueueState::Idle => {
                *state = QueueState::Running { waiters: Vec::new() };
                AcquireResult::Acquired
            }
            QueueState::Running { .. } => AcquireResult::Busy,
            QueueState::Done => AcquireResult::Done,
        }
    }

    /// Park a job until the executor completes. The executor may have
    /// finished between the `Busy` answer and this call, in which case the
    /// job is requeued right away and will observe `Done` on retry.
    pub(crate) fn park(&self, job: JobRef, sched: &Scheduler) {
        let mut state = self.state.lock();
        match &mut *state {
            QueueState::Running { waiters } => waiters.push(job),
            QueueState::Idle | QueueState::Done => {
                drop(state);
                sched.enqueue(job);
            }
        }
    }

    /// Mark the work done and requeue every parked waiter.
    pub fn complete(&self, sched: &Scheduler) {
        let waiters = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, QueueState::Done) {
                QueueState::Running { waiters } => waiters,
                _ => Vec::new(),
            }
        };
        for waiter in waiters {
            sched.enqueue(waiter);
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(*self.state.lock(), QueueState::Done)
    }

    /// Back to `Idle` so a later stage redoes the work. Only valid between
    /// phases, when no executor or waiter exists.
    pub(crate) fn reset(&self) {
        *self.state.lock() = QueueState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    use super::*;
    use crate::memo::GroupId;
    use crate::scheduler::JobHandle;
    use crate::search::ExploreGroupJob;
    use crate::test_utils::init_logger;

    #[test]
    fn test_single_acquire() {
        let queue = JobQueue::new();
        assert_eq!(AcquireResult::Acquired, queue.try_acquire());
        assert_eq!(AcquireResult::Busy, queue.try_acquire());
        assert!(!queue.is_done());
    }

    #[test]
    fn test_one_executor_among_concurrent_requesters() {
        init_logger();
        let queue = JobQueue::new();
        let sched = Scheduler::new();
        let executions = AtomicUsize::new(0);
        let served = AtomicUsize::new(0);
        let parked = AtomicUsize::new(0);
        let requesters = 8;
        let barrier = Barrier::new(requesters);

        std::thread::scope(|scope| {
            for _ in 0..requesters {
                scope.spawn(|| {
                    barrier.wait();
                    let mut waiting = false;
                    loop {
                        match queue.try_acquire() {
                            AcquireResult::Acquired => {
                                executions.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(Duration::from_millis(2));
                                queue.complete(&sched);
                                served.fetch_add(1, Ordering::SeqCst);
                                return;
                            }
                            AcquireResult::Busy => {
                                if !waiting {
                                    waiting = true;
                                    parked.fetch_add(1, Ordering::SeqCst);
                                    let job =
                                        JobHandle::root(ExploreGroupJob::new(GroupId(0)).into());
                                    queue.park(job, &sched);
                                }
                                std::thread::yield_now();
                            }
                            AcquireResult::Done => {
                                served.fetch_add(1, Ordering::SeqCst);
                                return;
                            }
                        }
                    }
                });
            }
        });

        assert_eq!(1, executions.load(Ordering::SeqCst));
        assert_eq!(requesters, served.load(Ordering::SeqCst));
        // Every parked waiter got requeued, whether it parked before or
        // after the executor completed.
        assert_eq!(parked.load(Ordering::SeqCst), sched.queued_jobs());
    }

    #[test]
    fn test_reset_reopens_done_queue() {
        let queue = JobQueue::new();
        assert_eq!(AcquireResult::Acquired, queue.try_acquire());
        *queue.state.lock() = QueueState::Done;
        assert_eq!(AcquireResult::Done, queue.try_acquire());
        queue.reset();
        assert_eq!(AcquireResult::Acquired, queue.try_acquire());
    }
}
