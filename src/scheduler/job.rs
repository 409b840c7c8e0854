use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::scheduler::JobQueue;
use crate::search::JobImpl;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JobState {
    Init,
    Queued,
    Running,
    SuspendedOnChild,
    Completed,
}

pub type JobRef = Arc<JobHandle>;

/// Scheduler-side wrapper around a job body. The body is taken out while the
/// job runs so the handle can be shared with child jobs and queues without
/// aliasing the mutable state machine inside.
pub struct JobHandle {
    body: Mutex<Option<JobImpl>>,
    state: Mutex<JobState>,
    /// Children still live; the job is requeued when this drops to zero.
    pending_children: AtomicUsize,
    parent: Option<JobRef>,
}

impl JobHandle {
    pub(crate) fn root(body: JobImpl) -> JobRef {
        Arc::new(Self {
            body: Mutex::new(Some(body)),
            state: Mutex::new(JobState::Init),
            pending_children: AtomicUsize::new(0),
            parent: None,
        })
    }

    pub(crate) fn child(body: JobImpl, parent: JobRef) -> JobRef {
        Arc::new(Self {
            body: Mutex::new(Some(body)),
            state: Mutex::new(JobState::Init),
            pending_children: AtomicUsize::new(0),
            parent: Some(parent),
        })
    }

    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: JobState) {
        *self.state.lock() = state;
    }

    pub(crate) fn take_body(&self) -> Option<JobImpl> {
        self.body.lock().take()
    }

    pub(crate) fn put_body(&self, body: JobImpl) {
        *self.body.lock() = Some(body);
    }

    pub(crate) fn parent(&self) -> Option<&JobRef> {
        self.parent.as_ref()
    }

    pub(crate) fn expect_children(&self, n: usize) {
        self.pending_children.store(n, Ordering::Release);
    }

    /// Returns `true` when the calling child was the last one.
    pub(crate) fn child_finished(&self) -> bool {
        self.pending_children.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

/// What a finished `execute` call asks the scheduler to do with the job.
pub(crate) enum JobControl {
    /// The job is complete; notify its parent.
    Done,
    /// Requeue immediately; the state machine advanced and has more to do.
    Rerun,
    /// Suspend until every spawned child completes, then requeue.
    Spawn(Vec<JobImpl>),
    /// Suspend on the queue; its executor's completion requeues the job.
    Park(Arc<JobQueue>),
}
