use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use enumset::EnumSet;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::cost::INF;
use crate::memo::CostContext;
use crate::operator::Operator;
use crate::properties::{LogicalProperty, PhysicalPropertySet};
use crate::rules::RuleId;
use crate::scheduler::JobQueue;
use crate::stats::Statistics;

/// Index of a group in the memo arena.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Ord, PartialOrd)]
pub struct GroupId(pub u32);

impl Debug for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a group expression: the arena slot it was created in plus its
/// position there. Stable across group merges; the owning slot never moves.
#[derive(Hash, Eq, PartialEq, Clone, Copy)]
pub struct ExprId {
    pub group: GroupId,
    pub idx: u32,
}

impl ExprId {
    pub fn new(group: GroupId, idx: u32) -> Self {
        Self { group, idx }
    }
}

impl Debug for ExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.group, self.idx)
    }
}

impl Display for ExprId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Structural identity used for dedup: operator plus child group identities.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct GroupExprKey {
    pub operator: Operator,
    pub inputs: SmallVec<[GroupId; 2]>,
}

/// One operator-plus-child-groups alternative inside a group.
pub struct GroupExpression {
    id: ExprId,
    operator: Operator,
    inputs: SmallVec<[GroupId; 2]>,
    /// Rule that produced this expression, used by pairwise compatibility
    /// checks to stop mutual regeneration.
    origin_rule: Option<RuleId>,
    /// Enforcers reference their own group as input; group optimization
    /// skips them and plans fresh enforcement per request instead.
    is_enforcer: bool,
    /// Rules already applied to this expression.
    applied_rules: Mutex<EnumSet<RuleId>>,
    /// Realized cost contexts, at most one per required property signature.
    cost_ctxs: Mutex<HashMap<PhysicalPropertySet, CostContext>>,
    /// Set when a group merge collapses this expression onto a structurally
    /// identical survivor.
    retired: AtomicBool,
}

impl GroupExpression {
    fn new(
        id: ExprId,
        operator: Operator,
        inputs: SmallVec<[GroupId; 2]>,
        origin_rule: Option<RuleId>,
        is_enforcer: bool,
    ) -> Self {
        Self {
            id,
            operator,
            inputs,
            origin_rule,
            is_enforcer,
            applied_rules: Mutex::new(EnumSet::new()),
            cost_ctxs: Mutex::new(HashMap::new()),
            retired: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn inputs(&self) -> &[GroupId] {
        &self.inputs
    }

    pub fn origin_rule(&self) -> Option<RuleId> {
        self.origin_rule
    }

    pub fn is_enforcer(&self) -> bool {
        self.is_enforcer
    }

    pub fn is_logical(&self) -> bool {
        self.operator.is_logical()
    }

    pub fn is_physical(&self) -> bool {
        self.operator.is_physical()
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub fn is_rule_applied(&self, rule: RuleId) -> bool {
        self.applied_rules.lock().contains(rule)
    }

    /// Test-and-set of the applied mask. Returns `true` when the caller is
    /// the one that marked it, so each (expression, rule) pair is applied at
    /// most once no matter how many jobs race here.
    pub(crate) fn mark_rule_applied(&self, rule: RuleId) -> bool {
        self.applied_rules.lock().insert(rule)
    }

    pub(crate) fn reset_applied_rules(&self) {
        *self.applied_rules.lock() = EnumSet::new();
    }

    pub fn cost_ctx(&self, required: &PhysicalPropertySet) -> Option<CostContext> {
        self.cost_ctxs.lock().get(required).cloned()
    }

    /// Keep the cheaper context per required property signature.
    pub(crate) fn record_cost_ctx(&self, ctx: CostContext) {
        let mut ctxs = self.cost_ctxs.lock();
        let current = ctxs.get(&ctx.required).map(|c| c.cost).unwrap_or(INF);
        if ctx.cost < current {
            ctxs.insert(ctx.required.clone(), ctx);
        }
    }
}

impl Debug for GroupExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {:?} {:?}", self.id, self.operator, self.inputs)
    }
}

/// An equivalence class of logically equivalent expressions.
pub struct Group {
    id: GroupId,
    /// Shared by all member expressions; derived once at creation.
    logical_prop: LogicalProperty,
    stats: RwLock<Option<Arc<Statistics>>>,
    members: Mutex<Vec<Arc<GroupExpression>>>,
    /// Groups merged into this one; their members now belong here.
    absorbed: Mutex<Vec<GroupId>>,
    /// Canonical group once this one is merged away. Never cleared.
    duplicate_of: Mutex<Option<GroupId>>,
    /// Best cost context found so far per required property signature.
    best_ctxs: Mutex<HashMap<PhysicalPropertySet, CostContext>>,
    explore_queue: Arc<JobQueue>,
    implement_queue: Arc<JobQueue>,
    opt_queues: Mutex<HashMap<PhysicalPropertySet, Arc<JobQueue>>>,
}

impl Group {
    pub(crate) fn new(id: GroupId, logical_prop: LogicalProperty) -> Self {
        Self {
            id,
            logical_prop,
            stats: RwLock::new(None),
            members: Mutex::new(Vec::new()),
            absorbed: Mutex::new(Vec::new()),
            duplicate_of: Mutex::new(None),
            best_ctxs: Mutex::new(HashMap::new()),
            explore_queue: Arc::new(JobQueue::new()),
            implement_queue: Arc::new(JobQueue::new()),
            opt_queues: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    pub fn stats(&self) -> Option<Arc<Statistics>> {
        self.stats.read().clone()
    }

    pub(crate) fn set_stats(&self, stats: Arc<Statistics>) {
        *self.stats.write() = Some(stats);
    }

    pub(crate) fn clear_stats(&self) {
        *self.stats.write() = None;
    }

    pub fn duplicate_of(&self) -> Option<GroupId> {
        *self.duplicate_of.lock()
    }

    /// Members created in this arena slot, including retired ones.
    pub(crate) fn local_members(&self) -> Vec<Arc<GroupExpression>> {
        self.members.lock().clone()
    }

    pub(crate) fn absorbed_groups(&self) -> Vec<GroupId> {
        self.absorbed.lock().clone()
    }

    pub(crate) fn push_member(
        &self,
        operator: Operator,
        inputs: SmallVec<[GroupId; 2]>,
        origin_rule: Option<RuleId>,
        is_enforcer: bool,
    ) -> Arc<GroupExpression> {
        let mut members = self.members.lock();
        let id = ExprId::new(self.id, members.len() as u32);
        let expr = Arc::new(GroupExpression::new(
            id, operator, inputs, origin_rule, is_enforcer,
        ));
        members.push(expr.clone());
        expr
    }

    pub(crate) fn member_at(&self, idx: u32) -> Option<Arc<GroupExpression>> {
        self.members.lock().get(idx as usize).cloned()
    }

    pub fn best_ctx(&self, required: &PhysicalPropertySet) -> Option<CostContext> {
        self.best_ctxs.lock().get(required).cloned()
    }

    /// Keep the cheaper context per required property signature. An absent
    /// entry counts as infinitely expensive.
    pub(crate) fn update_best(&self, required: &PhysicalPropertySet, ctx: CostContext) {
        let mut best = self.best_ctxs.lock();
        let current = best.get(required).map(|c| c.cost).unwrap_or(INF);
        if ctx.cost < current {
            best.insert(required.clone(), ctx);
        }
    }

    pub(crate) fn explore_queue(&self) -> Arc<JobQueue> {
        self.explore_queue.clone()
    }

    pub(crate) fn implement_queue(&self) -> Arc<JobQueue> {
        self.implement_queue.clone()
    }

    pub(crate) fn opt_queue(&self, required: &PhysicalPropertySet) -> Arc<JobQueue> {
        self.opt_queues
            .lock()
            .entry(required.clone())
            .or_insert_with(|| Arc::new(JobQueue::new()))
            .clone()
    }

    /// Fold a merged-away group into this one. Single-threaded: runs only at
    /// stage boundaries.
    pub(crate) fn absorb(&self, loser: &Group) {
        {
            let mut absorbed = self.absorbed.lock();
            absorbed.push(loser.id);
            absorbed.append(&mut loser.absorbed.lock());
        }
        *loser.duplicate_of.lock() = Some(self.id);

        let loser_best: Vec<_> = loser.best_ctxs.lock().drain().collect();
        for (required, ctx) in loser_best {
            self.update_best(&required, ctx);
        }

        // Absorbed members may be unexplored; let the next stage revisit.
        // Applied-rule masks keep the revisit idempotent.
        self.explore_queue.reset();
        self.implement_queue.reset();
    }

    /// Reset per-stage search state, keeping memo contents and winners.
    pub(crate) fn reset_state(&self) {
        self.explore_queue.reset();
        self.implement_queue.reset();
        self.opt_queues.lock().clear();
        for member in self.members.lock().iter() {
            member.reset_applied_rules();
        }
    }
}
