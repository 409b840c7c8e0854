//! The memo: a deduplicated forest of equivalence groups.
//!
//! Groups live in a push-only arena and are never removed. Structural dedup
//! goes through a sharded index keyed by operator plus canonical child group
//! ids. When an insert proves two existing groups equivalent, the pair is
//! only recorded; the actual merge runs in [`Memo::merge_duplicates`] at
//! stage boundaries, when no search job is in flight. Canonical group
//! identity is a union-find over arena slots, so merged-away ids keep
//! resolving and no stored id is ever rewritten.

mod cost_context;
mod extract;
mod group;

pub use cost_context::*;
pub use extract::*;
pub use group::*;

use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use prettytable::Table;
use smallvec::SmallVec;

use crate::error::{OptError, OptResult};
use crate::expr::ExprRef;
use crate::metadata::MdAccessor;
use crate::operator::{LogicalOperatorTrait, Operator, PhysicalOperator};
use crate::properties::LogicalProperty;
use crate::rules::{OptExpr, OptExprNode, RuleId};
use crate::stats::Statistics;

const INDEX_SHARDS: usize = 16;

pub struct Memo {
    /// Push-only group arena. Slots never move; merged-away groups stay in
    /// place with `duplicate_of` set.
    groups: RwLock<Vec<Arc<Group>>>,
    /// Structural dedup index, sharded to spread insert contention.
    index: Vec<Mutex<HashMap<GroupExprKey, ExprId>>>,
    /// Union-find parents over arena slots.
    dup_parents: Mutex<Vec<u32>>,
    /// Equivalences discovered since the last merge. Only consumed at stage
    /// boundaries.
    pending_dups: Mutex<Vec<(GroupId, GroupId)>>,
    root: Mutex<Option<GroupId>>,
}

impl Default for Memo {
    fn default() -> Self {
        Self::new()
    }
}

impl Memo {
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(Vec::new()),
            index: (0..INDEX_SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
            dup_parents: Mutex::new(Vec::new()),
            pending_dups: Mutex::new(Vec::new()),
            root: Mutex::new(None),
        }
    }

    /// Canonical group id for `id`, following recorded merges.
    pub fn find(&self, id: GroupId) -> GroupId {
        let mut parents = self.dup_parents.lock();
        Self::find_in(&mut parents, id)
    }

    fn find_in(parents: &mut [u32], id: GroupId) -> GroupId {
        let mut cur = id.0;
        while parents[cur as usize] != cur {
            // Path halving keeps lookups near O(1).
            parents[cur as usize] = parents[parents[cur as usize] as usize];
            cur = parents[cur as usize];
        }
        GroupId(cur)
    }

    /// The group at `id` after canonicalization.
    pub fn group(&self, id: GroupId) -> Arc<Group> {
        let canonical = self.find(id);
        self.group_at(canonical)
    }

    /// The group occupying arena slot `id`, merged away or not.
    fn group_at(&self, id: GroupId) -> Arc<Group> {
        self.groups.read()[id.0 as usize].clone()
    }

    /// Expression lookup by stable id. Valid across merges since the owning
    /// arena slot never moves.
    pub fn expr(&self, id: ExprId) -> OptResult<Arc<GroupExpression>> {
        self.group_at(id.group)
            .member_at(id.idx)
            .ok_or_else(|| OptError::internal(format!("unknown expression {:?}", id)))
    }

    /// Live members of the canonical group owning `id`, including members of
    /// groups absorbed into it.
    pub fn members(&self, id: GroupId) -> Vec<Arc<GroupExpression>> {
        let group = self.group(id);
        let mut out: Vec<_> = group
            .local_members()
            .into_iter()
            .filter(|m| !m.is_retired())
            .collect();
        for absorbed in group.absorbed_groups() {
            out.extend(
                self.group_at(absorbed)
                    .local_members()
                    .into_iter()
                    .filter(|m| !m.is_retired()),
            );
        }
        out
    }

    pub fn set_root(&self, root: GroupId) {
        *self.root.lock() = Some(root);
    }

    pub fn root_group(&self) -> OptResult<GroupId> {
        let root = *self.root.lock();
        root.map(|g| self.find(g))
            .ok_or_else(|| OptError::internal("memo has no root group"))
    }

    pub fn num_groups(&self) -> usize {
        self.groups.read().len()
    }

    pub fn num_canonical_groups(&self) -> usize {
        self.groups
            .read()
            .iter()
            .filter(|g| g.duplicate_of().is_none())
            .count()
    }

    /// Insert a whole expression tree, bottom-up. Returns the canonical group
    /// of the root.
    pub fn insert_expr_tree(&self, expr: &ExprRef, origin: Option<RuleId>) -> OptResult<GroupId> {
        let mut inputs = Vec::with_capacity(expr.children().len());
        for child in expr.children() {
            inputs.push(self.insert_expr_tree(child, origin)?);
        }
        let (id, _) = self.insert_expr(expr.op().clone(), inputs, None, origin, false)?;
        Ok(self.find(id.group))
    }

    /// Insert one expression. With a target group, the expression joins that
    /// group; without one, a fresh group is created (logical operators only,
    /// since group properties derive from a logical member).
    ///
    /// Returns the expression id and whether it was newly created. A hit in a
    /// group other than the target records the two groups as duplicates
    /// instead of merging them here.
    pub fn insert_expr(
        &self,
        operator: Operator,
        inputs: Vec<GroupId>,
        target: Option<GroupId>,
        origin: Option<RuleId>,
        is_enforcer: bool,
    ) -> OptResult<(ExprId, bool)> {
        if let Some(arity) = operator.arity() {
            if arity != inputs.len() {
                return Err(OptError::internal(format!(
                    "operator {:?} expects {} inputs, got {}",
                    operator,
                    arity,
                    inputs.len()
                )));
            }
        }

        let inputs: SmallVec<[GroupId; 2]> = inputs.into_iter().map(|g| self.find(g)).collect();
        let target = target.map(|g| self.find(g));
        let key = GroupExprKey { operator, inputs };
        let mut shard = self.index[self.shard_of(&key)].lock();

        if let Some(existing) = shard.get(&key).copied() {
            let home = self.find(existing.group);
            if let Some(target) = target {
                if target != home {
                    self.mark_duplicate(target, home);
                }
            }
            return Ok((existing, false));
        }

        let group = match target {
            Some(g) => self.group_at(g),
            None => {
                let op = match &key.operator {
                    Operator::Logical(op) => op,
                    Operator::Physical(_) => {
                        return Err(OptError::internal(
                            "physical expression inserted without a target group",
                        ))
                    }
                };
                let child_props: Vec<LogicalProperty> = key
                    .inputs
                    .iter()
                    .map(|g| self.group_at(*g).logical_prop().clone())
                    .collect();
                let prop = op.derive_logical_prop(&child_props)?;
                self.new_group(prop)
            }
        };

        let expr = group.push_member(key.operator.clone(), key.inputs.clone(), origin, is_enforcer);
        trace!("memo insert {:?}", expr);
        shard.insert(key, expr.id());
        Ok((expr.id(), true))
    }

    /// Insert a rule output tree. Member and group handles resolve to their
    /// existing groups; only operator nodes create expressions.
    pub(crate) fn insert_opt_expr(
        &self,
        expr: &OptExpr,
        target: Option<GroupId>,
        origin: Option<RuleId>,
    ) -> OptResult<(ExprId, bool)> {
        match expr.node() {
            OptExprNode::Member(id) => Ok((*id, false)),
            OptExprNode::Group(_) => {
                Err(OptError::internal("rule produced a bare group handle"))
            }
            OptExprNode::Op(op) => {
                let mut inputs = Vec::with_capacity(expr.inputs().len());
                for child in expr.inputs() {
                    let gid = match child.node() {
                        OptExprNode::Group(g) => *g,
                        OptExprNode::Member(id) => self.find(id.group),
                        OptExprNode::Op(_) => {
                            let (id, _) = self.insert_opt_expr(child, None, origin)?;
                            self.find(id.group)
                        }
                    };
                    inputs.push(gid);
                }
                self.insert_expr(op.clone(), inputs, target, origin, false)
            }
        }
    }

    /// Insert an enforcer on top of its own group.
    pub(crate) fn insert_enforcer(
        &self,
        op: PhysicalOperator,
        group: GroupId,
    ) -> OptResult<(ExprId, bool)> {
        let group = self.find(group);
        self.insert_expr(Operator::Physical(op), vec![group], Some(group), None, true)
    }

    fn new_group(&self, prop: LogicalProperty) -> Arc<Group> {
        let mut groups = self.groups.write();
        let id = GroupId(groups.len() as u32);
        let group = Arc::new(Group::new(id, prop));
        groups.push(group.clone());
        self.dup_parents.lock().push(id.0);
        group
    }

    fn mark_duplicate(&self, a: GroupId, b: GroupId) {
        debug!("groups {} and {} found equivalent", a, b);
        self.pending_dups.lock().push((a, b));
    }

    pub fn has_pending_duplicates(&self) -> bool {
        !self.pending_dups.lock().is_empty()
    }

    /// Merge all recorded duplicate groups, to a fixpoint. The index rebuild
    /// after each round can surface structural twins in formerly distinct
    /// groups, which feed the next round.
    ///
    /// Must not run concurrently with search jobs.
    pub fn merge_duplicates(&self) {
        loop {
            let pending = std::mem::take(&mut *self.pending_dups.lock());
            if pending.is_empty() {
                break;
            }
            for (a, b) in pending {
                let ra = self.find(a);
                let rb = self.find(b);
                if ra == rb {
                    continue;
                }
                // Smaller id wins so canonical ids stay stable over time.
                let (winner, loser) = if ra < rb { (ra, rb) } else { (rb, ra) };
                self.dup_parents.lock()[loser.0 as usize] = winner.0;
                debug!("merging group {} into {}", loser, winner);
                let winner_group = self.group_at(winner);
                let loser_group = self.group_at(loser);
                winner_group.absorb(&loser_group);
            }
            self.rebuild_index();
        }

        let mut root = self.root.lock();
        if let Some(r) = *root {
            *root = Some(Self::find_in(&mut self.dup_parents.lock(), r));
        }
    }

    /// Re-key every live expression under canonical child ids. Two live
    /// expressions collapsing onto one key are either twins within one group,
    /// in which case the later one is retired, or they sit in groups not yet
    /// known to be equivalent, which records a fresh duplicate pair.
    fn rebuild_index(&self) {
        let mut fresh: Vec<HashMap<GroupExprKey, ExprId>> =
            (0..INDEX_SHARDS).map(|_| HashMap::new()).collect();
        let groups: Vec<Arc<Group>> = self.groups.read().clone();

        for group in &groups {
            for member in group.local_members() {
                if member.is_retired() {
                    continue;
                }
                let key = GroupExprKey {
                    operator: member.operator().clone(),
                    inputs: member.inputs().iter().map(|g| self.find(*g)).collect(),
                };
                let shard = self.shard_of(&key);
                match fresh[shard].entry(key) {
                    Entry::Occupied(kept) => {
                        let kept_home = self.find(kept.get().group);
                        let this_home = self.find(member.id().group);
                        if kept_home == this_home {
                            member.retire();
                        } else {
                            self.mark_duplicate(kept_home, this_home);
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(member.id());
                    }
                }
            }
        }

        for (shard, map) in self.index.iter().zip(fresh) {
            *shard.lock() = map;
        }
    }

    /// Derive statistics for every group reachable from the root that does
    /// not have them yet. Runs between exploration and implementation.
    pub fn derive_stats_if_absent(&self, mda: &dyn MdAccessor) -> OptResult<()> {
        let root = self.root_group()?;
        let mut in_progress = HashSet::new();
        self.derive_group_stats(root, mda, &mut in_progress)?;
        Ok(())
    }

    fn derive_group_stats(
        &self,
        id: GroupId,
        mda: &dyn MdAccessor,
        in_progress: &mut HashSet<GroupId>,
    ) -> OptResult<Arc<Statistics>> {
        let id = self.find(id);
        let group = self.group_at(id);
        if let Some(stats) = group.stats() {
            return Ok(stats);
        }
        if !in_progress.insert(id) {
            return Err(OptError::internal(format!(
                "cyclic reference through group {} during statistics derivation",
                id
            )));
        }

        let member = self
            .members(id)
            .into_iter()
            .find(|m| m.is_logical())
            .ok_or_else(|| {
                OptError::internal(format!("group {} has no logical member", id))
            })?;
        let mut input_stats = Vec::with_capacity(member.inputs().len());
        for child in member.inputs() {
            input_stats.push(self.derive_group_stats(*child, mda, in_progress)?);
        }
        let stats = match member.operator() {
            Operator::Logical(op) => Arc::new(op.derive_stats(&input_stats, mda)?),
            Operator::Physical(_) => {
                return Err(OptError::internal("statistics requested of a physical member"))
            }
        };
        group.set_stats(stats.clone());
        in_progress.remove(&id);
        Ok(stats)
    }

    /// Drop all derived statistics, e.g. after metadata changes.
    pub fn reset_stats(&self) {
        for group in self.groups.read().iter() {
            group.clear_stats();
        }
    }

    /// Reset per-stage search state on every group, keeping memo contents,
    /// statistics and winners.
    pub fn reset_group_states(&self) {
        for group in self.groups.read().iter() {
            group.reset_state();
        }
    }

    fn shard_of(&self, key: &GroupExprKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() as usize % INDEX_SHARDS
    }
}

impl Debug for Memo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let root = *self.root.lock();
        let mut table = Table::new();
        table.add_row(row!["Group", "Expressions", "Rows"]);
        for group in self.groups.read().iter() {
            if group.duplicate_of().is_some() {
                continue;
            }
            let header = match root {
                Some(r) if r == group.id() => format!("{} (root)", group.id()),
                _ => format!("{}", group.id()),
            };
            let exprs = self
                .members(group.id())
                .iter()
                .map(|m| format!("{:?}", m))
                .collect::<Vec<_>>()
                .join("\n");
            let rows = group
                .stats()
                .map(|s| format!("{:.1}", s.row_count()))
                .unwrap_or_else(|| "-".to_string());
            table.add_row(row![header, exprs, rows]);
        }
        writeln!(f)?;
        write!(f, "{}", table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnFactory;
    use crate::expr::LogicalExprBuilder;
    use crate::metadata::{MemoryMdProvider, TableId};
    use crate::operator::{InnerJoin, LogicalOperator, ScalarExpr, Select};

    struct Fixture {
        memo: Memo,
        provider: MemoryMdProvider,
        t1: Arc<crate::metadata::TableDesc>,
        t2: Arc<crate::metadata::TableDesc>,
    }

    fn fixture() -> Fixture {
        let factory = ColumnFactory::new();
        let provider = MemoryMdProvider::new();
        let t1 = provider.register_table(TableId(1), "t1", &["a"], 100.0, &factory);
        let t2 = provider.register_table(TableId(2), "t2", &["b"], 50.0, &factory);
        Fixture {
            memo: Memo::new(),
            provider,
            t1,
            t2,
        }
    }

    fn join_op(fx: &Fixture) -> Operator {
        Operator::Logical(LogicalOperator::LogicalInnerJoin(InnerJoin::new(
            ScalarExpr::col_eq(fx.t1.columns[0].id(), fx.t2.columns[0].id()),
        )))
    }

    fn scan_groups(fx: &Fixture) -> (GroupId, GroupId) {
        let left = LogicalExprBuilder::new().get(&fx.t1).build();
        let right = LogicalExprBuilder::new().get(&fx.t2).build();
        let l = fx.memo.insert_expr_tree(&left, None).unwrap();
        let r = fx.memo.insert_expr_tree(&right, None).unwrap();
        (l, r)
    }

    #[test]
    fn test_insert_is_idempotent() {
        let fx = fixture();
        let right = LogicalExprBuilder::new().get(&fx.t2).build();
        let pred = ScalarExpr::col_eq(fx.t1.columns[0].id(), fx.t2.columns[0].id());
        let expr = LogicalExprBuilder::new()
            .get(&fx.t1)
            .join(pred, right)
            .build();

        let g1 = fx.memo.insert_expr_tree(&expr, None).unwrap();
        let before = fx.memo.num_groups();
        let g2 = fx.memo.insert_expr_tree(&expr, None).unwrap();

        assert_eq!(g1, g2);
        assert_eq!(before, fx.memo.num_groups());
    }

    #[test]
    fn test_duplicate_recorded_not_merged_inline() {
        let fx = fixture();
        let (l, r) = scan_groups(&fx);

        let (j1, created) = fx
            .memo
            .insert_expr(join_op(&fx), vec![l, r], None, None, false)
            .unwrap();
        assert!(created);
        let (_, created) = fx
            .memo
            .insert_expr(join_op(&fx), vec![r, l], None, None, false)
            .unwrap();
        assert!(created);

        // Inserting the commuted form into the first join's group hits the
        // second group and records the equivalence.
        let (j2, created) = fx
            .memo
            .insert_expr(join_op(&fx), vec![r, l], Some(j1.group), None, false)
            .unwrap();
        assert!(!created);
        assert_ne!(j1.group, j2.group);
        assert!(fx.memo.has_pending_duplicates());
        // Not merged yet.
        assert_eq!(j2.group, fx.memo.find(j2.group));
    }

    #[test]
    fn test_merge_collapses_duplicates() {
        let fx = fixture();
        let (l, r) = scan_groups(&fx);

        let (j1, _) = fx
            .memo
            .insert_expr(join_op(&fx), vec![l, r], None, None, false)
            .unwrap();
        let (j2, _) = fx
            .memo
            .insert_expr(join_op(&fx), vec![r, l], None, None, false)
            .unwrap();
        fx.memo
            .insert_expr(join_op(&fx), vec![r, l], Some(j1.group), None, false)
            .unwrap();

        fx.memo.merge_duplicates();

        // Smaller id is canonical; the merged group exposes both joins.
        assert_eq!(j1.group, fx.memo.find(j2.group));
        assert_eq!(2, fx.memo.members(j1.group).len());
        // Ids stay resolvable after the merge.
        assert!(fx.memo.expr(j2).is_ok());
        assert!(!fx.memo.has_pending_duplicates());
    }

    #[test]
    fn test_merge_cascades_to_parents() {
        let fx = fixture();
        let (l, r) = scan_groups(&fx);

        let (j1, _) = fx
            .memo
            .insert_expr(join_op(&fx), vec![l, r], None, None, false)
            .unwrap();
        let (j2, _) = fx
            .memo
            .insert_expr(join_op(&fx), vec![r, l], None, None, false)
            .unwrap();

        // Identical selects over the two join groups.
        let select = |g: GroupId| {
            let op = Operator::Logical(LogicalOperator::LogicalSelect(Select::new(
                ScalarExpr::col_eq(fx.t1.columns[0].id(), fx.t2.columns[0].id()),
            )));
            fx.memo.insert_expr(op, vec![g], None, None, false).unwrap().0
        };
        let s1 = select(j1.group);
        let s2 = select(j2.group);
        assert_ne!(s1.group, s2.group);

        fx.memo
            .insert_expr(join_op(&fx), vec![r, l], Some(j1.group), None, false)
            .unwrap();
        fx.memo.merge_duplicates();

        // Once the joins merge, the selects become structural twins and their
        // groups merge in the next round of the same call.
        assert_eq!(fx.memo.find(s1.group), fx.memo.find(s2.group));
        // One of the twin selects is retired, so the merged group exposes one.
        assert_eq!(1, fx.memo.members(s1.group).len());
    }

    #[test]
    fn test_stats_derivation() {
        let fx = fixture();
        let right = LogicalExprBuilder::new().get(&fx.t2).build();
        let pred = ScalarExpr::col_eq(fx.t1.columns[0].id(), fx.t2.columns[0].id());
        let expr = LogicalExprBuilder::new()
            .get(&fx.t1)
            .join(pred, right)
            .build();

        let root = fx.memo.insert_expr_tree(&expr, None).unwrap();
        fx.memo.set_root(root);
        fx.memo.derive_stats_if_absent(&fx.provider).unwrap();

        // Equi-join estimate: l * r / max(ndv) with default ndv = rows.
        let stats = fx.memo.group(root).stats().unwrap();
        assert_eq!(50.0, stats.row_count());
    }

    #[test]
    fn test_physical_insert_requires_target() {
        let fx = fixture();
        let (l, _) = scan_groups(&fx);
        let op = Operator::Physical(
            crate::operator::Spool::new().into(),
        );
        assert!(fx.memo.insert_expr(op, vec![l], None, None, true).is_err());
    }

    #[test]
    fn test_update_best_keeps_cheaper() {
        let fx = fixture();
        let (l, _) = scan_groups(&fx);
        let group = fx.memo.group(l);
        let required = crate::properties::PhysicalPropertySet::default();
        let ctx_with_cost = |cost: f64| CostContext {
            expr: ExprId::new(l, 0),
            required: required.clone(),
            output: required.clone(),
            input_reqds: vec![],
            cost: cost.into(),
        };

        // First context beats the implicit infinite best.
        group.update_best(&required, ctx_with_cost(10.0));
        assert_eq!(10.0, group.best_ctx(&required).unwrap().cost.value());

        group.update_best(&required, ctx_with_cost(5.0));
        assert_eq!(5.0, group.best_ctx(&required).unwrap().cost.value());

        group.update_best(&required, ctx_with_cost(7.0));
        assert_eq!(5.0, group.best_ctx(&required).unwrap().cost.value());
    }
}
