//! Winning-plan extraction.
//!
//! After optimization, every relevant (group, required properties) pair holds
//! its minimum-cost [`CostContext`]. Extraction walks those winners from the
//! root into a tree map and materializes exactly one physical expression
//! tree. It is deterministic: an unchanged memo yields a structurally
//! identical plan on every call.

use std::collections::BTreeMap;

use crate::error::{OptError, OptResult};
use crate::expr::{ExprRef, Expression};
use crate::memo::{CostContext, GroupId, Memo};
use crate::properties::PhysicalPropertySet;

/// Guard against winner graphs that loop back on themselves.
const MAX_PLAN_DEPTH: usize = 512;

/// The winners backing one extracted plan. A group can appear several times
/// when enforcement stacks requests onto the same group.
pub struct PlanTreeMap {
    entries: BTreeMap<GroupId, Vec<CostContext>>,
}

impl PlanTreeMap {
    pub fn winners(&self, group: GroupId) -> &[CostContext] {
        self.entries.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.entries.keys().copied()
    }
}

/// Collect the winning cost contexts reachable from the root under
/// `required`. Fails with `NoPlanFound` when any reached request has no
/// winner.
pub fn build_tree_map(memo: &Memo, required: &PhysicalPropertySet) -> OptResult<PlanTreeMap> {
    let mut entries: BTreeMap<GroupId, Vec<CostContext>> = BTreeMap::new();
    let root = memo.root_group()?;
    collect_winners(memo, root, required, 0, &mut entries)?;
    Ok(PlanTreeMap { entries })
}

fn collect_winners(
    memo: &Memo,
    group: GroupId,
    required: &PhysicalPropertySet,
    depth: usize,
    entries: &mut BTreeMap<GroupId, Vec<CostContext>>,
) -> OptResult<()> {
    let ctx = winner_for(memo, group, required, depth)?;
    let expr = memo.expr(ctx.expr)?;
    let inputs: Vec<GroupId> = expr.inputs().to_vec();
    let input_reqds = ctx.input_reqds.clone();
    entries.entry(memo.find(group)).or_default().push(ctx);
    for (child, child_reqd) in inputs.iter().zip(&input_reqds) {
        collect_winners(memo, *child, child_reqd, depth + 1, entries)?;
    }
    Ok(())
}

/// Materialize the minimum-cost physical expression satisfying `required` at
/// the memo root.
pub fn extract_plan(memo: &Memo, required: &PhysicalPropertySet) -> OptResult<ExprRef> {
    let root = memo.root_group()?;
    extract_from(memo, root, required, 0)
}

fn extract_from(
    memo: &Memo,
    group: GroupId,
    required: &PhysicalPropertySet,
    depth: usize,
) -> OptResult<ExprRef> {
    let ctx = winner_for(memo, group, required, depth)?;
    let expr = memo.expr(ctx.expr)?;
    if expr.inputs().len() != ctx.input_reqds.len() {
        return Err(OptError::internal(format!(
            "winner {:?} has {} inputs but {} child requests",
            expr.id(),
            expr.inputs().len(),
            ctx.input_reqds.len()
        )));
    }
    let mut children = Vec::with_capacity(expr.inputs().len());
    // Enforcer winners point back into their own group with the request the
    // enforcer absorbs, so recursion terminates through the weaker request.
    for (child, child_reqd) in expr.inputs().iter().zip(&ctx.input_reqds) {
        children.push(extract_from(memo, *child, child_reqd, depth + 1)?);
    }
    Ok(Expression::new(expr.operator().clone(), children))
}

fn winner_for(
    memo: &Memo,
    group: GroupId,
    required: &PhysicalPropertySet,
    depth: usize,
) -> OptResult<CostContext> {
    if depth > MAX_PLAN_DEPTH {
        return Err(OptError::ResourceExhausted(format!(
            "plan extraction exceeded depth {}",
            MAX_PLAN_DEPTH
        )));
    }
    let group = memo.group(group);
    group.best_ctx(required).ok_or_else(|| {
        OptError::NoPlanFound(format!(
            "group {} has no plan satisfying {:?}",
            group.id(),
            required
        ))
    })
}
