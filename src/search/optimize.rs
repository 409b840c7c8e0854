use std::sync::Arc;

use log::trace;

use crate::error::{OptError, OptResult};
use crate::memo::{CostContext, ExprId, Group, GroupId, Memo};
use crate::operator::{PhysicalOperator, PhysicalOperatorTrait};
use crate::properties::enforcement::plan_enforcers;
use crate::properties::PhysicalPropertySet;
use crate::scheduler::{AcquireResult, JobControl};
use crate::search::{Job, JobImpl, SearchContext};

/// Optimize a group under one property request: cost every physical member,
/// settle the winner, cache it on the group. One job queue per (group,
/// request) pair makes each request computed once and reused by every later
/// requester.
#[derive(Debug)]
pub(crate) struct OptimizeGroupJob {
    group: GroupId,
    required: PhysicalPropertySet,
    phase: OptimizeGroupPhase,
}

#[derive(Debug)]
enum OptimizeGroupPhase {
    Begin,
    Finish,
}

impl OptimizeGroupJob {
    pub(crate) fn new(group: GroupId, required: PhysicalPropertySet) -> Self {
        Self {
            group,
            required,
            phase: OptimizeGroupPhase::Begin,
        }
    }
}

impl Job for OptimizeGroupJob {
    fn execute(&mut self, ctx: &SearchContext) -> OptResult<JobControl> {
        match self.phase {
            OptimizeGroupPhase::Begin => {
                let group = ctx.memo().group(self.group);
                // A winner under this request may have been recorded by a
                // sibling request's executor that is still running and may
                // yet replace it with a cheaper one. The queue is the only
                // authority on whether the request is fully costed.
                let queue = group.opt_queue(&self.required);
                match queue.try_acquire() {
                    AcquireResult::Done => Ok(JobControl::Done),
                    AcquireResult::Busy => Ok(JobControl::Park(queue)),
                    AcquireResult::Acquired => {
                        self.phase = OptimizeGroupPhase::Finish;
                        // Enforcer members are skipped: enforcement is planned
                        // per request on top of member winners, and an
                        // enforcer's input is its own group.
                        let children: Vec<JobImpl> = ctx
                            .memo()
                            .members(self.group)
                            .into_iter()
                            .filter(|m| m.is_physical() && !m.is_enforcer())
                            .map(|m| OptimizeExprJob::new(m.id(), self.required.clone()).into())
                            .collect();
                        Ok(JobControl::Spawn(children))
                    }
                }
            }
            OptimizeGroupPhase::Finish => {
                let group = ctx.memo().group(self.group);
                trace!(
                    "group {} optimized under {:?}: {:?}",
                    group.id(),
                    self.required,
                    group.best_ctx(&self.required)
                );
                group.opt_queue(&self.required).complete(ctx.sched());
                Ok(JobControl::Done)
            }
        }
    }
}

/// Cost one physical expression under a request. The first step asks the
/// operator for its property derivations and optimizes every input group
/// under every derivation's child requests; the second gathers child winners,
/// adds the operator's own cost and records cost contexts, planning enforcers
/// when no derivation satisfies the request natively.
#[derive(Debug)]
pub(crate) struct OptimizeExprJob {
    expr: ExprId,
    required: PhysicalPropertySet,
    derivations: Vec<crate::operator::PropDerivation>,
    phase: OptimizeExprPhase,
}

#[derive(Debug)]
enum OptimizeExprPhase {
    OptimizeInputs,
    Gather,
}

impl OptimizeExprJob {
    pub(crate) fn new(expr: ExprId, required: PhysicalPropertySet) -> Self {
        Self {
            expr,
            required,
            derivations: vec![],
            phase: OptimizeExprPhase::OptimizeInputs,
        }
    }

    fn physical_op(&self, memo: &Memo) -> OptResult<PhysicalOperator> {
        match memo.expr(self.expr)?.operator() {
            crate::operator::Operator::Physical(op) => Ok(op.clone()),
            other => Err(OptError::internal(format!(
                "optimizing non-physical expression {:?}",
                other
            ))),
        }
    }

    fn gather(&self, ctx: &SearchContext) -> OptResult<()> {
        let memo = ctx.memo();
        let expr = memo.expr(self.expr)?;
        let group = memo.group(self.expr.group);
        let op = self.physical_op(memo)?;

        let row_count = |g: GroupId| {
            memo.group(g)
                .stats()
                .map(|s| s.row_count())
                .unwrap_or(1.0)
        };
        let output_rows = group.stats().map(|s| s.row_count()).unwrap_or(1.0);
        let input_rows: Vec<f64> = expr.inputs().iter().map(|g| row_count(*g)).collect();
        let op_cost = ctx.cost_model().operator_cost(&op, output_rows, &input_rows)?;

        for derivation in &self.derivations {
            let mut total = op_cost;
            let mut complete = true;
            for (child, child_reqd) in expr.inputs().iter().zip(&derivation.input_required_props) {
                match memo.group(*child).best_ctx(child_reqd) {
                    Some(child_win) => total += child_win.cost,
                    None => {
                        // A child has no plan under this derivation's request.
                        complete = false;
                        break;
                    }
                }
            }
            if !complete {
                continue;
            }

            let delivered = derivation.output_prop.clone();
            let cost_ctx = CostContext {
                expr: self.expr,
                required: delivered.clone(),
                output: delivered.clone(),
                input_reqds: derivation.input_required_props.clone(),
                cost: total,
            };
            expr.record_cost_ctx(cost_ctx.clone());
            group.update_best(&delivered, cost_ctx.clone());

            if delivered.satisfies(&self.required) {
                let mut winner = cost_ctx;
                winner.required = self.required.clone();
                expr.record_cost_ctx(winner.clone());
                group.update_best(&self.required, winner);
            } else {
                self.plan_enforcement(ctx, &group, &delivered, total, output_rows)?;
            }
        }
        Ok(())
    }

    /// Stack enforcers on the delivered plan until the request is met,
    /// recording a winner per intermediate property set.
    fn plan_enforcement(
        &self,
        ctx: &SearchContext,
        group: &Arc<Group>,
        delivered: &PhysicalPropertySet,
        below_cost: crate::cost::Cost,
        rows: f64,
    ) -> OptResult<()> {
        let chain = match plan_enforcers(&self.required, delivered, group.logical_prop()) {
            Some(chain) => chain,
            None => return Ok(()),
        };
        let memo = ctx.memo();
        let mut below = delivered.clone();
        let mut total = below_cost;
        let mut last: Option<CostContext> = None;

        for enforcer in chain {
            let (id, _) = memo.insert_enforcer(enforcer.operator.clone(), group.id())?;
            total += ctx
                .cost_model()
                .operator_cost(&enforcer.operator, rows, &[rows])?;
            let cost_ctx = CostContext {
                expr: id,
                required: enforcer.output_prop.clone(),
                output: enforcer.output_prop.clone(),
                input_reqds: vec![below.clone()],
                cost: total,
            };
            memo.expr(id)?.record_cost_ctx(cost_ctx.clone());
            group.update_best(&enforcer.output_prop, cost_ctx.clone());
            below = enforcer.output_prop.clone();
            last = Some(cost_ctx);
        }

        if let Some(mut winner) = last {
            winner.required = self.required.clone();
            group.update_best(&self.required, winner);
        }
        Ok(())
    }
}

impl Job for OptimizeExprJob {
    fn execute(&mut self, ctx: &SearchContext) -> OptResult<JobControl> {
        match self.phase {
            OptimizeExprPhase::OptimizeInputs => {
                self.phase = OptimizeExprPhase::Gather;
                let memo = ctx.memo();
                let expr = memo.expr(self.expr)?;
                let op = self.physical_op(memo)?;
                self.derivations = op.derive_properties(&self.required, expr.inputs().len())?;

                let mut children: Vec<JobImpl> = Vec::new();
                for derivation in &self.derivations {
                    for (child, child_reqd) in
                        expr.inputs().iter().zip(&derivation.input_required_props)
                    {
                        children
                            .push(OptimizeGroupJob::new(*child, child_reqd.clone()).into());
                    }
                }
                Ok(JobControl::Spawn(children))
            }
            OptimizeExprPhase::Gather => {
                self.gather(ctx)?;
                Ok(JobControl::Done)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use enumset::EnumSet;

    use super::*;
    use crate::cost::Cost;
    use crate::expr::LogicalExprBuilder;
    use crate::rules::RuleSet;
    use crate::scheduler::Scheduler;
    use crate::test_utils::TestCatalog;

    fn search_context(cat: &TestCatalog, memo: Arc<Memo>) -> SearchContext {
        SearchContext::new(
            memo,
            RuleSet::cascades(),
            cat.provider.clone(),
            EnumSet::new(),
            Scheduler::new(),
            Arc::new(AtomicUsize::new(1000)),
            None,
        )
    }

    #[test]
    fn test_recorded_winner_does_not_bypass_queue() {
        let cat = TestCatalog::new();
        let memo = Arc::new(Memo::new());
        let expr = LogicalExprBuilder::new().get(&cat.t1).build();
        let root = memo.insert_expr_tree(&expr, None).unwrap();
        let ctx = search_context(&cat, memo.clone());

        // A winner recorded before the group's request was ever executed,
        // as a sibling request's gather would.
        let required = PhysicalPropertySet::default();
        let member = memo.members(root)[0].id();
        memo.group(root).update_best(
            &required,
            CostContext {
                expr: member,
                required: required.clone(),
                output: required.clone(),
                input_reqds: vec![],
                cost: Cost::from(1.0),
            },
        );

        // The first requester still acquires the queue and executes.
        let mut first = OptimizeGroupJob::new(root, required.clone());
        assert!(matches!(
            first.execute(&ctx).unwrap(),
            JobControl::Spawn(_)
        ));

        // A concurrent requester parks instead of consuming the winner.
        let mut second = OptimizeGroupJob::new(root, required.clone());
        assert!(matches!(
            second.execute(&ctx).unwrap(),
            JobControl::Park(_)
        ));

        // Only once the executor completes do later requesters short-circuit.
        assert!(matches!(first.execute(&ctx).unwrap(), JobControl::Done));
        assert!(memo.group(root).opt_queue(&required).is_done());
        let mut third = OptimizeGroupJob::new(root, required);
        assert!(matches!(third.execute(&ctx).unwrap(), JobControl::Done));
    }
}
