use std::cmp::Reverse;
use std::sync::Arc;

use log::trace;

use crate::error::OptResult;
use crate::memo::{ExprId, GroupExpression};
use crate::rules::{bind_pattern, Rule, RuleImpl, RulePromise, RuleResult};
use crate::scheduler::JobControl;
use crate::search::{ExploreExprJob, Job, JobImpl, SearchContext};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum XformMode {
    Exploration,
    Implementation,
}

/// Pick the rules worth applying to `expr` and wrap each in a job, highest
/// promise first. Claiming the applied-mask bit happens here, at spawn time,
/// so racing expression jobs never schedule the same (expression, rule) pair
/// twice.
pub(crate) fn xform_jobs(
    ctx: &SearchContext,
    expr: &Arc<GroupExpression>,
    rules: &[RuleImpl],
    mode: XformMode,
) -> Vec<JobImpl> {
    let mut candidates: Vec<(&RuleImpl, RulePromise)> = rules
        .iter()
        .filter_map(|rule| {
            if !ctx.rule_enabled(rule.rule_id()) {
                return None;
            }
            if let Some(origin) = expr.origin_rule() {
                if !rule.compatible_with(origin) {
                    return None;
                }
            }
            if !rule.pattern().matches_root(expr.operator()) {
                return None;
            }
            let promise = rule.promise(expr, ctx.memo());
            if promise == RulePromise::DontApply {
                return None;
            }
            Some((rule, promise))
        })
        .collect();
    candidates.sort_by_key(|(_, promise)| Reverse(*promise));

    candidates
        .into_iter()
        .filter(|(rule, _)| expr.mark_rule_applied(rule.rule_id()))
        .map(|(rule, _)| ApplyXformJob::new(rule.clone(), expr.id(), mode).into())
        .collect()
}

/// Apply one rule to one expression: bind the pattern, run the rule on each
/// binding, insert the rewrites into the expression's group. In exploration
/// mode, new logical members get their own expression jobs so rule chains
/// reach a fixpoint.
#[derive(Debug)]
pub(crate) struct ApplyXformJob {
    rule: RuleImpl,
    expr: ExprId,
    mode: XformMode,
    phase: XformPhase,
}

#[derive(Debug)]
enum XformPhase {
    Apply,
    Finish,
}

impl ApplyXformJob {
    pub(crate) fn new(rule: RuleImpl, expr: ExprId, mode: XformMode) -> Self {
        Self {
            rule,
            expr,
            mode,
            phase: XformPhase::Apply,
        }
    }
}

impl Job for ApplyXformJob {
    fn execute(&mut self, ctx: &SearchContext) -> OptResult<JobControl> {
        match self.phase {
            XformPhase::Apply => {
                self.phase = XformPhase::Finish;
                let memo = ctx.memo();
                let expr = memo.expr(self.expr)?;
                let target = memo.find(self.expr.group);

                let mut follow_ups: Vec<JobImpl> = Vec::new();
                for binding in bind_pattern(memo, &expr, self.rule.pattern()) {
                    if !ctx.take_budget() {
                        break;
                    }
                    let mut result = RuleResult::new();
                    self.rule.apply(&binding, memo, &mut result)?;
                    for rewrite in result.results() {
                        let (id, created) =
                            memo.insert_opt_expr(&rewrite, Some(target), Some(self.rule.rule_id()))?;
                        if !created {
                            continue;
                        }
                        let new_expr = memo.expr(id)?;
                        trace!("rule {:?} produced {:?}", self.rule, new_expr);
                        if self.mode == XformMode::Exploration && new_expr.is_logical() {
                            follow_ups.push(ExploreExprJob::new(id).into());
                        }
                    }
                }
                Ok(JobControl::Spawn(follow_ups))
            }
            XformPhase::Finish => Ok(JobControl::Done),
        }
    }
}
