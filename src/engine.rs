//! Optimizer driver.
//!
//! [`Engine::optimize`] takes a logical expression tree plus required
//! physical properties and walks the stage machine: exploration to fixpoint
//! or budget, duplicate-group merging, statistics derivation, implementation,
//! another merge, then property-driven optimization and plan extraction.
//! Several [`StageConf`]s run the machine with increasing budgets; the first
//! stage whose extraction succeeds wins.

use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::Arc;

use log::debug;

use crate::error::{OptError, OptResult};
use crate::expr::ExprRef;
use crate::memo::{extract_plan, Memo};
use crate::metadata::MdAccessor;
use crate::properties::PhysicalPropertySet;
use crate::rules::{RuleId, RuleSet};
use crate::scheduler::Scheduler;
use crate::search::{
    ExploreGroupJob, ImplementGroupJob, JobImpl, OptimizeGroupJob, SearchContext,
};

use enumset::EnumSet;

/// One run of the search stage machine.
#[derive(Clone, Debug)]
pub struct StageConf {
    /// Rule applications allowed across the stage's exploration and
    /// implementation phases.
    pub xform_budget: usize,
}

impl Default for StageConf {
    fn default() -> Self {
        Self {
            xform_budget: 10_000,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    pub workers: usize,
    pub disabled_rules: EnumSet<RuleId>,
    /// Stages run in order until one extracts a plan.
    pub stages: Vec<StageConf>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            disabled_rules: EnumSet::new(),
            stages: vec![StageConf::default()],
        }
    }
}

/// One optimization request: the query and what the caller requires of the
/// plan's output.
pub struct QueryContext {
    expr: ExprRef,
    required: PhysicalPropertySet,
    cancel: Option<Arc<AtomicBool>>,
}

impl QueryContext {
    pub fn new(expr: ExprRef) -> Self {
        Self {
            expr,
            required: PhysicalPropertySet::default(),
            cancel: None,
        }
    }

    pub fn with_required(mut self, required: PhysicalPropertySet) -> Self {
        self.required = required;
        self
    }

    /// Cooperative cancellation: raising the flag makes in-flight jobs
    /// finish their current step and `optimize` return an error, with the
    /// memo left consistent.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

pub struct Engine {
    mda: Arc<dyn MdAccessor>,
    config: OptimizerConfig,
    rules: RuleSet,
}

impl Engine {
    pub fn new(mda: Arc<dyn MdAccessor>) -> Self {
        Self::with_config(mda, OptimizerConfig::default())
    }

    pub fn with_config(mda: Arc<dyn MdAccessor>, config: OptimizerConfig) -> Self {
        Self {
            mda,
            config,
            rules: RuleSet::cascades(),
        }
    }

    pub fn optimize(&self, query: &QueryContext) -> OptResult<ExprRef> {
        self.optimize_detailed(query).map(|(plan, _)| plan)
    }

    /// Like [`Engine::optimize`], additionally handing back the memo for
    /// inspection.
    pub fn optimize_detailed(&self, query: &QueryContext) -> OptResult<(ExprRef, Arc<Memo>)> {
        let memo = Arc::new(Memo::new());
        let root = memo.insert_expr_tree(&query.expr, None)?;
        memo.set_root(root);
        debug!("initial memo:{:?}", memo);

        let mut last_recoverable: Option<OptError> = None;
        for (stage_no, stage) in self.config.stages.iter().enumerate() {
            if stage_no > 0 {
                memo.reset_group_states();
            }
            match self.run_stage(&memo, query, stage, stage_no) {
                Ok(plan) => return Ok((plan, memo)),
                Err(err) if err.is_recoverable() => {
                    debug!("stage {} ended without a plan: {}", stage_no, err);
                    last_recoverable = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_recoverable
            .unwrap_or_else(|| OptError::internal("optimizer configured with no stages")))
    }

    fn run_stage(
        &self,
        memo: &Arc<Memo>,
        query: &QueryContext,
        stage: &StageConf,
        stage_no: usize,
    ) -> OptResult<ExprRef> {
        let budget = Arc::new(AtomicUsize::new(stage.xform_budget));

        debug!("stage {}: exploration", stage_no);
        let root = memo.root_group()?;
        self.run_phase(memo, query, &budget, ExploreGroupJob::new(root).into())?;
        memo.merge_duplicates();

        memo.derive_stats_if_absent(self.mda.as_ref())?;

        debug!("stage {}: implementation", stage_no);
        let root = memo.root_group()?;
        self.run_phase(memo, query, &budget, ImplementGroupJob::new(root).into())?;
        memo.merge_duplicates();

        debug!("stage {}: optimization", stage_no);
        let root = memo.root_group()?;
        self.run_phase(
            memo,
            query,
            &budget,
            OptimizeGroupJob::new(root, query.required.clone()).into(),
        )?;
        debug!("memo after optimization:{:?}", memo);

        extract_plan(memo, &query.required)
    }

    fn run_phase(
        &self,
        memo: &Arc<Memo>,
        query: &QueryContext,
        budget: &Arc<AtomicUsize>,
        root_job: JobImpl,
    ) -> OptResult<()> {
        let sched = Scheduler::new();
        let ctx = SearchContext::new(
            memo.clone(),
            self.rules.clone(),
            self.mda.clone(),
            self.config.disabled_rules,
            sched.clone(),
            budget.clone(),
            query.cancel.clone(),
        );
        sched.run(&ctx, root_job, self.config.workers)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::columns::ColId;
    use crate::expr::{Expression, LogicalExprBuilder};
    use crate::operator::Operator::Physical;
    use crate::operator::PhysicalOperator::{
        PhysicalHashJoin, PhysicalNestedLoopJoin, PhysicalSort, PhysicalSpool,
        PhysicalTableScan, PhysicalUnionAll,
    };
    use crate::operator::{CmpKind, Operator, ScalarExpr};
    use crate::properties::OrderSpec;
    use crate::test_utils::TestCatalog;

    fn is_scan(op: &Operator) -> bool {
        matches!(op, Physical(PhysicalTableScan(_)))
    }

    fn equi_join_query(cat: &TestCatalog) -> QueryContext {
        let right = LogicalExprBuilder::new().get(&cat.t2).build();
        let pred = ScalarExpr::col_eq(cat.col(&cat.t1, 0), cat.col(&cat.t2, 0));
        let expr = LogicalExprBuilder::new()
            .get(&cat.t1)
            .join(pred, right)
            .build();
        QueryContext::new(expr)
    }

    #[test]
    fn test_equi_join_picks_hash_join() {
        let cat = TestCatalog::new();
        let engine = Engine::new(cat.provider.clone());

        let (plan, memo) = engine.optimize_detailed(&equi_join_query(&cat)).unwrap();

        assert!(matches!(plan.op(), Physical(PhysicalHashJoin(_))));
        assert!(is_scan(plan.children()[0].op()));
        assert!(is_scan(plan.children()[1].op()));

        // The root group kept the nested-loop alternative; it just lost.
        let root = memo.root_group().unwrap();
        let has_nl = memo
            .members(root)
            .iter()
            .any(|m| matches!(m.operator(), Physical(PhysicalNestedLoopJoin(_))));
        assert!(has_nl);

        // The winner map agrees with the extracted plan.
        let winners =
            crate::memo::build_tree_map(&memo, &PhysicalPropertySet::default()).unwrap();
        let root_winner = &winners.winners(root)[0];
        let root_expr = memo.expr(root_winner.expr).unwrap();
        assert!(matches!(root_expr.operator(), Physical(PhysicalHashJoin(_))));
    }

    #[test]
    fn test_commuted_join_lands_in_same_group() {
        let cat = TestCatalog::new();
        let engine = Engine::new(cat.provider.clone());

        let (_, memo) = engine.optimize_detailed(&equi_join_query(&cat)).unwrap();

        let root = memo.root_group().unwrap();
        let logical_joins: Vec<_> = memo
            .members(root)
            .into_iter()
            .filter(|m| m.is_logical())
            .collect();
        assert_eq!(2, logical_joins.len());
        // Same child groups, swapped.
        let a = logical_joins[0].inputs().to_vec();
        let b = logical_joins[1].inputs().to_vec();
        assert_eq!(a, b.iter().rev().copied().collect::<Vec<_>>());
    }

    #[test]
    fn test_order_requirement_adds_sort_enforcer() {
        let cat = TestCatalog::new();
        let engine = Engine::new(cat.provider.clone());

        let order = OrderSpec::by_columns(&[cat.col(&cat.t1, 0)]);
        let query = equi_join_query(&cat).with_required(PhysicalPropertySet::with_order(order));
        let plan = engine.optimize(&query).unwrap();

        assert!(matches!(plan.op(), Physical(PhysicalSort(_))));
        assert!(matches!(
            plan.children()[0].op(),
            Physical(PhysicalHashJoin(_))
        ));
    }

    #[test]
    fn test_unsatisfiable_order_reports_no_plan() {
        let cat = TestCatalog::new();
        let engine = Engine::new(cat.provider.clone());

        // No operator produces this column, so no enforcer can sort on it.
        let order = OrderSpec::by_columns(&[ColId(9999)]);
        let query = equi_join_query(&cat).with_required(PhysicalPropertySet::with_order(order));

        let err = engine.optimize(&query).unwrap_err();
        assert!(matches!(err, OptError::NoPlanFound(_)));
    }

    #[test]
    fn test_non_equi_join_falls_back_to_nested_loop() {
        let cat = TestCatalog::new();
        let engine = Engine::new(cat.provider.clone());

        let right = LogicalExprBuilder::new().get(&cat.t2).build();
        let pred = ScalarExpr::cmp(
            CmpKind::Lt,
            ScalarExpr::column(cat.col(&cat.t1, 0)),
            ScalarExpr::column(cat.col(&cat.t2, 0)),
        );
        let expr = LogicalExprBuilder::new()
            .get(&cat.t1)
            .join(pred, right)
            .build();
        let plan = engine.optimize(&QueryContext::new(expr)).unwrap();

        assert!(matches!(plan.op(), Physical(PhysicalNestedLoopJoin(_))));
        // The inner side is rescanned, so it picked up a spool.
        assert!(matches!(
            plan.children()[1].op(),
            Physical(PhysicalSpool(_))
        ));
    }

    #[test]
    fn test_union_all_implementation() {
        let cat = TestCatalog::new();
        let engine = Engine::new(cat.provider.clone());

        let other = LogicalExprBuilder::new().get(&cat.t1).build();
        let expr = LogicalExprBuilder::new()
            .get(&cat.t1)
            .union_all(vec![other])
            .build();
        let plan = engine.optimize(&QueryContext::new(expr)).unwrap();

        assert!(matches!(plan.op(), Physical(PhysicalUnionAll(_))));
        assert_eq!(2, plan.children().len());
        assert!(is_scan(plan.children()[0].op()));
    }

    #[test]
    fn test_disabled_join_rules_yield_no_plan() {
        let cat = TestCatalog::new();
        let config = OptimizerConfig {
            disabled_rules: RuleId::Join2HashJoin | RuleId::Join2NestedLoopJoin,
            ..Default::default()
        };
        let engine = Engine::with_config(cat.provider.clone(), config);

        let err = engine.optimize(&equi_join_query(&cat)).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_exhausted_budget_truncates_search() {
        let cat = TestCatalog::new();
        let config = OptimizerConfig {
            stages: vec![StageConf { xform_budget: 0 }],
            ..Default::default()
        };
        let engine = Engine::with_config(cat.provider.clone(), config);

        // Nothing gets implemented, so extraction finds no plan.
        let err = engine.optimize(&equi_join_query(&cat)).unwrap_err();
        assert!(matches!(err, OptError::NoPlanFound(_)));
    }

    #[test]
    fn test_later_stage_recovers_with_bigger_budget() {
        let cat = TestCatalog::new();
        let config = OptimizerConfig {
            stages: vec![StageConf { xform_budget: 0 }, StageConf::default()],
            ..Default::default()
        };
        let engine = Engine::with_config(cat.provider.clone(), config);

        let plan = engine.optimize(&equi_join_query(&cat)).unwrap();
        assert!(matches!(plan.op(), Physical(PhysicalHashJoin(_))));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let cat = TestCatalog::new();
        let engine = Engine::new(cat.provider.clone());

        let first = engine.optimize(&equi_join_query(&cat)).unwrap();
        let second = engine.optimize(&equi_join_query(&cat)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cancellation_stops_optimization() {
        let cat = TestCatalog::new();
        let engine = Engine::new(cat.provider.clone());

        let cancel = Arc::new(AtomicBool::new(false));
        cancel.store(true, Ordering::Release);
        let query = equi_join_query(&cat).with_cancel_flag(cancel);

        let err = engine.optimize(&query).unwrap_err();
        assert!(matches!(err, OptError::ResourceExhausted(_)));
    }

    #[test]
    fn test_single_scan_plan() {
        let cat = TestCatalog::new();
        let engine = Engine::new(cat.provider.clone());

        let expr = LogicalExprBuilder::new().get(&cat.t1).build();
        let plan = engine.optimize(&QueryContext::new(expr)).unwrap();
        assert!(is_scan(plan.op()));
        assert!(plan.children().is_empty());
    }

    #[test]
    fn test_plan_comparison_uses_structure() {
        // Guard for the determinism assertion above.
        let cat = TestCatalog::new();
        let scan = Expression::leaf(Physical(PhysicalTableScan(
            crate::operator::TableScan::new(cat.t1.id, cat.t1.columns.clone()),
        )));
        let other = Expression::leaf(Physical(PhysicalTableScan(
            crate::operator::TableScan::new(cat.t2.id, cat.t2.columns.clone()),
        )));
        assert_ne!(scan, other);
    }
}
