use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use enumset::EnumSet;
use log::warn;

use crate::cost::CostModel;
use crate::error::{OptError, OptResult};
use crate::memo::Memo;
use crate::metadata::MdAccessor;
use crate::rules::{RuleId, RuleSet};
use crate::scheduler::Scheduler;

/// Everything a job needs, shared by all workers of one phase. The xform
/// budget is shared across the phases of a stage so a stage's total rule
/// work is bounded no matter how exploration and implementation split it.
pub(crate) struct SearchContext {
    memo: Arc<Memo>,
    rules: RuleSet,
    cost_model: CostModel,
    mda: Arc<dyn MdAccessor>,
    disabled_rules: EnumSet<RuleId>,
    sched: Scheduler,
    xform_budget: Arc<AtomicUsize>,
    budget_warned: AtomicBool,
    cancel: Option<Arc<AtomicBool>>,
}

impl SearchContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        memo: Arc<Memo>,
        rules: RuleSet,
        mda: Arc<dyn MdAccessor>,
        disabled_rules: EnumSet<RuleId>,
        sched: Scheduler,
        xform_budget: Arc<AtomicUsize>,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            memo,
            rules,
            cost_model: CostModel::default(),
            mda,
            disabled_rules,
            sched,
            xform_budget,
            budget_warned: AtomicBool::new(false),
            cancel,
        }
    }

    pub(crate) fn memo(&self) -> &Memo {
        &self.memo
    }

    pub(crate) fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub(crate) fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    #[allow(dead_code)]
    pub(crate) fn mda(&self) -> &dyn MdAccessor {
        self.mda.as_ref()
    }

    pub(crate) fn sched(&self) -> &Scheduler {
        &self.sched
    }

    pub(crate) fn rule_enabled(&self, id: RuleId) -> bool {
        !self.disabled_rules.contains(id)
    }

    /// Claim one rule application from the stage budget. Once it runs out the
    /// search stops producing alternatives and finishes with what the memo
    /// already holds.
    pub(crate) fn take_budget(&self) -> bool {
        let claimed = self
            .xform_budget
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if !claimed && !self.budget_warned.swap(true, Ordering::AcqRel) {
            warn!("transformation budget exhausted, truncating search");
        }
        claimed
    }

    /// Errors once the caller's cancel flag is raised.
    pub(crate) fn ensure_active(&self) -> OptResult<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Acquire) => Err(OptError::ResourceExhausted(
                "optimization canceled".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
