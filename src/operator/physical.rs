use enum_dispatch::enum_dispatch;

use crate::columns::{ColId, ColumnRef};
use crate::error::OptResult;
use crate::metadata::TableId;
use crate::operator::ScalarExprRef;
use crate::properties::{DistributionSpec, OrderSpec, PhysicalPropertySet, Rewindability};

/// Physical relational operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
#[enum_dispatch]
pub enum PhysicalOperator {
    PhysicalTableScan(TableScan),
    PhysicalFilter(Filter),
    PhysicalComputeScalar(ComputeScalar),
    PhysicalHashJoin(HashJoin),
    PhysicalNestedLoopJoin(NestedLoopJoin),
    PhysicalUnionAll(PhysicalUnionAll),
    // Enforcers
    PhysicalSort(Sort),
    PhysicalGatherMotion(GatherMotion),
    PhysicalHashMotion(HashMotion),
    PhysicalSpool(Spool),
}

/// One way a physical operator can satisfy a request: the properties it
/// would deliver, and what it requires of each child to do so.
#[derive(Debug, Clone)]
pub struct PropDerivation {
    pub output_prop: PhysicalPropertySet,
    pub input_required_props: Vec<PhysicalPropertySet>,
}

#[enum_dispatch(PhysicalOperator)]
pub trait PhysicalOperatorTrait {
    /// Enumerate the child property requests this operator offers for a
    /// required property set. Each derivation is optimized independently.
    fn derive_properties(
        &self,
        required: &PhysicalPropertySet,
        input_count: usize,
    ) -> OptResult<Vec<PropDerivation>>;

    /// Number of children, `None` for variadic.
    fn arity(&self) -> Option<usize>;
}

fn any_inputs(n: usize) -> Vec<PhysicalPropertySet> {
    vec![PhysicalPropertySet::default(); n]
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct TableScan {
    table: TableId,
    columns: Vec<ColumnRef>,
}

impl TableScan {
    pub fn new(table: TableId, columns: Vec<ColumnRef>) -> Self {
        Self { table, columns }
    }

    pub fn table(&self) -> TableId {
        self.table
    }
}

impl PhysicalOperatorTrait for TableScan {
    fn derive_properties(
        &self,
        _required: &PhysicalPropertySet,
        _input_count: usize,
    ) -> OptResult<Vec<PropDerivation>> {
        Ok(vec![PropDerivation {
            output_prop: PhysicalPropertySet::with_dist(DistributionSpec::Random),
            input_required_props: vec![],
        }])
    }

    fn arity(&self) -> Option<usize> {
        Some(0)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Filter {
    predicate: ScalarExprRef,
}

impl Filter {
    pub fn new(predicate: ScalarExprRef) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &ScalarExprRef {
        &self.predicate
    }
}

impl PhysicalOperatorTrait for Filter {
    fn derive_properties(
        &self,
        _required: &PhysicalPropertySet,
        input_count: usize,
    ) -> OptResult<Vec<PropDerivation>> {
        Ok(vec![PropDerivation {
            output_prop: PhysicalPropertySet::with_dist(DistributionSpec::Random),
            input_required_props: any_inputs(input_count),
        }])
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ComputeScalar {
    exprs: Vec<ScalarExprRef>,
}

impl ComputeScalar {
    pub fn new(exprs: Vec<ScalarExprRef>) -> Self {
        Self { exprs }
    }
}

impl PhysicalOperatorTrait for ComputeScalar {
    fn derive_properties(
        &self,
        _required: &PhysicalPropertySet,
        input_count: usize,
    ) -> OptResult<Vec<PropDerivation>> {
        Ok(vec![PropDerivation {
            output_prop: PhysicalPropertySet::with_dist(DistributionSpec::Random),
            input_required_props: any_inputs(input_count),
        }])
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct HashJoin {
    predicate: ScalarExprRef,
}

impl HashJoin {
    pub fn new(predicate: ScalarExprRef) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &ScalarExprRef {
        &self.predicate
    }
}

impl PhysicalOperatorTrait for HashJoin {
    fn derive_properties(
        &self,
        _required: &PhysicalPropertySet,
        input_count: usize,
    ) -> OptResult<Vec<PropDerivation>> {
        let mut derivations = vec![PropDerivation {
            output_prop: PhysicalPropertySet::with_dist(DistributionSpec::Random),
            input_required_props: any_inputs(input_count),
        }];

        // Co-located alternative: request both sides hashed on the join keys
        // so the join runs without runtime data movement.
        let keys = self.predicate.equi_join_keys();
        if !keys.is_empty() {
            let left_keys: Vec<ColId> = keys.iter().map(|(l, _)| *l).collect();
            let right_keys: Vec<ColId> = keys.iter().map(|(_, r)| *r).collect();
            derivations.push(PropDerivation {
                output_prop: PhysicalPropertySet::with_dist(DistributionSpec::Hashed(
                    left_keys.clone(),
                )),
                input_required_props: vec![
                    PhysicalPropertySet::with_dist(DistributionSpec::Hashed(left_keys)),
                    PhysicalPropertySet::with_dist(DistributionSpec::Hashed(right_keys)),
                ],
            });
        }

        Ok(derivations)
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct NestedLoopJoin {
    predicate: ScalarExprRef,
}

impl NestedLoopJoin {
    pub fn new(predicate: ScalarExprRef) -> Self {
        Self { predicate }
    }
}

impl PhysicalOperatorTrait for NestedLoopJoin {
    fn derive_properties(
        &self,
        _required: &PhysicalPropertySet,
        _input_count: usize,
    ) -> OptResult<Vec<PropDerivation>> {
        // The inner side is rescanned once per outer row.
        let inner = PhysicalPropertySet {
            rewind: Rewindability::Rewindable,
            ..Default::default()
        };
        Ok(vec![PropDerivation {
            output_prop: PhysicalPropertySet::with_dist(DistributionSpec::Random),
            input_required_props: vec![PhysicalPropertySet::default(), inner],
        }])
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct PhysicalUnionAll {}

impl PhysicalUnionAll {
    pub fn new() -> Self {
        Self {}
    }
}

impl PhysicalOperatorTrait for PhysicalUnionAll {
    fn derive_properties(
        &self,
        _required: &PhysicalPropertySet,
        input_count: usize,
    ) -> OptResult<Vec<PropDerivation>> {
        Ok(vec![PropDerivation {
            output_prop: PhysicalPropertySet::with_dist(DistributionSpec::Random),
            input_required_props: any_inputs(input_count),
        }])
    }

    fn arity(&self) -> Option<usize> {
        None
    }
}

/// Order enforcer.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Sort {
    order: OrderSpec,
}

impl Sort {
    pub fn new(order: OrderSpec) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &OrderSpec {
        &self.order
    }
}

impl PhysicalOperatorTrait for Sort {
    fn derive_properties(
        &self,
        required: &PhysicalPropertySet,
        _input_count: usize,
    ) -> OptResult<Vec<PropDerivation>> {
        let input = PhysicalPropertySet {
            order: OrderSpec::default(),
            dist: required.dist.clone(),
            rewind: Rewindability::Any,
        };
        Ok(vec![PropDerivation {
            output_prop: PhysicalPropertySet {
                order: self.order.clone(),
                dist: required.dist.clone(),
                rewind: Rewindability::Any,
            },
            input_required_props: vec![input],
        }])
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
}

/// Distribution enforcer collapsing all partitions to one host.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct GatherMotion {}

impl GatherMotion {
    pub fn new() -> Self {
        Self {}
    }
}

impl PhysicalOperatorTrait for GatherMotion {
    fn derive_properties(
        &self,
        _required: &PhysicalPropertySet,
        _input_count: usize,
    ) -> OptResult<Vec<PropDerivation>> {
        Ok(vec![PropDerivation {
            output_prop: PhysicalPropertySet::with_dist(DistributionSpec::Singleton),
            input_required_props: any_inputs(1),
        }])
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
}

/// Distribution enforcer repartitioning by hash of the given columns.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct HashMotion {
    cols: Vec<ColId>,
}

impl HashMotion {
    pub fn new(cols: Vec<ColId>) -> Self {
        Self { cols }
    }

    pub fn cols(&self) -> &[ColId] {
        &self.cols
    }
}

impl PhysicalOperatorTrait for HashMotion {
    fn derive_properties(
        &self,
        _required: &PhysicalPropertySet,
        _input_count: usize,
    ) -> OptResult<Vec<PropDerivation>> {
        Ok(vec![PropDerivation {
            output_prop: PhysicalPropertySet::with_dist(DistributionSpec::Hashed(
                self.cols.clone(),
            )),
            input_required_props: any_inputs(1),
        }])
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
}

/// Rewindability enforcer materializing its input.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct Spool {}

impl Spool {
    pub fn new() -> Self {
        Self {}
    }
}

impl PhysicalOperatorTrait for Spool {
    fn derive_properties(
        &self,
        required: &PhysicalPropertySet,
        _input_count: usize,
    ) -> OptResult<Vec<PropDerivation>> {
        Ok(vec![PropDerivation {
            output_prop: PhysicalPropertySet {
                order: OrderSpec::default(),
                dist: required.dist.clone(),
                rewind: Rewindability::Rewindable,
            },
            input_required_props: any_inputs(1),
        }])
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
}
