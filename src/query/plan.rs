// Physical Plan Nodes
//
// Bound, executable plan trees. Each node carries its output schema; the
// executors are built from these by the executor factory, and the optimizer
// rewrites whole subtrees.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::schema::SchemaRef;
use crate::catalog::value::Value;
use crate::common::types::{IndexOid, TableOid};
use crate::query::expression::ExpressionRef;

pub type PlanNodeRef = Arc<PlanNode>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByType {
    Default,
    Asc,
    Desc,
}

impl OrderByType {
    pub fn is_descending(self) -> bool {
        matches!(self, OrderByType::Desc)
    }
}

/// One sort criterion: direction plus the expression to order by.
pub type OrderBy = (OrderByType, ExpressionRef);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFunctionType {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
    Rank,
}

#[derive(Debug, Clone)]
pub struct SeqScanPlanNode {
    pub output_schema: SchemaRef,
    pub table_oid: TableOid,
    pub table_name: String,
    pub filter_predicate: Option<ExpressionRef>,
}

#[derive(Debug, Clone)]
pub struct IndexScanPlanNode {
    pub output_schema: SchemaRef,
    pub table_oid: TableOid,
    pub index_oid: IndexOid,
    pub filter_predicate: Option<ExpressionRef>,
    /// The constant to probe the hash index with.
    pub pred_key: Value,
}

#[derive(Debug, Clone)]
pub struct ValuesPlanNode {
    pub output_schema: SchemaRef,
    pub rows: Vec<Vec<ExpressionRef>>,
}

#[derive(Debug, Clone)]
pub struct FilterPlanNode {
    pub output_schema: SchemaRef,
    pub predicate: ExpressionRef,
    pub child: PlanNodeRef,
}

#[derive(Debug, Clone)]
pub struct InsertPlanNode {
    pub output_schema: SchemaRef,
    pub table_oid: TableOid,
    pub child: PlanNodeRef,
}

#[derive(Debug, Clone)]
pub struct UpdatePlanNode {
    pub output_schema: SchemaRef,
    pub table_oid: TableOid,
    /// One expression per table column producing the new value.
    pub target_expressions: Vec<ExpressionRef>,
    pub child: PlanNodeRef,
}

#[derive(Debug, Clone)]
pub struct DeletePlanNode {
    pub output_schema: SchemaRef,
    pub table_oid: TableOid,
    pub child: PlanNodeRef,
}

#[derive(Debug, Clone)]
pub struct NestedLoopJoinPlanNode {
    pub output_schema: SchemaRef,
    pub left: PlanNodeRef,
    pub right: PlanNodeRef,
    pub predicate: ExpressionRef,
    pub join_type: JoinType,
}

#[derive(Debug, Clone)]
pub struct HashJoinPlanNode {
    pub output_schema: SchemaRef,
    pub left: PlanNodeRef,
    pub right: PlanNodeRef,
    pub left_key_expressions: Vec<ExpressionRef>,
    pub right_key_expressions: Vec<ExpressionRef>,
    pub join_type: JoinType,
}

#[derive(Debug, Clone)]
pub struct AggregationPlanNode {
    pub output_schema: SchemaRef,
    pub child: PlanNodeRef,
    pub group_bys: Vec<ExpressionRef>,
    pub aggregates: Vec<ExpressionRef>,
    pub agg_types: Vec<AggregationType>,
}

#[derive(Debug, Clone)]
pub struct SortPlanNode {
    pub output_schema: SchemaRef,
    pub child: PlanNodeRef,
    pub order_bys: Vec<OrderBy>,
}

#[derive(Debug, Clone)]
pub struct LimitPlanNode {
    pub output_schema: SchemaRef,
    pub child: PlanNodeRef,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct TopNPlanNode {
    pub output_schema: SchemaRef,
    pub child: PlanNodeRef,
    pub order_bys: Vec<OrderBy>,
    pub n: usize,
}

/// One window over the input: the aggregated expression, its partitioning,
/// and its intra-partition ordering.
#[derive(Debug, Clone)]
pub struct WindowFunction {
    pub function: Option<ExpressionRef>,
    pub window_type: WindowFunctionType,
    pub partition_by: Vec<ExpressionRef>,
    pub order_by: Vec<OrderBy>,
}

#[derive(Debug, Clone)]
pub struct WindowPlanNode {
    pub output_schema: SchemaRef,
    pub child: PlanNodeRef,
    /// Output column expressions; placeholders at window positions.
    pub columns: Vec<ExpressionRef>,
    /// Window definitions keyed by output column position.
    pub window_functions: HashMap<usize, WindowFunction>,
}

#[derive(Debug, Clone)]
pub enum PlanNode {
    SeqScan(SeqScanPlanNode),
    IndexScan(IndexScanPlanNode),
    Values(ValuesPlanNode),
    Filter(FilterPlanNode),
    Insert(InsertPlanNode),
    Update(UpdatePlanNode),
    Delete(DeletePlanNode),
    NestedLoopJoin(NestedLoopJoinPlanNode),
    HashJoin(HashJoinPlanNode),
    Aggregation(AggregationPlanNode),
    Sort(SortPlanNode),
    Limit(LimitPlanNode),
    TopN(TopNPlanNode),
    Window(WindowPlanNode),
}

impl PlanNode {
    pub fn output_schema(&self) -> &SchemaRef {
        match self {
            PlanNode::SeqScan(p) => &p.output_schema,
            PlanNode::IndexScan(p) => &p.output_schema,
            PlanNode::Values(p) => &p.output_schema,
            PlanNode::Filter(p) => &p.output_schema,
            PlanNode::Insert(p) => &p.output_schema,
            PlanNode::Update(p) => &p.output_schema,
            PlanNode::Delete(p) => &p.output_schema,
            PlanNode::NestedLoopJoin(p) => &p.output_schema,
            PlanNode::HashJoin(p) => &p.output_schema,
            PlanNode::Aggregation(p) => &p.output_schema,
            PlanNode::Sort(p) => &p.output_schema,
            PlanNode::Limit(p) => &p.output_schema,
            PlanNode::TopN(p) => &p.output_schema,
            PlanNode::Window(p) => &p.output_schema,
        }
    }

    pub fn children(&self) -> Vec<&PlanNodeRef> {
        match self {
            PlanNode::SeqScan(_) | PlanNode::IndexScan(_) | PlanNode::Values(_) => vec![],
            PlanNode::Filter(p) => vec![&p.child],
            PlanNode::Insert(p) => vec![&p.child],
            PlanNode::Update(p) => vec![&p.child],
            PlanNode::Delete(p) => vec![&p.child],
            PlanNode::NestedLoopJoin(p) => vec![&p.left, &p.right],
            PlanNode::HashJoin(p) => vec![&p.left, &p.right],
            PlanNode::Aggregation(p) => vec![&p.child],
            PlanNode::Sort(p) => vec![&p.child],
            PlanNode::Limit(p) => vec![&p.child],
            PlanNode::TopN(p) => vec![&p.child],
            PlanNode::Window(p) => vec![&p.child],
        }
    }

    /// Rebuild this node over new children, preserving everything else.
    /// Leaf nodes ignore the argument.
    pub fn with_children(&self, mut children: Vec<PlanNodeRef>) -> PlanNode {
        let mut take = || children.remove(0);
        match self {
            PlanNode::SeqScan(_) | PlanNode::IndexScan(_) | PlanNode::Values(_) => self.clone(),
            PlanNode::Filter(p) => PlanNode::Filter(FilterPlanNode {
                child: take(),
                ..p.clone()
            }),
            PlanNode::Insert(p) => PlanNode::Insert(InsertPlanNode {
                child: take(),
                ..p.clone()
            }),
            PlanNode::Update(p) => PlanNode::Update(UpdatePlanNode {
                child: take(),
                ..p.clone()
            }),
            PlanNode::Delete(p) => PlanNode::Delete(DeletePlanNode {
                child: take(),
                ..p.clone()
            }),
            PlanNode::NestedLoopJoin(p) => PlanNode::NestedLoopJoin(NestedLoopJoinPlanNode {
                left: take(),
                right: take(),
                ..p.clone()
            }),
            PlanNode::HashJoin(p) => PlanNode::HashJoin(HashJoinPlanNode {
                left: take(),
                right: take(),
                ..p.clone()
            }),
            PlanNode::Aggregation(p) => PlanNode::Aggregation(AggregationPlanNode {
                child: take(),
                ..p.clone()
            }),
            PlanNode::Sort(p) => PlanNode::Sort(SortPlanNode {
                child: take(),
                ..p.clone()
            }),
            PlanNode::Limit(p) => PlanNode::Limit(LimitPlanNode {
                child: take(),
                ..p.clone()
            }),
            PlanNode::TopN(p) => PlanNode::TopN(TopNPlanNode {
                child: take(),
                ..p.clone()
            }),
            PlanNode::Window(p) => PlanNode::Window(WindowPlanNode {
                child: take(),
                ..p.clone()
            }),
        }
    }
}
