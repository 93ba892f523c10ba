// Plan Rewrite Rules
//
// Pattern rewrites applied bottom-up over bound plan trees:
//   - Filter over a bare SeqScan folds into the scan's predicate.
//   - SeqScan with a single `column = constant` predicate and a matching
//     index becomes an IndexScan probing that constant.
//   - Limit over Sort becomes TopN.
//   - NestedLoopJoin whose predicate is a conjunction of cross-side
//     equalities becomes HashJoin keyed on those columns.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::query::expression::{ComparisonOp, Expression, ExpressionRef, LogicOp};
use crate::query::plan::{
    HashJoinPlanNode, IndexScanPlanNode, PlanNode, PlanNodeRef, SeqScanPlanNode, TopNPlanNode,
};

pub struct Optimizer {
    catalog: Arc<Catalog>,
}

impl Optimizer {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Run every rewrite in order.
    pub fn optimize(&self, plan: &PlanNodeRef) -> PlanNodeRef {
        let plan = self.merge_filter_scan(plan);
        let plan = self.seq_scan_as_index_scan(&plan);
        let plan = self.sort_limit_as_topn(&plan);
        self.nlj_as_hash_join(&plan)
    }

    fn rewrite_children(&self, plan: &PlanNodeRef, rule: &dyn Fn(&PlanNodeRef) -> PlanNodeRef) -> PlanNodeRef {
        let children: Vec<PlanNodeRef> = plan.children().into_iter().map(rule).collect();
        Arc::new(plan.with_children(children))
    }

    /// Filter(SeqScan without predicate) -> SeqScan with the predicate.
    pub fn merge_filter_scan(&self, plan: &PlanNodeRef) -> PlanNodeRef {
        let plan = self.rewrite_children(plan, &|p| self.merge_filter_scan(p));
        if let PlanNode::Filter(filter) = plan.as_ref() {
            if let PlanNode::SeqScan(scan) = filter.child.as_ref() {
                if scan.filter_predicate.is_none() {
                    return Arc::new(PlanNode::SeqScan(SeqScanPlanNode {
                        output_schema: Arc::clone(&filter.output_schema),
                        table_oid: scan.table_oid,
                        table_name: scan.table_name.clone(),
                        filter_predicate: Some(Arc::clone(&filter.predicate)),
                    }));
                }
            }
        }
        plan
    }

    /// SeqScan with `column = constant` and an index on that column ->
    /// IndexScan probing the constant.
    pub fn seq_scan_as_index_scan(&self, plan: &PlanNodeRef) -> PlanNodeRef {
        let plan = self.rewrite_children(plan, &|p| self.seq_scan_as_index_scan(p));
        let PlanNode::SeqScan(scan) = plan.as_ref() else {
            return plan;
        };
        let Some(predicate) = &scan.filter_predicate else {
            return plan;
        };
        let Some((col_idx, key)) = Self::as_column_equals_constant(predicate) else {
            return plan;
        };
        for index in self.catalog.table_indexes(&scan.table_name) {
            if index.key_column == col_idx {
                return Arc::new(PlanNode::IndexScan(IndexScanPlanNode {
                    output_schema: Arc::clone(&scan.output_schema),
                    table_oid: scan.table_oid,
                    index_oid: index.oid,
                    filter_predicate: Some(Arc::clone(predicate)),
                    pred_key: key,
                }));
            }
        }
        plan
    }

    /// Limit(Sort(child)) -> TopN(child).
    pub fn sort_limit_as_topn(&self, plan: &PlanNodeRef) -> PlanNodeRef {
        let plan = self.rewrite_children(plan, &|p| self.sort_limit_as_topn(p));
        if let PlanNode::Limit(limit) = plan.as_ref() {
            if let PlanNode::Sort(sort) = limit.child.as_ref() {
                return Arc::new(PlanNode::TopN(TopNPlanNode {
                    output_schema: Arc::clone(&limit.output_schema),
                    child: Arc::clone(&sort.child),
                    order_bys: sort.order_bys.clone(),
                    n: limit.limit,
                }));
            }
        }
        plan
    }

    /// NestedLoopJoin over a conjunction of cross-side equalities ->
    /// HashJoin keyed by those columns, each comparison reoriented so the
    /// left key comes from the left input.
    pub fn nlj_as_hash_join(&self, plan: &PlanNodeRef) -> PlanNodeRef {
        let plan = self.rewrite_children(plan, &|p| self.nlj_as_hash_join(p));
        let PlanNode::NestedLoopJoin(join) = plan.as_ref() else {
            return plan;
        };
        let mut left_keys = Vec::new();
        let mut right_keys = Vec::new();
        if !Self::collect_equi_conditions(&join.predicate, &mut left_keys, &mut right_keys) {
            return plan;
        }
        Arc::new(PlanNode::HashJoin(HashJoinPlanNode {
            output_schema: Arc::clone(&join.output_schema),
            left: Arc::clone(&join.left),
            right: Arc::clone(&join.right),
            left_key_expressions: left_keys,
            right_key_expressions: right_keys,
            join_type: join.join_type,
        }))
    }

    /// Match `column = constant` in either orientation, with no logic
    /// connectives.
    fn as_column_equals_constant(expr: &ExpressionRef) -> Option<(usize, crate::catalog::Value)> {
        let Expression::Comparison { op, left, right } = expr.as_ref() else {
            return None;
        };
        if *op != ComparisonOp::Equal {
            return None;
        }
        match (left.as_ref(), right.as_ref()) {
            (Expression::ColumnRef { col_idx, .. }, Expression::Constant(value))
            | (Expression::Constant(value), Expression::ColumnRef { col_idx, .. }) => {
                Some((*col_idx, value.clone()))
            }
            _ => None,
        }
    }

    /// Recurse through AND nodes collecting `left-column = right-column`
    /// pairs; any other shape fails the whole predicate.
    fn collect_equi_conditions(
        expr: &ExpressionRef,
        left_keys: &mut Vec<ExpressionRef>,
        right_keys: &mut Vec<ExpressionRef>,
    ) -> bool {
        match expr.as_ref() {
            Expression::Logic {
                op: LogicOp::And,
                left,
                right,
            } => {
                Self::collect_equi_conditions(left, left_keys, right_keys)
                    && Self::collect_equi_conditions(right, left_keys, right_keys)
            }
            Expression::Comparison {
                op: ComparisonOp::Equal,
                left,
                right,
            } => {
                let (Expression::ColumnRef { tuple_idx: l_side, .. }, Expression::ColumnRef { tuple_idx: r_side, .. }) =
                    (left.as_ref(), right.as_ref())
                else {
                    return false;
                };
                match (*l_side, *r_side) {
                    (0, 1) => {
                        left_keys.push(Arc::clone(left));
                        right_keys.push(Arc::clone(right));
                        true
                    }
                    (1, 0) => {
                        left_keys.push(Arc::clone(right));
                        right_keys.push(Arc::clone(left));
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }
}
