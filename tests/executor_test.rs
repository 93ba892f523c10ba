use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use karstdb::catalog::schema::{Column, DataType, Schema};
use karstdb::catalog::Value;
use karstdb::query::execute_plan;
use karstdb::query::expression::{ComparisonOp, Expression};
use karstdb::query::plan::{
    AggregationPlanNode, AggregationType, HashJoinPlanNode, JoinType, LimitPlanNode,
    NestedLoopJoinPlanNode, OrderByType, PlanNode, PlanNodeRef, SortPlanNode, TopNPlanNode,
    WindowFunction, WindowFunctionType, WindowPlanNode,
};

mod common;
use common::*;

fn joined_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Column::new("l1", DataType::Integer),
        Column::new("l2", DataType::Integer),
        Column::new("r1", DataType::Integer),
        Column::new("r2", DataType::Integer),
    ]))
}

/// Predicate `L.c1 = R.c1 AND L.c2 = R.c2`.
fn equi_predicate() -> karstdb::query::expression::ExpressionRef {
    Expression::and(
        Expression::comparison(
            ComparisonOp::Equal,
            Expression::join_column(0, 0),
            Expression::join_column(1, 0),
        ),
        Expression::comparison(
            ComparisonOp::Equal,
            Expression::join_column(0, 1),
            Expression::join_column(1, 1),
        ),
    )
}

#[test]
fn test_nested_loop_join_inner_and_left() -> Result<()> {
    let db = create_test_db()?;
    let left = values_plan(two_int_schema(), &[vec![1, 1], vec![2, 2]]);
    let right = values_plan(two_int_schema(), &[vec![2, 2], vec![3, 3]]);
    let txn = begin(&db);
    let ctx = exec_ctx(&db, &txn);

    let inner = Arc::new(PlanNode::NestedLoopJoin(NestedLoopJoinPlanNode {
        output_schema: joined_schema(),
        left: Arc::clone(&left),
        right: Arc::clone(&right),
        predicate: equi_predicate(),
        join_type: JoinType::Inner,
    }));
    let rows = execute_plan(&ctx, &inner)?;
    assert_eq!(as_int_rows(&rows), vec![vec![Some(2), Some(2), Some(2), Some(2)]]);

    let left_join = Arc::new(PlanNode::NestedLoopJoin(NestedLoopJoinPlanNode {
        output_schema: joined_schema(),
        left,
        right,
        predicate: equi_predicate(),
        join_type: JoinType::Left,
    }));
    let rows = execute_plan(&ctx, &left_join)?;
    assert_eq!(
        as_int_rows(&rows),
        vec![
            vec![Some(1), Some(1), None, None],
            vec![Some(2), Some(2), Some(2), Some(2)],
        ]
    );
    Ok(())
}

#[test]
fn test_hash_join_matches_nested_loop() -> Result<()> {
    let db = create_test_db()?;
    let left = values_plan(two_int_schema(), &[vec![1, 1], vec![2, 2]]);
    let right = values_plan(two_int_schema(), &[vec![2, 2], vec![3, 3]]);
    let txn = begin(&db);
    let ctx = exec_ctx(&db, &txn);

    for join_type in [JoinType::Inner, JoinType::Left] {
        let hash = Arc::new(PlanNode::HashJoin(HashJoinPlanNode {
            output_schema: joined_schema(),
            left: Arc::clone(&left),
            right: Arc::clone(&right),
            left_key_expressions: vec![Expression::column(0), Expression::column(1)],
            right_key_expressions: vec![Expression::column(0), Expression::column(1)],
            join_type,
        }));
        let nlj = Arc::new(PlanNode::NestedLoopJoin(NestedLoopJoinPlanNode {
            output_schema: joined_schema(),
            left: Arc::clone(&left),
            right: Arc::clone(&right),
            predicate: equi_predicate(),
            join_type,
        }));
        assert_eq!(
            as_int_rows(&execute_plan(&ctx, &hash)?),
            as_int_rows(&execute_plan(&ctx, &nlj)?),
            "{:?}",
            join_type
        );
    }
    Ok(())
}

#[test]
fn test_aggregation_with_groups() -> Result<()> {
    let db = create_test_db()?;
    let input = values_plan(
        two_int_schema(),
        &[vec![1, 10], vec![1, 20], vec![2, 5], vec![2, 7], vec![1, 30]],
    );
    let txn = begin(&db);

    let schema = Arc::new(Schema::new(vec![
        Column::new("c1", DataType::Integer),
        Column::new("count_star", DataType::Integer),
        Column::new("sum_c2", DataType::Integer),
        Column::new("min_c2", DataType::Integer),
        Column::new("max_c2", DataType::Integer),
    ]));
    let agg = Arc::new(PlanNode::Aggregation(AggregationPlanNode {
        output_schema: schema,
        child: input,
        group_bys: vec![Expression::column(0)],
        aggregates: vec![
            Expression::column(1),
            Expression::column(1),
            Expression::column(1),
            Expression::column(1),
        ],
        agg_types: vec![
            AggregationType::CountStar,
            AggregationType::Sum,
            AggregationType::Min,
            AggregationType::Max,
        ],
    }));

    let rows = execute_plan(&exec_ctx(&db, &txn), &agg)?;
    // Groups come out in first-seen order.
    assert_eq!(
        as_int_rows(&rows),
        vec![
            vec![Some(1), Some(3), Some(60), Some(10), Some(30)],
            vec![Some(2), Some(2), Some(12), Some(5), Some(7)],
        ]
    );
    Ok(())
}

#[test]
fn test_aggregation_empty_input_without_groups() -> Result<()> {
    let db = create_test_db()?;
    let input = values_plan(two_int_schema(), &[]);
    let txn = begin(&db);

    let schema = Arc::new(Schema::new(vec![
        Column::new("count_star", DataType::Integer),
        Column::new("sum_c2", DataType::Integer),
    ]));
    let agg = Arc::new(PlanNode::Aggregation(AggregationPlanNode {
        output_schema: schema,
        child: input,
        group_bys: vec![],
        aggregates: vec![Expression::column(1), Expression::column(1)],
        agg_types: vec![AggregationType::CountStar, AggregationType::Sum],
    }));

    let rows = execute_plan(&exec_ctx(&db, &txn), &agg)?;
    assert_eq!(as_int_rows(&rows), vec![vec![Some(0), None]]);
    Ok(())
}

#[test]
fn test_sort_and_limit() -> Result<()> {
    let db = create_test_db()?;
    let input = values_plan(
        two_int_schema(),
        &[vec![3, 1], vec![1, 2], vec![2, 2], vec![2, 1], vec![1, 1]],
    );
    let txn = begin(&db);

    let sort = Arc::new(PlanNode::Sort(SortPlanNode {
        output_schema: two_int_schema(),
        child: input,
        order_bys: vec![
            (OrderByType::Asc, Expression::column(0)),
            (OrderByType::Desc, Expression::column(1)),
        ],
    }));
    let limited = Arc::new(PlanNode::Limit(LimitPlanNode {
        output_schema: two_int_schema(),
        child: Arc::clone(&sort),
        limit: 3,
    }));

    let rows = execute_plan(&exec_ctx(&db, &txn), &limited)?;
    assert_eq!(
        as_int_rows(&rows),
        vec![
            vec![Some(1), Some(2)],
            vec![Some(1), Some(1)],
            vec![Some(2), Some(2)],
        ]
    );
    Ok(())
}

#[test]
fn test_topn_equals_sort_plus_limit() -> Result<()> {
    let db = create_test_db()?;
    let input = values_plan(
        two_int_schema(),
        &[vec![3, 1], vec![1, 2], vec![2, 2], vec![2, 1], vec![1, 1]],
    );
    let txn = begin(&db);

    let order_bys = vec![
        (OrderByType::Asc, Expression::column(0)),
        (OrderByType::Desc, Expression::column(1)),
    ];
    let topn = Arc::new(PlanNode::TopN(TopNPlanNode {
        output_schema: two_int_schema(),
        child: input,
        order_bys,
        n: 3,
    }));

    let rows = execute_plan(&exec_ctx(&db, &txn), &topn)?;
    assert_eq!(
        as_int_rows(&rows),
        vec![
            vec![Some(1), Some(2)],
            vec![Some(1), Some(1)],
            vec![Some(2), Some(2)],
        ]
    );
    Ok(())
}

#[test]
fn test_window_rank_and_running_sum() -> Result<()> {
    let db = create_test_db()?;
    // (partition, score)
    let input = values_plan(
        two_int_schema(),
        &[vec![1, 30], vec![1, 10], vec![2, 10], vec![1, 10], vec![2, 20]],
    );
    let txn = begin(&db);

    let schema = Arc::new(Schema::new(vec![
        Column::new("c1", DataType::Integer),
        Column::new("c2", DataType::Integer),
        Column::new("rank", DataType::Integer),
        Column::new("running_sum", DataType::Integer),
    ]));

    let order_by = vec![(OrderByType::Asc, Expression::column(1))];
    let mut window_functions = HashMap::new();
    window_functions.insert(
        2,
        WindowFunction {
            function: None,
            window_type: WindowFunctionType::Rank,
            partition_by: vec![Expression::column(0)],
            order_by: order_by.clone(),
        },
    );
    window_functions.insert(
        3,
        WindowFunction {
            function: Some(Expression::column(1)),
            window_type: WindowFunctionType::Sum,
            partition_by: vec![Expression::column(0)],
            order_by,
        },
    );

    let window = Arc::new(PlanNode::Window(WindowPlanNode {
        output_schema: schema,
        child: input,
        columns: vec![
            Expression::column(0),
            Expression::column(1),
            Expression::constant(Value::Null),
            Expression::constant(Value::Null),
        ],
        window_functions,
    }));

    let rows = execute_plan(&exec_ctx(&db, &txn), &window)?;
    // Rows come out sorted by score; rank and running sum are tracked per
    // partition.
    assert_eq!(
        as_int_rows(&rows),
        vec![
            vec![Some(1), Some(10), Some(1), Some(10)],
            vec![Some(2), Some(10), Some(1), Some(10)],
            vec![Some(1), Some(10), Some(1), Some(20)],
            vec![Some(2), Some(20), Some(2), Some(30)],
            vec![Some(1), Some(30), Some(3), Some(50)],
        ]
    );
    Ok(())
}

#[test]
fn test_window_partition_total_without_order_by() -> Result<()> {
    let db = create_test_db()?;
    let input = values_plan(two_int_schema(), &[vec![1, 10], vec![2, 5], vec![1, 20]]);
    let txn = begin(&db);

    let schema = Arc::new(Schema::new(vec![
        Column::new("c1", DataType::Integer),
        Column::new("total", DataType::Integer),
    ]));
    let mut window_functions = HashMap::new();
    window_functions.insert(
        1,
        WindowFunction {
            function: Some(Expression::column(1)),
            window_type: WindowFunctionType::Sum,
            partition_by: vec![Expression::column(0)],
            order_by: vec![],
        },
    );

    let window = Arc::new(PlanNode::Window(WindowPlanNode {
        output_schema: schema,
        child: input,
        columns: vec![Expression::column(0), Expression::constant(Value::Null)],
        window_functions,
    }));

    let rows = execute_plan(&exec_ctx(&db, &txn), &window)?;
    // Every row of a partition carries the partition-wide total, in input
    // order.
    assert_eq!(
        as_int_rows(&rows),
        vec![
            vec![Some(1), Some(30)],
            vec![Some(2), Some(5)],
            vec![Some(1), Some(30)],
        ]
    );
    Ok(())
}

#[test]
fn test_index_scan_probe() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", two_int_schema())?;
    let index = db.catalog.create_index("t_c1", "t", "c1")?;

    let writer = begin(&db);
    execute_plan(
        &exec_ctx(&db, &writer),
        &insert_plan(&table, &[vec![1, 10], vec![5, 50], vec![9, 90]]),
    )?;
    assert!(db.txn_mgr.commit(&writer)?);

    let reader = begin(&db);
    let probe: PlanNodeRef = Arc::new(PlanNode::IndexScan(karstdb::query::plan::IndexScanPlanNode {
        output_schema: two_int_schema(),
        table_oid: table.oid,
        index_oid: index.oid,
        filter_predicate: None,
        pred_key: Value::Integer(5),
    }));
    let rows = execute_plan(&exec_ctx(&db, &reader), &probe)?;
    assert_eq!(as_int_rows(&rows), vec![vec![Some(5), Some(50)]]);

    let miss: PlanNodeRef = Arc::new(PlanNode::IndexScan(karstdb::query::plan::IndexScanPlanNode {
        output_schema: two_int_schema(),
        table_oid: table.oid,
        index_oid: index.oid,
        filter_predicate: None,
        pred_key: Value::Integer(4),
    }));
    assert!(execute_plan(&exec_ctx(&db, &reader), &miss)?.is_empty());
    Ok(())
}
