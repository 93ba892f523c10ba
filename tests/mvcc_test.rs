use std::sync::Arc;

use anyhow::Result;

use karstdb::catalog::Value;
use karstdb::query::execute_plan;
use karstdb::query::expression::Expression;
use karstdb::query::plan::{PlanNode, UpdatePlanNode};
use karstdb::transaction::TransactionState;

mod common;
use common::*;

/// UPDATE t SET c2 = <new> (over a full scan).
fn update_all_plan(table: &karstdb::catalog::TableInfo, new_c2: i64) -> karstdb::query::plan::PlanNodeRef {
    Arc::new(PlanNode::Update(UpdatePlanNode {
        output_schema: count_schema(),
        table_oid: table.oid,
        target_expressions: vec![
            Expression::column(0),
            Expression::constant(Value::Integer(new_c2)),
        ],
        child: seq_scan_plan(table),
    }))
}

#[test]
fn test_uncommitted_insert_is_invisible() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", two_int_schema())?;

    let writer = begin(&db);
    let rows = execute_plan(&exec_ctx(&db, &writer), &insert_plan(&table, &[vec![1, 10]]))?;
    assert_eq!(as_int_rows(&rows), vec![vec![Some(1)]]);

    // The writer sees its own insert.
    let seen = execute_plan(&exec_ctx(&db, &writer), &seq_scan_plan(&table))?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(1), Some(10)]]);

    // A concurrent snapshot does not.
    let reader = begin(&db);
    let seen = execute_plan(&exec_ctx(&db, &reader), &seq_scan_plan(&table))?;
    assert!(seen.is_empty());

    // After commit, a fresh snapshot does.
    assert!(db.txn_mgr.commit(&writer)?);
    let late_reader = begin(&db);
    let seen = execute_plan(&exec_ctx(&db, &late_reader), &seq_scan_plan(&table))?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(1), Some(10)]]);

    // The old snapshot still sees nothing.
    let seen = execute_plan(&exec_ctx(&db, &reader), &seq_scan_plan(&table))?;
    assert!(seen.is_empty());
    Ok(())
}

#[test]
fn test_duplicate_key_write_taints_second_writer() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", two_int_schema())?;
    db.catalog.create_index("t_c1", "t", "c1")?;

    // B snapshots before A commits, then collides with A's key.
    let a = begin(&db);
    let b = begin(&db);

    execute_plan(&exec_ctx(&db, &a), &insert_plan(&table, &[vec![1, 10]]))?;
    assert!(db.txn_mgr.commit(&a)?);

    let err = execute_plan(&exec_ctx(&db, &b), &insert_plan(&table, &[vec![1, 99]]));
    assert!(err.is_err());
    assert_eq!(b.state(), TransactionState::Tainted);

    // Abort accepts the tainted transaction.
    db.txn_mgr.abort(&b)?;
    assert_eq!(b.state(), TransactionState::Aborted);

    // The surviving value is A's.
    let reader = begin(&db);
    let seen = execute_plan(&exec_ctx(&db, &reader), &seq_scan_plan(&table))?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(1), Some(10)]]);
    Ok(())
}

#[test]
fn test_update_conflict_on_newer_commit() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", two_int_schema())?;

    // Row committed at ts=1.
    let setup = begin(&db);
    execute_plan(&exec_ctx(&db, &setup), &insert_plan(&table, &[vec![1, 10]]))?;
    assert!(db.txn_mgr.commit(&setup)?);

    // B snapshots at ts=1; A then overwrites the row at ts=2.
    let b = begin(&db);
    let a = begin(&db);
    execute_plan(&exec_ctx(&db, &a), &update_all_plan(&table, 20))?;
    assert!(db.txn_mgr.commit(&a)?);

    // B still reads the old version through the undo chain...
    let seen = execute_plan(&exec_ctx(&db, &b), &seq_scan_plan(&table))?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(1), Some(10)]]);

    // ...but writing the row is a write-write conflict.
    let err = execute_plan(&exec_ctx(&db, &b), &update_all_plan(&table, 30));
    assert!(err.is_err());
    assert_eq!(b.state(), TransactionState::Tainted);
    db.txn_mgr.abort(&b)?;
    Ok(())
}

#[test]
fn test_snapshot_reads_reconstruct_old_versions() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", two_int_schema())?;

    let setup = begin(&db);
    execute_plan(&exec_ctx(&db, &setup), &insert_plan(&table, &[vec![1, 10], vec![2, 20]]))?;
    assert!(db.txn_mgr.commit(&setup)?);

    let old_reader = begin(&db);

    // The writer updates every row but has not committed.
    let writer = begin(&db);
    execute_plan(&exec_ctx(&db, &writer), &update_all_plan(&table, 77))?;

    // The writer sees the new values.
    let seen = execute_plan(&exec_ctx(&db, &writer), &seq_scan_plan(&table))?;
    assert_eq!(
        as_int_rows(&seen),
        vec![vec![Some(1), Some(77)], vec![Some(2), Some(77)]]
    );

    // Other transactions reconstruct the old versions, before and after
    // the writer commits.
    let seen = execute_plan(&exec_ctx(&db, &old_reader), &seq_scan_plan(&table))?;
    assert_eq!(
        as_int_rows(&seen),
        vec![vec![Some(1), Some(10)], vec![Some(2), Some(20)]]
    );

    assert!(db.txn_mgr.commit(&writer)?);
    let seen = execute_plan(&exec_ctx(&db, &old_reader), &seq_scan_plan(&table))?;
    assert_eq!(
        as_int_rows(&seen),
        vec![vec![Some(1), Some(10)], vec![Some(2), Some(20)]]
    );
    Ok(())
}

#[test]
fn test_delete_leaves_tombstone_for_old_snapshots() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", two_int_schema())?;

    let setup = begin(&db);
    execute_plan(&exec_ctx(&db, &setup), &insert_plan(&table, &[vec![1, 10]]))?;
    assert!(db.txn_mgr.commit(&setup)?);

    let old_reader = begin(&db);

    let deleter = begin(&db);
    let delete = Arc::new(PlanNode::Delete(karstdb::query::plan::DeletePlanNode {
        output_schema: count_schema(),
        table_oid: table.oid,
        child: seq_scan_plan(&table),
    }));
    let rows = execute_plan(&exec_ctx(&db, &deleter), &delete)?;
    assert_eq!(as_int_rows(&rows), vec![vec![Some(1)]]);
    assert!(db.txn_mgr.commit(&deleter)?);

    // The old snapshot still sees the row; a new one does not.
    let seen = execute_plan(&exec_ctx(&db, &old_reader), &seq_scan_plan(&table))?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(1), Some(10)]]);

    let new_reader = begin(&db);
    let seen = execute_plan(&exec_ctx(&db, &new_reader), &seq_scan_plan(&table))?;
    assert!(seen.is_empty());
    Ok(())
}

#[test]
fn test_revival_updates_every_index() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", two_int_schema())?;
    db.catalog.create_index("t_c1", "t", "c1")?;
    let c2_index = db.catalog.create_index("t_c2", "t", "c2")?;

    let setup = begin(&db);
    execute_plan(&exec_ctx(&db, &setup), &insert_plan(&table, &[vec![10, 20]]))?;
    assert!(db.txn_mgr.commit(&setup)?);

    let deleter = begin(&db);
    let delete = Arc::new(PlanNode::Delete(karstdb::query::plan::DeletePlanNode {
        output_schema: count_schema(),
        table_oid: table.oid,
        child: seq_scan_plan(&table),
    }));
    execute_plan(&exec_ctx(&db, &deleter), &delete)?;
    assert!(db.txn_mgr.commit(&deleter)?);

    // The insert probes the c1 index, finds the tombstone, and revives it
    // in place. The c2 index carries a different key now and must be
    // brought in line too.
    let writer = begin(&db);
    let rows = execute_plan(&exec_ctx(&db, &writer), &insert_plan(&table, &[vec![10, 99]]))?;
    assert_eq!(as_int_rows(&rows), vec![vec![Some(1)]]);
    assert!(db.txn_mgr.commit(&writer)?);

    // Probing c2 for the new value reaches the revived row.
    let reader = begin(&db);
    let probe = Arc::new(PlanNode::IndexScan(karstdb::query::plan::IndexScanPlanNode {
        output_schema: two_int_schema(),
        table_oid: table.oid,
        index_oid: c2_index.oid,
        filter_predicate: None,
        pred_key: Value::Integer(99),
    }));
    let seen = execute_plan(&exec_ctx(&db, &reader), &probe)?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(10), Some(99)]]);

    let seen = execute_plan(&exec_ctx(&db, &reader), &seq_scan_plan(&table))?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(10), Some(99)]]);
    Ok(())
}

#[test]
fn test_gc_respects_watermark() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", two_int_schema())?;

    let setup = begin(&db);
    execute_plan(&exec_ctx(&db, &setup), &insert_plan(&table, &[vec![1, 10]]))?;
    assert!(db.txn_mgr.commit(&setup)?);

    // Pin a reader at ts=1, then overwrite the row twice.
    let pinned = begin(&db);
    for new_value in [20, 30] {
        let writer = begin(&db);
        execute_plan(&exec_ctx(&db, &writer), &update_all_plan(&table, new_value))?;
        assert!(db.txn_mgr.commit(&writer)?);
    }

    db.txn_mgr.garbage_collection()?;

    // The pinned reader can still reconstruct its snapshot.
    let seen = execute_plan(&exec_ctx(&db, &pinned), &seq_scan_plan(&table))?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(1), Some(10)]]);

    // Once it finishes, GC may reclaim the writers' undo history.
    db.txn_mgr.abort(&pinned)?;
    db.txn_mgr.garbage_collection()?;

    let fresh = begin(&db);
    let seen = execute_plan(&exec_ctx(&db, &fresh), &seq_scan_plan(&table))?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(1), Some(30)]]);
    Ok(())
}

#[test]
fn test_self_update_amends_undo_log() -> Result<()> {
    let db = create_test_db()?;
    let table = db.catalog.create_table("t", two_int_schema())?;

    let setup = begin(&db);
    execute_plan(&exec_ctx(&db, &setup), &insert_plan(&table, &[vec![1, 10]]))?;
    assert!(db.txn_mgr.commit(&setup)?);

    let old_reader = begin(&db);

    // Two updates by the same transaction: the undo log must keep the
    // pre-transaction image, not the intermediate one.
    let writer = begin(&db);
    execute_plan(&exec_ctx(&db, &writer), &update_all_plan(&table, 55))?;
    execute_plan(&exec_ctx(&db, &writer), &update_all_plan(&table, 66))?;
    assert!(db.txn_mgr.commit(&writer)?);

    let seen = execute_plan(&exec_ctx(&db, &old_reader), &seq_scan_plan(&table))?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(1), Some(10)]]);

    let fresh = begin(&db);
    let seen = execute_plan(&exec_ctx(&db, &fresh), &seq_scan_plan(&table))?;
    assert_eq!(as_int_rows(&seen), vec![vec![Some(1), Some(66)]]);
    Ok(())
}
