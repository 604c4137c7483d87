//! Integration tests for schema accumulation, tracing and ordering.
//!
//! These tests run full migration steps through the facade crate: build a
//! base schema, fold deltas into it, re-resolve foreign keys, commit and
//! order the result.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tabula::relation::RelationPool;
use tabula::schema::{
    Column, ColumnType, Entry, EntryFlags, ErrorCode, ReentryKey, Schema, Table, TypeRecord,
    rename_graph, trace_reentry,
};

fn users_base() -> Schema {
    let mut schema = Schema::new("app", 1);
    schema
        .create_table("users")
        .add_column(Column::new("id", ColumnType::Int).primary())
        .expect("Failed to add column");
    schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);
    schema
}

fn posts_delta(version: u64) -> Schema {
    let mut delta = Schema::new("app", version);
    delta
        .create_table("posts")
        .add_column(Column::new("id", ColumnType::Int).primary())
        .expect("Failed to add column")
        .add_column(Column::new("user_id", ColumnType::Int).reference("users", "id"))
        .expect("Failed to add column");
    delta
}

fn ordered_names(schema: &mut Schema) -> Vec<String> {
    schema
        .arrange()
        .into_iter()
        .filter_map(Entry::name)
        .map(str::to_string)
        .collect()
}

/// Test a full migration step ordering a referencing table last
#[test]
fn test_added_table_is_ordered_after_target() {
    let mut schema = users_base();
    schema.accumulate(posts_delta(2)).expect("Failed to accumulate");
    schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);
    schema.trace_foreign().expect("Failed to trace foreign keys");

    assert_eq!(schema.version(), 2);
    assert_eq!(ordered_names(&mut schema), vec!["users", "posts"]);
}

/// Test that a dropped column disappears with its foreign key
#[test]
fn test_dropped_column_leaves_foreigns() {
    let mut schema = users_base();
    schema.accumulate(posts_delta(2)).expect("Failed to accumulate");
    schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);
    assert_eq!(schema.find("posts").unwrap().foreigns(), &["user_id"]);

    let mut delta = Schema::new("app", 3);
    delta
        .alter_table("posts")
        .drop_column("user_id")
        .expect("Failed to drop column");
    schema.accumulate(delta).expect("Failed to accumulate");

    let posts = schema.find("posts").unwrap();
    assert!(!posts.has_column("user_id"));
    assert!(posts.foreigns().is_empty());
    assert_eq!(posts.foreign_columns().count(), 0);
}

/// Test that a self-referencing table is returned once and flagged
#[test]
fn test_self_reference_is_returned_once() {
    let mut schema = Schema::new("app", 1);
    schema
        .create_table("t1")
        .add_column(Column::new("id", ColumnType::Int).primary())
        .unwrap()
        .add_column(Column::new("parent_id", ColumnType::Int).reference("t1", "id"))
        .unwrap();
    schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);

    let ordered = schema.arrange();
    assert_eq!(ordered.len(), 1);
    assert_eq!(ordered[0].name(), Some("t1"));
    assert!(ordered[0].flags().is_reference_cycle());
}

/// Test that mutually referencing tables terminate and are both returned
#[test]
fn test_mutual_reference_is_flagged() {
    let mut schema = Schema::new("app", 1);
    schema
        .create_table("a")
        .add_column(Column::new("b_id", ColumnType::Int).reference("b", "id"))
        .unwrap();
    schema
        .create_table("b")
        .add_column(Column::new("a_id", ColumnType::Int).reference("a", "id"))
        .unwrap();
    schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);

    let mut names = ordered_names(&mut schema);
    names.sort();
    assert_eq!(names, vec!["a", "b"]);

    let flagged = schema
        .tables()
        .iter()
        .filter(|table| table.flags().is_reference_cycle())
        .count();
    assert!(flagged >= 1);
}

/// Test rename chains with and without consuming the history
#[test]
fn test_rename_chain_trace() {
    let mut tables: TypeRecord<Table> = TypeRecord::new("schema");
    tables.insert(Table::rename_placeholder("a", "b"));
    tables.insert(Table::rename_placeholder("b", "c"));
    let mut pool = RelationPool::new(8);

    let mut graph = rename_graph(&tables, 0, &mut pool, 4);
    for _ in 0..3 {
        assert_eq!(
            trace_reentry(&mut graph, &mut pool, "a", false),
            Some(ReentryKey::name("c"))
        );
    }

    assert_eq!(
        trace_reentry(&mut graph, &mut pool, "a", true),
        Some(ReentryKey::name("c"))
    );
    assert_eq!(trace_reentry(&mut graph, &mut pool, "a", true), None);
    graph.clear(&mut pool);
    assert!(pool.is_empty());
}

/// Test that foreign keys follow a chained table rename
#[test]
fn test_foreign_keys_follow_renames() {
    let mut schema = users_base();
    schema.accumulate(posts_delta(2)).unwrap();
    schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);

    let mut delta = Schema::new("app", 3);
    delta.rename_table("users", "members");
    delta.rename_table("members", "accounts");
    delta.alter_table("accounts").rename_column("id", "uid").unwrap();
    schema.accumulate(delta).unwrap();
    schema.trace_foreign().expect("Failed to trace foreign keys");

    let posts = schema.find("posts").unwrap();
    let foreign = posts.column("user_id").unwrap().foreign.as_ref().unwrap();
    assert_eq!((foreign.table.as_str(), foreign.column.as_str()), ("accounts", "uid"));

    schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);
    assert_eq!(ordered_names(&mut schema), vec!["accounts", "posts"]);
}

/// Test that tracing a dropped target reports the drop
#[test]
fn test_trace_reports_dropped_target() {
    let mut schema = users_base();
    schema.accumulate(posts_delta(2)).unwrap();
    schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);

    let mut delta = Schema::new("app", 3);
    delta.drop_table("users");
    schema.accumulate(delta).unwrap();

    let err = schema.trace_foreign().unwrap_err();
    assert_eq!(err.code(), ErrorCode::ReentryDropped);
}

/// Test that an acyclic chain ranks strictly upward
#[test]
fn test_acyclic_chain() {
    let mut schema = Schema::new("app", 1);
    for (table, target) in [("c", "b"), ("b", "a")] {
        schema
            .create_table(table)
            .add_column(Column::new("parent", ColumnType::Int).reference(target, "id"))
            .unwrap();
    }
    schema.create_table("a");
    schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);

    let ordered = schema.arrange();
    let ranks: Vec<_> = ordered.iter().map(|table| (table.name().unwrap(), table.rank())).collect();
    assert_eq!(ranks, vec![("a", 1), ("b", 2), ("c", 3)]);
    assert!(ordered.iter().all(|table| !table.flags().is_reference_cycle()));
}

/// Test that commit leaves no pending change behind
#[test]
fn test_commit_leaves_no_placeholders() {
    let mut schema = users_base();
    schema.accumulate(posts_delta(2)).unwrap();

    let mut delta = Schema::new("app", 3);
    delta.rename_table("posts", "articles");
    delta.create_table("tags");
    delta.drop_table("tags");
    delta.alter_table("users").rename_column("id", "uid").unwrap();
    schema.accumulate(delta).unwrap();
    schema.clear_changes(EntryFlags::EMPTY, EntryFlags::EMPTY);

    assert!(!schema.flags().is_change());
    assert_eq!(schema.offset(), schema.tables().len());
    for table in schema.tables().iter() {
        assert!(!table.is_placeholder());
        assert!(!table.flags().is_change());
        assert!(table.columns().iter().all(|column| !column.is_placeholder()));
    }
    assert!(schema.find("articles").is_some());
    assert!(schema.find("tags").is_none());
}

/// Test that static tables are shared until a commit copies them
#[test]
fn test_static_table_is_protected() {
    let mut columns: TypeRecord<Column> = TypeRecord::new("Country");
    columns.insert(Column::new("code", ColumnType::String).with_size(2));
    let countries = Arc::new(Table::with_columns("countries", Arc::new(columns)));

    let mut schema = Schema::new("app", 1);
    schema.insert_static(countries);

    let mut delta = Schema::new("app", 2);
    delta
        .alter_table("countries")
        .add_column(Column::new("name", ColumnType::String))
        .unwrap();
    let err = schema.accumulate(delta).unwrap_err();
    assert_eq!(err.code(), ErrorCode::StaticData);
    assert!(schema.find("countries").unwrap().is_static());
}
