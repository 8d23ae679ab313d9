//! End-to-end import tests

use pretty_assertions::assert_eq;
use schemasketch_core::{
    BoolExpr, ColumnExpr, ColumnType, CompareOp, Literal, NameKey, QueryBody, SelectItem,
    Statement, TableIdent, TableSource, ValueExpr,
};
use schemasketch_sql::{ImportError, SqlImporter};

fn import(sql: &str) -> schemasketch_sql::ImportedStatement {
    SqlImporter::new()
        .import(sql)
        .unwrap_or_else(|errors| panic!("import failed: {errors:?}"))
}

fn import_err(sql: &str) -> Vec<ImportError> {
    SqlImporter::new()
        .import(sql)
        .expect_err("import should fail")
}

#[test]
fn simple_select_shape() {
    let imported = import("SELECT a, b AS x FROM dbo.T");

    let Statement::Select(query) = &imported.statement else {
        panic!("expected a select");
    };
    let select = query.as_select().unwrap();

    assert_eq!(
        select.from,
        Some(TableSource::Table(schemasketch_core::TableRef {
            table: TableIdent::with_schema("dbo", "T"),
            alias: None,
        }))
    );
    assert_eq!(select.items.len(), 2);
    let SelectItem::Expr { expr, alias: None } = &select.items[0] else {
        panic!("expected an unaliased item");
    };
    let ValueExpr::Column(column) = expr else {
        panic!("expected a column");
    };
    assert_eq!(column.source, Some(NameKey::new("T")));
    assert_eq!(column.name, NameKey::new("a"));

    let SelectItem::Expr {
        alias: Some(alias), ..
    } = &select.items[1]
    else {
        panic!("expected an aliased item");
    };
    assert_eq!(alias, &NameKey::new("x"));
}

#[test]
fn string_comparison_infers_text_255() {
    let imported = import("SELECT * FROM T WHERE T.Name = 'abc'");

    assert_eq!(imported.tables.len(), 1);
    let table = &imported.tables[0];
    assert_eq!(table.table, TableIdent::new("T"));

    let name = table.column("Name").unwrap();
    assert_eq!(name.column_type, ColumnType::String { length: Some(255) });
    assert!(!name.nullable);
}

#[test]
fn is_null_keeps_default_kind_and_marks_nullable() {
    let imported = import("SELECT * FROM T WHERE T.Id IS NULL");

    let id = imported.tables[0].column("Id").unwrap();
    assert_eq!(id.column_type, ColumnType::Int32);
    assert!(id.nullable);
}

#[test]
fn wildcard_projection_is_preserved() {
    let imported = import("SELECT * FROM T WHERE T.Id IS NULL");
    let Statement::Select(query) = &imported.statement else {
        panic!("expected a select");
    };
    let select = query.as_select().unwrap();
    assert_eq!(select.items, vec![SelectItem::Wildcard]);
}

#[test]
fn self_referential_cte_imports() {
    let imported = import(
        "WITH R AS (SELECT 1 AS n UNION ALL SELECT n + 1 FROM R WHERE n < 5) SELECT n FROM R",
    );

    let Statement::Select(query) = &imported.statement else {
        panic!("expected a select");
    };
    assert_eq!(query.ctes.len(), 1);
    assert_eq!(query.ctes[0].name, NameKey::new("R"));
    assert!(query.ctes[0].slot.is_resolved());

    // The outer FROM resolves to the deferred placeholder, and its body is
    // readable now that the registry filled it.
    let select = query.as_select().unwrap();
    let Some(TableSource::Cte(cte)) = &select.from else {
        panic!("expected a CTE reference");
    };
    assert_eq!(cte.name(), &NameKey::new("R"));
    assert!(cte.body().is_ok());

    // A CTE is not a physical table; nothing to synthesize.
    assert!(imported.tables.is_empty());
}

#[test]
fn top_percent_is_rejected() {
    let errors = import_err("SELECT TOP 10 PERCENT * FROM T");
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ImportError::Unsupported(_)));
    assert!(errors[0].to_string().contains("TOP PERCENT"));
}

#[test]
fn having_is_rejected() {
    let errors = import_err("SELECT a FROM T GROUP BY a HAVING COUNT(*) > 1");
    assert!(matches!(errors[0], ImportError::Unsupported(_)));
    assert!(errors[0].to_string().contains("HAVING"));
}

#[test]
fn multiple_statements_are_rejected() {
    let errors = import_err("SELECT 1; SELECT 2");
    assert!(matches!(errors[0], ImportError::Syntax(_)));
}

#[test]
fn import_is_deterministic() {
    let sql = "SELECT u.Id, o.Total FROM Users u \
               JOIN Orders o ON o.UserId = u.Id \
               WHERE o.Total > 10.5 AND u.Name LIKE 'A%'";

    let first = import(sql);
    let second = import(sql);

    assert_eq!(first.statement, second.statement);
    assert_eq!(first.tables, second.tables);
}

#[test]
fn join_comparison_propagates_evidence() {
    let imported = import(
        "SELECT u.Id FROM Users u \
         JOIN Orders o ON o.UserId = u.Id \
         WHERE o.Total > 10.5",
    );

    let mut names: Vec<String> = imported
        .tables
        .iter()
        .map(|t| t.table.to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Orders", "Users"]);

    let orders = imported
        .tables
        .iter()
        .find(|t| t.table == TableIdent::new("Orders"))
        .unwrap();
    assert_eq!(orders.column("Total").unwrap().column_type, ColumnType::Decimal);
    assert_eq!(orders.column("UserId").unwrap().column_type, ColumnType::Int32);
}

#[test]
fn emit_pass_bakes_types_learned_later_in_the_statement() {
    // The projection references T.Name before the WHERE clause supplies
    // the Text evidence; the snapshot is still present because the Collect
    // pass ran first.
    let imported = import("SELECT T.Name FROM T WHERE T.Name = 'abc'");

    let Statement::Select(query) = &imported.statement else {
        panic!("expected a select");
    };
    let select = query.as_select().unwrap();
    let SelectItem::Expr {
        expr: ValueExpr::Column(column),
        ..
    } = &select.items[0]
    else {
        panic!("expected a column item");
    };
    assert_eq!(
        column.column_type,
        Some(ColumnType::String { length: Some(255) })
    );
}

#[test]
fn conflicting_evidence_collapses_to_text() {
    let imported = import("SELECT * FROM T WHERE T.x = 'a' AND T.x = 1.5");

    let x = imported.tables[0].column("x").unwrap();
    assert!(matches!(x.column_type, ColumnType::String { .. }));
}

#[test]
fn in_list_merges_kinds_and_null_marks_nullable() {
    let imported = import("SELECT * FROM T WHERE T.Status IN (1, 2, NULL)");

    let status = imported.tables[0].column("Status").unwrap();
    assert_eq!(status.column_type, ColumnType::Int32);
    assert!(status.nullable);
}

#[test]
fn like_forces_text() {
    let imported = import("SELECT * FROM T WHERE T.Code LIKE 'AB%'");
    let code = imported.tables[0].column("Code").unwrap();
    assert!(matches!(code.column_type, ColumnType::String { .. }));
}

#[test]
fn cast_propagates_the_target_kind() {
    let imported = import("SELECT CAST(T.Ref AS UNIQUEIDENTIFIER) FROM T");
    let reference = imported.tables[0].column("Ref").unwrap();
    assert_eq!(reference.column_type, ColumnType::Guid);
}

#[test]
fn between_bounds_supply_evidence() {
    let imported = import("SELECT * FROM T WHERE T.Qty BETWEEN 1.5 AND 9.5");
    let qty = imported.tables[0].column("Qty").unwrap();
    assert_eq!(qty.column_type, ColumnType::Decimal);
}

#[test]
fn unqualified_column_with_two_sources_is_ambiguous() {
    let errors = import_err("SELECT Id FROM A JOIN B ON A.x = B.x");
    assert!(matches!(errors[0], ImportError::Resolution(_)));
    assert!(errors[0]
        .to_string()
        .contains("cannot resolve source for column Id"));
}

#[test]
fn insert_values_hint_target_columns() {
    let imported = import(
        "INSERT INTO dbo.Products (Title, Qty, Remark) VALUES ('Widget', 3, NULL)",
    );

    let Statement::Insert(insert) = &imported.statement else {
        panic!("expected an insert");
    };
    assert_eq!(insert.target.table, TableIdent::with_schema("dbo", "Products"));
    assert_eq!(insert.columns.len(), 3);

    let table = &imported.tables[0];
    assert_eq!(
        table.column("Title").unwrap().column_type,
        ColumnType::String { length: Some(255) }
    );
    assert_eq!(table.column("Qty").unwrap().column_type, ColumnType::Int32);
    assert!(table.column("Remark").unwrap().nullable);

    // Columns come back in first-seen order.
    let order: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(order, vec!["Title", "Qty", "Remark"]);
}

#[test]
fn insert_row_arity_mismatch_fails() {
    let errors = import_err("INSERT INTO T (a, b) VALUES (1)");
    assert!(matches!(errors[0], ImportError::Resolution(_)));
}

#[test]
fn update_through_from_alias_resolves_target() {
    let imported = import(
        "UPDATE u SET u.Total = 99.5 FROM Users u \
         JOIN Orders o ON o.UserId = u.Id \
         WHERE o.IsPaid = 1",
    );

    let Statement::Update(update) = &imported.statement else {
        panic!("expected an update");
    };
    assert_eq!(update.target.table, TableIdent::new("Users"));
    assert_eq!(update.target.alias, Some(NameKey::new("u")));
    assert!(update.from.is_some());

    let users = imported
        .tables
        .iter()
        .find(|t| t.table == TableIdent::new("Users"))
        .unwrap();
    assert_eq!(users.column("Total").unwrap().column_type, ColumnType::Decimal);

    let orders = imported
        .tables
        .iter()
        .find(|t| t.table == TableIdent::new("Orders"))
        .unwrap();
    assert_eq!(orders.column("IsPaid").unwrap().column_type, ColumnType::Bool);
}

#[test]
fn plain_update_registers_its_own_target() {
    let imported = import("UPDATE Users SET Title = 'Dr' WHERE Id = 7");

    let Statement::Update(update) = &imported.statement else {
        panic!("expected an update");
    };
    assert_eq!(update.target.table, TableIdent::new("Users"));
    assert!(update.from.is_none());

    let users = &imported.tables[0];
    assert_eq!(
        users.column("Title").unwrap().column_type,
        ColumnType::String { length: Some(255) }
    );
}

#[test]
fn delete_with_alias_token_resolves_through_from() {
    let imported = import(
        "DELETE u FROM Users u JOIN Orders o ON o.UserId = u.Id WHERE o.Total = 0",
    );

    let Statement::Delete(delete) = &imported.statement else {
        panic!("expected a delete");
    };
    assert_eq!(delete.target.table, TableIdent::new("Users"));
    assert_eq!(delete.target.alias, Some(NameKey::new("u")));
    assert!(delete.sources.is_some());
}

#[test]
fn plain_delete() {
    let imported = import("DELETE FROM Logs WHERE CreatedOn IS NULL");

    let Statement::Delete(delete) = &imported.statement else {
        panic!("expected a delete");
    };
    assert_eq!(delete.target.table, TableIdent::new("Logs"));
    assert!(delete.sources.is_none());

    let created = imported.tables[0].column("CreatedOn").unwrap();
    assert_eq!(created.column_type, ColumnType::DateTime);
    assert!(created.nullable);
}

#[test]
fn merge_imports_with_single_arms() {
    let imported = import(
        "MERGE dbo.Users AS t USING dbo.Staged AS s ON t.Id = s.Id \
         WHEN MATCHED THEN UPDATE SET t.Title = s.Title \
         WHEN NOT MATCHED THEN INSERT (Id, Title) VALUES (s.Id, s.Title)",
    );

    let Statement::Merge(merge) = &imported.statement else {
        panic!("expected a merge");
    };
    assert_eq!(merge.target.table, TableIdent::with_schema("dbo", "Users"));
    assert!(merge.when_matched.is_some());
    assert!(merge.when_not_matched.is_some());
    assert!(merge.when_not_matched_by_source.is_none());

    // Both tables synthesized, ordered by identity.
    let names: Vec<String> = imported
        .tables
        .iter()
        .map(|t| t.table.to_string())
        .collect();
    assert_eq!(names, vec!["dbo.Staged", "dbo.Users"]);
}

#[test]
fn merge_with_two_matched_arms_is_rejected() {
    let errors = import_err(
        "MERGE Users AS t USING Staged AS s ON t.Id = s.Id \
         WHEN MATCHED AND s.Qty = 0 THEN DELETE \
         WHEN MATCHED THEN UPDATE SET t.Qty = s.Qty",
    );
    assert!(matches!(errors[0], ImportError::Unsupported(_)));
    assert!(errors[0].to_string().contains("WHEN MATCHED"));
}

#[test]
fn derived_table_with_alias() {
    let imported = import(
        "SELECT d.Total FROM (SELECT o.Total FROM Orders o WHERE o.Total > 1.5) AS d",
    );

    let Statement::Select(query) = &imported.statement else {
        panic!("expected a select");
    };
    let select = query.as_select().unwrap();
    assert!(matches!(
        select.from,
        Some(TableSource::Derived { .. })
    ));

    // Inference reached through the derived body to the physical table.
    let orders = &imported.tables[0];
    assert_eq!(orders.table, TableIdent::new("Orders"));
    assert_eq!(orders.column("Total").unwrap().column_type, ColumnType::Decimal);
}

#[test]
fn correlated_exists_subquery_sees_outer_scope() {
    let imported = import(
        "SELECT u.Id FROM Users u \
         WHERE EXISTS (SELECT 1 FROM Orders o WHERE o.UserId = u.Id)",
    );

    let Statement::Select(query) = &imported.statement else {
        panic!("expected a select");
    };
    let select = query.as_select().unwrap();
    assert!(matches!(select.filter, Some(BoolExpr::Exists { .. })));

    let names: Vec<String> = imported
        .tables
        .iter()
        .map(|t| t.table.to_string())
        .collect();
    assert_eq!(names, vec!["Orders", "Users"]);
}

#[test]
fn duplicate_cte_names_fail() {
    let errors = import_err(
        "WITH a AS (SELECT 1 AS n), A AS (SELECT 2 AS n) SELECT n FROM a",
    );
    assert!(matches!(errors[0], ImportError::Resolution(_)));
    assert!(errors[0].to_string().contains("duplicate CTE name"));
}

#[test]
fn cte_column_list_is_rejected() {
    let errors = import_err("WITH a (n) AS (SELECT 1) SELECT n FROM a");
    assert!(matches!(errors[0], ImportError::Unsupported(_)));
}

#[test]
fn unsupported_statement_kind_is_rejected() {
    let errors = import_err("CREATE TABLE T (Id INT)");
    assert!(matches!(errors[0], ImportError::Unsupported(_)));
}

#[test]
fn comparison_shape_survives_into_the_tree() {
    let imported = import("SELECT T.a FROM T WHERE T.a = 1");

    let Statement::Select(query) = &imported.statement else {
        panic!("expected a select");
    };
    let select = query.as_select().unwrap();

    let Some(BoolExpr::Compare { op, left, right }) = &select.filter else {
        panic!("expected a comparison filter");
    };
    assert_eq!(*op, CompareOp::Eq);
    assert!(matches!(left, ValueExpr::Column(ColumnExpr { .. })));
    assert_eq!(right, &ValueExpr::Literal(Literal::Int(1)));
}

#[test]
fn tree_and_schema_export_as_json() {
    let imported = import("SELECT u.Id, u.Title FROM dbo.Users u WHERE u.Title = 'x'");

    let tree = serde_json::to_value(&imported.statement).unwrap();
    assert!(tree.is_object());

    let schema = serde_json::to_value(&imported.tables).unwrap();
    let rendered = schema.to_string();
    assert!(rendered.contains("Users"));
    assert!(rendered.contains("Title"));
}

#[test]
fn synthesized_descriptors_round_trip_through_json() {
    let imported = import("SELECT u.Id, u.Title FROM dbo.Users u WHERE u.Title = 'x'");

    let json = serde_json::to_string(&imported.tables).unwrap();
    let decoded: Vec<schemasketch_core::TableSketch> = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, imported.tables);
}

#[test]
fn set_operations_import() {
    let imported = import("SELECT a FROM T UNION SELECT b FROM U");

    let Statement::Select(query) = &imported.statement else {
        panic!("expected a select");
    };
    assert!(matches!(query.body, QueryBody::SetOp { .. }));
}

#[test]
fn order_by_resolves_against_the_select_sources() {
    let imported = import("SELECT u.Id FROM Users u ORDER BY u.Id DESC");

    let Statement::Select(query) = &imported.statement else {
        panic!("expected a select");
    };
    assert_eq!(query.order_by.len(), 1);
    assert!(query.order_by[0].descending);
}

#[test]
fn top_constant_is_kept() {
    let imported = import("SELECT TOP 10 u.Id FROM Users u");

    let Statement::Select(query) = &imported.statement else {
        panic!("expected a select");
    };
    assert_eq!(query.as_select().unwrap().top, Some(10));
}
