//! DML generator tests


use chrono::NaiveDate;
use rowport_core::config::DmlOptions;
use rowport_core::row::{OwnedRow, RowKind};
use rowport_core::schema::{ColumnMeta, ColumnType, MetaData};
use rowport_core::value::Value;
use rowport_io::DmlWriter;
use rust_decimal::Decimal;
use test_data_gen::person;

fn accounts() -> MetaData {
    MetaData::new(vec![
        ColumnMeta::new("region", ColumnType::Char),
        ColumnMeta::new("id", ColumnType::BigInt),
        ColumnMeta::new("owner", ColumnType::VarChar),
        ColumnMeta::new("active", ColumnType::Boolean),
        ColumnMeta::new("balance", ColumnType::Decimal),
        ColumnMeta::new("opened", ColumnType::Timestamp),
    ])
    .with_table("accounts")
    .with_keys(["region", "id"])
}

fn account(kind: RowKind, id: i64, owner: Option<&str>) -> OwnedRow {
    let opened = NaiveDate::from_ymd_opt(2024, 1, 31)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    OwnedRow::new(vec![
        Value::from("eu"),
        Value::Long(id),
        Value::from(owner),
        Value::Bool(id % 2 == 0),
        Value::Decimal(Decimal::new(12345, 2)),
        Value::from(opened),
    ])
    .with_kind(kind)
}

fn generate(metadata: MetaData, options: DmlOptions, rows: &[OwnedRow]) -> String {
    let mut w = DmlWriter::open(Vec::new(), metadata, options).unwrap();
    for r in rows {
        w.write_row(r).unwrap();
    }
    String::from_utf8(w.finish().unwrap()).unwrap()
}

fn lines(sql: &str) -> Vec<&str> {
    sql.lines().collect()
}

#[test]
fn test_insert_literals() {
    let sql = generate(
        accounts(),
        DmlOptions::default(),
        &[account(RowKind::Current, 2, Some("Zoë 'Z' O'Neil"))],
    );
    assert_eq!(
        lines(&sql),
        vec![
            "COMMIT;",
            "INSERT INTO accounts (region, id, owner, active, balance, opened) VALUES \
             ('eu', 2, 'Zoë ''Z'' O''Neil', true, 123.45, '2024-01-31 08:00:00');",
            "COMMIT;",
        ]
    );
}

#[test]
fn test_sync_statements_by_row_kind() {
    let rows = [
        account(RowKind::Insert, 1, Some("a")),
        account(RowKind::Update, 1, Some("b")),
        account(RowKind::Delete, 1, None),
    ];
    let sql = generate(accounts(), DmlOptions::default().with_sync(true), &rows);
    let l = lines(&sql);
    assert_eq!(l.len(), 5);
    assert!(l[1].starts_with("INSERT INTO accounts "));
    assert_eq!(
        l[2],
        "UPDATE accounts SET owner = 'b', active = false, balance = 123.45, \
         opened = '2024-01-31 08:00:00' WHERE region = 'eu' AND id = 1;"
    );
    assert_eq!(l[3], "DELETE FROM accounts WHERE region = 'eu' AND id = 1;");
}

#[test]
fn test_null_key_uses_is_null() {
    let row = OwnedRow::new(vec![
        Value::Null,
        Value::Long(5),
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
    ])
    .with_kind(RowKind::Update);
    let sql = generate(accounts(), DmlOptions::default().with_sync(true), &[row]);
    assert!(sql.contains(
        "UPDATE accounts SET owner = null, active = null, balance = null, opened = null \
         WHERE region IS NULL AND id = 5;"
    ));
}

#[test]
fn test_mode_flags_skip_rows_silently() {
    let rows = [
        account(RowKind::Current, 1, Some("snap")),
        account(RowKind::Insert, 2, Some("ins")),
        account(RowKind::Delete, 3, None),
    ];

    let import_only = generate(accounts(), DmlOptions::default(), &rows);
    assert_eq!(import_only.matches("INSERT").count(), 1);
    assert!(!import_only.contains("DELETE"));

    let sync_only = generate(
        accounts(),
        DmlOptions::default().with_import(false).with_sync(true),
        &rows,
    );
    assert!(!sync_only.contains("'snap'"));
    assert!(sync_only.contains("'ins'"));
    assert!(sync_only.contains("DELETE FROM accounts WHERE region = 'eu' AND id = 3;"));

    let mut w = DmlWriter::open(Vec::new(), accounts(), DmlOptions::default().with_import(false))
        .unwrap();
    for r in &rows {
        w.write_row(r).unwrap();
    }
    assert_eq!(w.statements_written(), 0);
    assert_eq!(w.rows_skipped(), 3);
    assert_eq!(String::from_utf8(w.finish().unwrap()).unwrap(), "COMMIT;\nCOMMIT;\n");
}

#[test]
fn test_unknown_row_kind_is_fatal() {
    let mut w = DmlWriter::open(Vec::new(), accounts(), DmlOptions::default()).unwrap();
    w.write_row(&account(RowKind::Current, 1, None)).unwrap();
    let err = w
        .write_row(&account(RowKind::Unknown, 2, None))
        .unwrap_err();
    assert!(err.to_string().contains("row 2"));
    assert!(err.is_format_error());
}

#[test]
fn test_commit_batching_counts() {
    for k in 1..=4usize {
        for n in 0..=9usize {
            let rows: Vec<OwnedRow> = (0..n)
                .map(|i| account(RowKind::Current, i as i64, Some("x")))
                .collect();
            let sql = generate(
                accounts(),
                DmlOptions::default().with_commit_batch_size(k),
                &rows,
            );
            let commits = sql.matches("COMMIT;").count();
            assert_eq!(commits, n.div_ceil(k) + 2, "n={} k={}", n, k);
            assert!(sql.starts_with("COMMIT;\n"));
            assert!(sql.ends_with("COMMIT;\n"));
        }
    }
}

#[test]
fn test_batching_disabled_has_only_open_and_close_commits() {
    let rows: Vec<OwnedRow> = (0..25)
        .map(|i| account(RowKind::Current, i, Some("x")))
        .collect();
    let sql = generate(accounts(), DmlOptions::default(), &rows);
    assert_eq!(sql.matches("COMMIT;").count(), 2);
}

#[test]
fn test_commit_after_each_full_batch() {
    let rows: Vec<OwnedRow> = (0..3)
        .map(|i| account(RowKind::Current, i, Some("x")))
        .collect();
    let sql = generate(accounts(), DmlOptions::default().with_commit_batch_size(2), &rows);
    let kinds: Vec<&str> = sql
        .lines()
        .map(|l| if l == "COMMIT;" { "C" } else { "I" })
        .collect();
    assert_eq!(kinds, vec!["C", "I", "I", "C", "I", "C", "C"]);
}

#[test]
fn test_full_replace_follows_opening_commit() {
    let sql = generate(
        accounts(),
        DmlOptions::default().with_full_replace(true),
        &[account(RowKind::Current, 1, Some("x"))],
    );
    let l = lines(&sql);
    assert_eq!(l[0], "COMMIT;");
    assert_eq!(l[1], "DELETE FROM accounts;");
    assert!(l[2].starts_with("INSERT"));
}

#[test]
fn test_quoted_identifiers() {
    let md = MetaData::new(vec![
        ColumnMeta::new("Order", ColumnType::Integer),
        ColumnMeta::new("say \"hi\"", ColumnType::VarChar),
    ])
    .with_table("My Table")
    .with_keys(["Order"]);
    let row = OwnedRow::new(vec![Value::Int(1), Value::from("x")]).with_kind(RowKind::Update);
    let sql = generate(
        md,
        DmlOptions::default().with_sync(true).with_quote_identifiers(true),
        &[row],
    );
    assert!(sql.contains("UPDATE \"My Table\" SET \"say \"\"hi\"\"\" = 'x' WHERE \"Order\" = 1;"));
}

#[test]
fn test_update_with_only_key_columns_emits_nothing() {
    let md = MetaData::new(vec![ColumnMeta::new("id", ColumnType::Integer)])
        .with_table("t")
        .with_keys(["id"]);
    let row = OwnedRow::new(vec![Value::Int(1)]).with_kind(RowKind::Update);
    let mut w = DmlWriter::open(Vec::new(), md, DmlOptions::default().with_sync(true)).unwrap();
    w.write_row(&row).unwrap();
    assert_eq!(w.statements_written(), 0);
    assert_eq!(String::from_utf8(w.finish().unwrap()).unwrap(), "COMMIT;\nCOMMIT;\n");
}

#[test]
fn test_open_requires_table_and_sync_keys() {
    let no_table = MetaData::new(vec![ColumnMeta::new("id", ColumnType::Integer)]);
    let err = DmlWriter::open(Vec::new(), no_table.clone(), DmlOptions::default())
        .err()
        .unwrap();
    assert!(err.to_string().contains("table name"));

    let no_keys = no_table.with_table("t");
    assert!(DmlWriter::open(Vec::new(), no_keys.clone(), DmlOptions::default()).is_ok());
    let err = DmlWriter::open(Vec::new(), no_keys, DmlOptions::default().with_sync(true))
        .err()
        .unwrap();
    assert!(err.to_string().contains("key columns"));
}

#[test]
fn test_binary_columns_are_unsupported() {
    let md = test_data_gen::people_metadata();
    let mut w = DmlWriter::open(Vec::new(), md, DmlOptions::default()).unwrap();
    let err = w.write_row(&person(1, "x", None)).unwrap_err();
    assert!(err.to_string().contains("BLOB"));
    assert!(err.to_string().contains("column 5"));
}

#[test]
fn test_large_text_and_special_doubles() {
    let md = MetaData::new(vec![
        ColumnMeta::new("id", ColumnType::Integer),
        ColumnMeta::new("body", ColumnType::Clob),
        ColumnMeta::new("ratio", ColumnType::Double),
    ])
    .with_table("docs");
    let body = "it's ".repeat(2000);
    let row = OwnedRow::new(vec![Value::Int(1), Value::from(body.as_str()), Value::Double(f64::NAN)]);
    let sql = generate(md, DmlOptions::default(), &[row]);
    let expected = format!(
        "INSERT INTO docs (id, body, ratio) VALUES (1, '{}', 'NaN');",
        "it''s ".repeat(2000)
    );
    assert_eq!(lines(&sql)[1], expected);
}
