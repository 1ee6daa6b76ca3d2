//! SQL DML generator.
//!
//! Statement skeletons are built once from the metadata at open time; each
//! row only renders its literals into a reusable per-column buffer and
//! splices them into the skeleton chosen by the row kind:
//!
//! | row kind | emitted when | statement |
//! |---|---|---|
//! | `Current` | import mode | `INSERT` |
//! | `Insert` / `Update` / `Delete` | sync mode | `INSERT` / `UPDATE` / `DELETE` |
//! | `Unknown` | never | error |
//!
//! Rows whose kind is disabled by the mode flags are skipped silently.
//! `COMMIT;` is written at open, after every `commit_batch_size` data
//! statements, and at close.

use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rowport_core::config::DmlOptions;
use rowport_core::row::{Row, RowKind};
use rowport_core::schema::{ColumnType, MetaData};
use rowport_core::value::{DATE_FORMAT, TIMESTAMP_FORMAT, TIME_FORMAT};
use tracing::{debug, info, trace, warn};

use crate::error::Result;

const COMMIT: &str = "COMMIT;\n";
const NULL: &str = "null";

struct Templates {
    table: String,
    /// `INSERT INTO t (a, b) VALUES (`
    insert_prefix: String,
    /// (column index, `name = `) for every non-key column.
    set_columns: Vec<(usize, String)>,
    /// (column index, quoted name) for every key column.
    key_columns: Vec<(usize, String)>,
}

impl Templates {
    fn build(metadata: &MetaData, table: &str, quote_identifiers: bool) -> Self {
        let ident = |name: &str| quote_ident(name, quote_identifiers);
        let names: Vec<String> = metadata.columns().iter().map(|c| ident(&c.name)).collect();
        let table = ident(table);
        let insert_prefix = format!("INSERT INTO {} ({}) VALUES (", table, names.join(", "));

        let flags = metadata.key_flags();
        let mut set_columns = Vec::new();
        let mut key_columns = Vec::new();
        for (i, name) in names.into_iter().enumerate() {
            if flags[i] {
                key_columns.push((i, name));
            } else {
                set_columns.push((i, format!("{} = ", name)));
            }
        }
        Self {
            table,
            insert_prefix,
            set_columns,
            key_columns,
        }
    }
}

fn quote_ident(name: &str, quote: bool) -> String {
    if quote {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else {
        name.to_string()
    }
}

pub struct DmlWriter<W: Write> {
    out: BufWriter<W>,
    metadata: MetaData,
    options: DmlOptions,
    templates: Templates,
    literals: Vec<String>,
    statement: String,
    rows_seen: u64,
    statements: u64,
    skipped: u64,
    in_batch: usize,
}

impl DmlWriter<File> {
    pub fn to_path(path: impl AsRef<Path>, metadata: MetaData, options: DmlOptions) -> Result<Self> {
        let file = File::create(path)?;
        Self::open(file, metadata, options)
    }
}

impl<W: Write> DmlWriter<W> {
    /// Precompute the statement skeletons and write the opening commit (and
    /// the blanket delete in full-replace mode).
    pub fn open(writer: W, metadata: MetaData, options: DmlOptions) -> Result<Self> {
        metadata.validate()?;
        let table = match metadata.table_name() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => {
                return Err(rowport_core::Error::Config(
                    "DML output needs a table name".into(),
                )
                .into())
            }
        };
        if options.sync && metadata.key_columns().is_empty() {
            return Err(rowport_core::Error::Config(format!(
                "sync mode needs key columns for table '{}'",
                table
            ))
            .into());
        }

        let templates = Templates::build(&metadata, &table, options.quote_identifiers);
        let mut w = Self {
            out: BufWriter::new(writer),
            literals: vec![String::new(); metadata.column_count()],
            metadata,
            options,
            templates,
            statement: String::new(),
            rows_seen: 0,
            statements: 0,
            skipped: 0,
            in_batch: 0,
        };

        w.out.write_all(COMMIT.as_bytes())?;
        if w.options.full_replace {
            writeln!(w.out, "DELETE FROM {};", w.templates.table)?;
        }
        debug!(
            table = %table,
            import = w.options.import,
            sync = w.options.sync,
            full_replace = w.options.full_replace,
            commit_batch_size = w.options.commit_batch_size,
            "opened DML writer"
        );
        Ok(w)
    }

    /// Data statements emitted so far (commits and the blanket delete are
    /// not counted).
    pub fn statements_written(&self) -> u64 {
        self.statements
    }

    /// Rows skipped because their kind is disabled by the mode flags.
    pub fn rows_skipped(&self) -> u64 {
        self.skipped
    }

    pub fn write_row(&mut self, row: &dyn Row) -> Result<()> {
        self.rows_seen += 1;
        let kind = row.kind();
        let enabled = match kind {
            RowKind::Current => self.options.import,
            RowKind::Insert | RowKind::Update | RowKind::Delete => self.options.sync,
            RowKind::Unknown => {
                return Err(rowport_core::Error::UnknownRowKind {
                    row: self.rows_seen,
                }
                .into())
            }
        };
        if !enabled {
            trace!(row = self.rows_seen, ?kind, "row kind disabled by mode flags");
            self.skipped += 1;
            return Ok(());
        }

        self.render_literals(row)?;
        self.statement.clear();
        let emitted = match kind {
            RowKind::Current | RowKind::Insert => {
                self.build_insert();
                true
            }
            RowKind::Update => self.build_update(),
            RowKind::Delete => {
                self.build_delete();
                true
            }
            RowKind::Unknown => false,
        };
        if !emitted {
            trace!(row = self.rows_seen, "update has no non-key columns");
            return Ok(());
        }

        self.out.write_all(self.statement.as_bytes())?;
        self.statements += 1;
        self.in_batch += 1;
        if self.options.commit_batch_size > 0 && self.in_batch >= self.options.commit_batch_size {
            self.out.write_all(COMMIT.as_bytes())?;
            self.in_batch = 0;
        }
        Ok(())
    }

    fn render_literals(&mut self, row: &dyn Row) -> Result<()> {
        let Self {
            metadata, literals, ..
        } = self;
        for (i, col) in metadata.columns().iter().enumerate() {
            let buf = &mut literals[i];
            buf.clear();
            render_literal(row, i + 1, col.column_type, &col.type_name, buf)?;
        }
        Ok(())
    }

    fn build_insert(&mut self) {
        let s = &mut self.statement;
        s.push_str(&self.templates.insert_prefix);
        for (i, lit) in self.literals.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            s.push_str(lit);
        }
        s.push_str(");\n");
    }

    fn build_update(&mut self) -> bool {
        if self.templates.set_columns.is_empty() {
            return false;
        }
        let s = &mut self.statement;
        let _ = write!(s, "UPDATE {} SET ", self.templates.table);
        for (n, (i, prefix)) in self.templates.set_columns.iter().enumerate() {
            if n > 0 {
                s.push_str(", ");
            }
            s.push_str(prefix);
            s.push_str(&self.literals[*i]);
        }
        push_key_predicate(s, &self.templates.key_columns, &self.literals);
        true
    }

    fn build_delete(&mut self) {
        let s = &mut self.statement;
        let _ = write!(s, "DELETE FROM {}", self.templates.table);
        push_key_predicate(s, &self.templates.key_columns, &self.literals);
    }

    /// Close a pending partial batch, write the closing commit, flush and
    /// hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        if self.options.commit_batch_size > 0 && self.in_batch > 0 {
            self.out.write_all(COMMIT.as_bytes())?;
        }
        self.out.write_all(COMMIT.as_bytes())?;
        if self.skipped > 0 {
            warn!(
                skipped = self.skipped,
                import = self.options.import,
                sync = self.options.sync,
                "rows skipped because their kind is disabled"
            );
        }
        info!(
            table = %self.templates.table,
            rows = self.rows_seen,
            statements = self.statements,
            "DML generation complete"
        );
        let inner = self.out.into_inner().map_err(|e| e.into_error())?;
        Ok(inner)
    }
}

// ` WHERE k1 = v1 AND k2 IS NULL;\n`
fn push_key_predicate(s: &mut String, keys: &[(usize, String)], literals: &[String]) {
    s.push_str(" WHERE ");
    for (n, (i, name)) in keys.iter().enumerate() {
        if n > 0 {
            s.push_str(" AND ");
        }
        s.push_str(name);
        let lit = &literals[*i];
        if lit == NULL {
            s.push_str(" IS NULL");
        } else {
            s.push_str(" = ");
            s.push_str(lit);
        }
    }
    s.push_str(";\n");
}

fn push_sql_string(buf: &mut String, text: &str) {
    buf.push('\'');
    for c in text.chars() {
        if c == '\'' {
            buf.push('\'');
        }
        buf.push(c);
    }
    buf.push('\'');
}

fn render_literal(
    row: &dyn Row,
    col: usize,
    ty: ColumnType,
    type_name: &str,
    buf: &mut String,
) -> rowport_core::Result<()> {
    match ty {
        ColumnType::Boolean => put(buf, row.get_bool(col)?),
        ColumnType::TinyInt | ColumnType::SmallInt => put(buf, row.get_short(col)?),
        ColumnType::Integer => put(buf, row.get_int(col)?),
        ColumnType::BigInt => put(buf, row.get_long(col)?),
        ColumnType::Real | ColumnType::Float | ColumnType::Double => match row.get_double(col)? {
            Some(v) => push_double(buf, v),
            None => buf.push_str(NULL),
        },
        ColumnType::Decimal | ColumnType::Numeric => put(buf, row.get_decimal(col)?),
        ColumnType::Char | ColumnType::VarChar => match row.get_string(col)? {
            Some(v) => push_sql_string(buf, &v),
            None => buf.push_str(NULL),
        },
        ColumnType::LongVarChar | ColumnType::Clob => match row.character_stream(col)? {
            Some(chunks) => {
                buf.push('\'');
                for chunk in chunks {
                    buf.push_str(&chunk?.replace('\'', "''"));
                }
                buf.push('\'');
            }
            None => buf.push_str(NULL),
        },
        ColumnType::Date => put_quoted(buf, row.get_date(col)?.map(|v| v.format(DATE_FORMAT))),
        ColumnType::Time => put_quoted(buf, row.get_time(col)?.map(|v| v.format(TIME_FORMAT))),
        ColumnType::Timestamp => put_quoted(
            buf,
            row.get_timestamp(col)?.map(|v| v.format(TIMESTAMP_FORMAT)),
        ),
        ColumnType::Binary
        | ColumnType::VarBinary
        | ColumnType::LongVarBinary
        | ColumnType::Blob
        | ColumnType::Array
        | ColumnType::Struct
        | ColumnType::Other => {
            return Err(rowport_core::Error::UnsupportedType {
                column: col,
                type_name: type_name.to_string(),
            })
        }
    }
    Ok(())
}

// Writing into a String cannot fail.
fn put<T: fmt::Display>(buf: &mut String, v: Option<T>) {
    match v {
        Some(v) => {
            let _ = write!(buf, "{}", v);
        }
        None => buf.push_str(NULL),
    }
}

fn put_quoted<T: fmt::Display>(buf: &mut String, v: Option<T>) {
    match v {
        Some(v) => {
            let _ = write!(buf, "'{}'", v);
        }
        None => buf.push_str(NULL),
    }
}

// Non-finite doubles have no bare literal; emit the quoted spelling most
// engines cast from text.
fn push_double(buf: &mut String, v: f64) {
    if v.is_nan() {
        buf.push_str("'NaN'");
    } else if v.is_infinite() {
        buf.push_str(if v > 0.0 { "'Infinity'" } else { "'-Infinity'" });
    } else {
        let _ = write!(buf, "{}", v);
    }
}
