//! rowport CLI: convert CSV files to CSV or SQL DML, or validate them.

mod job;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rowport_core::config::{CsvFormatOptions, DmlOptions};
use rowport_core::row::Row;
use rowport_io::digest::{Digest, DigestWriter};
use rowport_io::{transfer, CsvReader, CsvWriter, DmlWriter};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::job::{load_schema, CliError, JobFile, Result};

#[derive(Parser)]
#[command(name = "rowport")]
#[command(about = "Move tabular rows between CSV and SQL DML text", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Input CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Schema file (YAML, or JSON by extension); column names are taken
    /// from the input when omitted
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Job file with format and DML options
    #[arg(long)]
    job: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-serialise a CSV file under the output format options
    Csv {
        #[command(flatten)]
        source: Source,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate INSERT/UPDATE/DELETE statements from a CSV file
    Sql {
        #[command(flatten)]
        source: Source,

        /// Output SQL file
        #[arg(short, long)]
        output: PathBuf,

        /// Target table (overrides schema and job)
        #[arg(long)]
        table: Option<String>,

        /// Comma-separated key columns (overrides schema and job)
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,

        /// Emit INSERT for snapshot rows
        #[arg(long, overrides_with = "no_import")]
        import: bool,

        /// Do not emit INSERT for snapshot rows
        #[arg(long)]
        no_import: bool,

        /// Emit statements for change-kind rows
        #[arg(long)]
        sync: bool,

        /// Start with a blanket DELETE FROM the table
        #[arg(long)]
        full_replace: bool,

        /// Data statements per COMMIT (0 disables periodic commits)
        #[arg(long)]
        commit_batch: Option<usize>,

        /// Quote table and column names
        #[arg(long)]
        quote_identifiers: bool,
    },

    /// Read every row and every column, reporting the first format error
    Validate {
        #[command(flatten)]
        source: Source,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        for hint in e.suggestions() {
            eprintln!("  hint: {}", hint);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Csv { source, output } => {
            let job = load_job(&source)?;
            let mut reader = open_reader(&source, &job)?;
            let metadata = reader.metadata().clone();
            let sink = DigestWriter::new(File::create(&output)?);
            let mut writer = CsvWriter::open(sink, metadata, job.output.clone())?;
            let stats = transfer(&mut reader, &mut writer, None)?;
            let (_, digest) = writer.finish()?.finish();
            report("CSV", stats.rows, &output, &digest);
        }
        Commands::Sql {
            source,
            output,
            table,
            keys,
            import,
            no_import,
            sync,
            full_replace,
            commit_batch,
            quote_identifiers,
        } => {
            let job = load_job(&source)?;
            let mut reader = open_reader(&source, &job)?;

            let mut metadata = reader.metadata().clone();
            if let Some(t) = table.or_else(|| job.dml.table.clone()) {
                metadata = metadata.with_table(t);
            }
            if !keys.is_empty() {
                metadata = metadata.with_keys(keys);
            } else if !job.dml.keys.is_empty() {
                metadata = metadata.with_keys(job.dml.keys.clone());
            }

            let mut options: DmlOptions = job.dml.options.clone();
            if no_import {
                options.import = false;
            } else if import {
                options.import = true;
            }
            options.sync |= sync;
            options.full_replace |= full_replace;
            options.quote_identifiers |= quote_identifiers;
            if let Some(n) = commit_batch {
                options.commit_batch_size = n;
            }

            let sink = DigestWriter::new(File::create(&output)?);
            let mut writer = DmlWriter::open(sink, metadata, options)?;
            let stats = transfer(&mut reader, &mut writer, None)?;
            let statements = writer.statements_written();
            let (_, digest) = writer.finish()?.finish();
            report("SQL", stats.rows, &output, &digest);
            println!("  Statements: {}", statements);
        }
        Commands::Validate { source } => {
            let job = load_job(&source)?;
            let mut reader = open_reader(&source, &job)?;
            let rows = validate_rows(&mut reader)?;
            println!("✓ {} rows valid ({})", rows, source.input.display());
        }
    }
    Ok(())
}

fn load_job(source: &Source) -> Result<JobFile> {
    match &source.job {
        Some(path) => JobFile::load(path),
        None => Ok(JobFile::default()),
    }
}

fn open_reader(source: &Source, job: &JobFile) -> Result<CsvReader<File>> {
    let input: CsvFormatOptions = job.input.clone();
    let file = File::open(&source.input).map_err(|e| CliError::Read {
        path: source.input.clone(),
        source: e,
    })?;
    let schema = source.schema.as_ref().or(job.schema.as_ref());
    let reader = match schema {
        Some(path) => {
            let metadata = load_schema(path)?;
            debug!(schema = %path.display(), columns = metadata.column_count(), "loaded schema");
            CsvReader::open_with_metadata(file, input, metadata)?
        }
        None => CsvReader::open(file, input)?,
    };
    Ok(reader)
}

/// Touch every column of every row through the accessor for its type.
fn validate_rows<R: Read>(reader: &mut CsvReader<R>) -> Result<u64> {
    let types: Vec<_> = reader
        .metadata()
        .columns()
        .iter()
        .map(|c| c.column_type)
        .collect();
    let mut rows = 0u64;
    while let Some(row) = reader.next_row()? {
        for (i, ty) in types.iter().enumerate() {
            row.get_value(i + 1, *ty)?;
        }
        rows += 1;
    }
    Ok(rows)
}

fn report(kind: &str, rows: u64, output: &Path, digest: &Digest) {
    println!("✓ Wrote {} rows as {} to {}", rows, kind, output.display());
    println!("  Bytes: {}", digest.bytes);
    println!("  blake3: {}", digest.hex);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn csv_command_rewrites_dialect() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        let job = dir.path().join("job.yaml");
        fs::write(&input, "id,name\n1,ann\n2,\"b;c\"\n").unwrap();
        fs::write(&job, "output:\n  column_delimiter: \";\"\n").unwrap();

        run(Commands::Csv {
            source: Source {
                input,
                schema: None,
                job: Some(job),
            },
            output: output.clone(),
        })
        .unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "id;name\n\"1\";\"ann\"\n\"2\";\"b;c\"\n"
        );
    }

    #[test]
    fn sql_command_applies_flag_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let schema = dir.path().join("s.yaml");
        let output = dir.path().join("out.sql");
        fs::write(&input, "id,name\n1,ann\n").unwrap();
        fs::write(
            &schema,
            "columns:\n  - {name: id, type: integer}\n  - {name: name, type: varchar}\n",
        )
        .unwrap();

        run(Commands::Sql {
            source: Source {
                input,
                schema: Some(schema),
                job: None,
            },
            output: output.clone(),
            table: Some("people".into()),
            keys: vec!["id".into()],
            import: false,
            no_import: false,
            sync: false,
            full_replace: true,
            commit_batch: None,
            quote_identifiers: false,
        })
        .unwrap();
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "COMMIT;\nDELETE FROM people;\nINSERT INTO people (id, name) VALUES (1, 'ann');\nCOMMIT;\n"
        );
    }

    #[test]
    fn validate_reports_the_bad_row() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let schema = dir.path().join("s.json");
        fs::write(&input, "n\n1\nx\n").unwrap();
        fs::write(&schema, r#"{"columns":[{"name":"n","type":"bigint"}]}"#).unwrap();

        let err = run(Commands::Validate {
            source: Source {
                input,
                schema: Some(schema),
                job: None,
            },
        })
        .unwrap_err();
        assert!(err.to_string().contains("row 3, column 1"), "{}", err);
    }

    #[test]
    fn sql_without_table_fails_with_hint() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        fs::write(&input, "id\n1\n").unwrap();
        let err = run(Commands::Sql {
            source: Source {
                input,
                schema: None,
                job: None,
            },
            output: dir.path().join("out.sql"),
            table: None,
            keys: vec![],
            import: false,
            no_import: false,
            sync: false,
            full_replace: false,
            commit_batch: None,
            quote_identifiers: false,
        })
        .unwrap_err();
        assert!(err.to_string().contains("table name"));
    }
}
