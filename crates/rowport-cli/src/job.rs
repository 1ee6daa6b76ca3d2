//! Job and schema files.
//!
//! A job file is YAML:
//!
//! ```yaml
//! schema: people.schema.yaml
//! input:
//!   column_delimiter: ";"
//!   header: true
//! output:
//!   quoting: false
//! dml:
//!   table: people
//!   keys: [id]
//!   sync: true
//!   commit_batch_size: 500
//! ```
//!
//! Every section is optional and falls back to the library defaults.
//! Command-line flags override what the file says.

use std::fs;
use std::path::{Path, PathBuf};

use rowport_core::config::{CsvFormatOptions, DmlOptions};
use rowport_core::schema::MetaData;
use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Rowport(#[from] rowport_io::error::Error),
}

impl From<rowport_core::Error> for CliError {
    fn from(e: rowport_core::Error) -> Self {
        CliError::Rowport(e.into())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Rowport(e.into())
    }
}

impl CliError {
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            CliError::Read { .. } => vec!["Check the path and file permissions".into()],
            CliError::Yaml { .. } | CliError::Json { .. } => vec![
                "Schema files list `columns` as [{name, type}] with optional `table` and `keys`"
                    .into(),
            ],
            CliError::Rowport(e) => e.suggestions(),
        }
    }
}

/// DML section of a job file: generator options plus table identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DmlSection {
    pub table: Option<String>,
    pub keys: Vec<String>,
    #[serde(flatten)]
    pub options: DmlOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobFile {
    /// Schema path, resolved against the job file's directory.
    pub schema: Option<PathBuf>,
    pub input: CsvFormatOptions,
    pub output: CsvFormatOptions,
    pub dml: DmlSection,
}

impl JobFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = read(path)?;
        let mut job: JobFile = serde_yaml::from_str(&text).map_err(|source| CliError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        if let (Some(schema), Some(dir)) = (job.schema.as_mut(), path.parent()) {
            if schema.is_relative() {
                *schema = dir.join(&*schema);
            }
        }
        job.input.validate()?;
        job.output.validate()?;
        Ok(job)
    }
}

/// Load a schema file; `.json` is parsed as JSON, anything else as YAML.
pub fn load_schema(path: &Path) -> Result<MetaData> {
    let text = read(path)?;
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let metadata: MetaData = if is_json {
        serde_json::from_str(&text).map_err(|source| CliError::Json {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_yaml::from_str(&text).map_err(|source| CliError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };
    Ok(metadata)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowport_core::schema::ColumnType;

    #[test]
    fn job_file_sections_default_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        fs::write(
            &path,
            "schema: people.yaml\ninput:\n  column_delimiter: \";\"\ndml:\n  table: people\n  keys: [id]\n  sync: true\n",
        )
        .unwrap();

        let job = JobFile::load(&path).unwrap();
        assert_eq!(job.schema, Some(dir.path().join("people.yaml")));
        assert_eq!(job.input.column_delimiter, ';');
        assert_eq!(job.output, CsvFormatOptions::default());
        assert_eq!(job.dml.table.as_deref(), Some("people"));
        assert_eq!(job.dml.keys, vec!["id"]);
        assert!(job.dml.options.sync && job.dml.options.import);
    }

    #[test]
    fn unknown_job_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        fs::write(&path, "inptu: {}\n").unwrap();
        assert!(matches!(JobFile::load(&path), Err(CliError::Yaml { .. })));
    }

    #[test]
    fn clashing_job_options_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        fs::write(&path, "output:\n  quote_char: \",\"\n").unwrap();
        assert!(matches!(JobFile::load(&path), Err(CliError::Rowport(_))));
    }

    #[test]
    fn schema_in_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("s.yaml");
        fs::write(
            &yaml,
            "table: people\nkeys: [id]\ncolumns:\n  - {name: id, type: integer}\n  - {name: photo, type: blob, type_name: BYTEA}\n",
        )
        .unwrap();
        let md = load_schema(&yaml).unwrap();
        assert_eq!(md.table_name(), Some("people"));
        assert_eq!(md.column(2).unwrap().column_type, ColumnType::Blob);
        assert_eq!(md.column(2).unwrap().type_name, "BYTEA");

        let json = dir.path().join("s.json");
        fs::write(
            &json,
            r#"{"columns":[{"name":"id","type":4},{"name":"at","type":"timestamp"}]}"#,
        )
        .unwrap();
        let md = load_schema(&json).unwrap();
        assert_eq!(md.column(1).unwrap().column_type, ColumnType::Integer);
        assert_eq!(md.column(2).unwrap().column_type, ColumnType::Timestamp);
    }

    #[test]
    fn schema_with_unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.yaml");
        fs::write(&path, "keys: [nope]\ncolumns:\n  - {name: id, type: int}\n").unwrap();
        assert!(load_schema(&path).is_err());
    }
}
