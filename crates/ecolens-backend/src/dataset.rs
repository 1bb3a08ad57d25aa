//! Dataset files: loading, validation, the legacy adapter and conversion.
//!
//! Two on-disk schemas exist. The canonical one:
//!
//! ```json
//! [{"language": "java", "component": "Fields", "keywords": ["static"], "observation": "..."}]
//! ```
//!
//! and the legacy one, with a comma-separated keyword string:
//!
//! ```json
//! [{"lang": "java", "component": "Fields", "lang-keywords": "static, final", "observation": "..."}]
//! ```
//!
//! The schema is always given by the caller; field presence is never used to
//! guess it. Loading validates every record and fails on the first bad one,
//! so a knowledge base is never built from part of a file.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use ecolens_config::{DatasetSchema, EcolensConfig};
use ecolens_search::{normalize_language, ObservationEntry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::BackendError;
use crate::Result;

/// Fields every canonical record must carry.
pub const CANONICAL_FIELDS: [&str; 4] = ["language", "component", "keywords", "observation"];

/// Fields every legacy record must carry.
pub const LEGACY_FIELDS: [&str; 4] = ["lang", "component", "lang-keywords", "observation"];

/// A dataset file and the schema it is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSource {
    /// Path to the JSON file
    pub path: PathBuf,

    /// Schema of the records
    pub schema: DatasetSchema,
}

impl DatasetSource {
    /// Create a new dataset source.
    pub fn new(path: impl Into<PathBuf>, schema: DatasetSchema) -> Self {
        Self {
            path: path.into(),
            schema,
        }
    }

    /// Canonical-schema file.
    pub fn canonical(path: impl Into<PathBuf>) -> Self {
        Self::new(path, DatasetSchema::Canonical)
    }

    /// Legacy-schema file.
    pub fn legacy(path: impl Into<PathBuf>) -> Self {
        Self::new(path, DatasetSchema::Legacy)
    }

    /// Dataset configured in `config`, relative paths resolved against `base_dir`.
    pub fn from_config(config: &EcolensConfig, base_dir: &Path) -> Self {
        Self::new(config.dataset_path(base_dir), config.backend.dataset.schema)
    }
}

/// One canonical dataset record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Programming language
    pub language: String,

    /// Category label
    pub component: String,

    /// Construct tokens the advice applies to
    pub keywords: Vec<String>,

    /// Advice text
    pub observation: String,
}

impl DatasetRecord {
    /// Create a new record.
    pub fn new(
        language: impl Into<String>,
        component: impl Into<String>,
        keywords: impl IntoIterator<Item = impl Into<String>>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            component: component.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
            observation: observation.into(),
        }
    }

    /// Check that the text fields are populated.
    ///
    /// `index` is the record's position, reported in the error.
    pub fn validate(&self, index: usize) -> Result<()> {
        for (field, value) in [
            ("language", &self.language),
            ("component", &self.component),
            ("observation", &self.observation),
        ] {
            if value.trim().is_empty() {
                return Err(BackendError::invalid_record(
                    index,
                    format!("field '{}' is empty", field),
                ));
            }
        }
        Ok(())
    }

    /// Normalized knowledge base entry, without an embedding.
    pub fn into_entry(self) -> ObservationEntry {
        ObservationEntry::new(
            self.language,
            self.component,
            self.keywords,
            self.observation,
        )
    }
}

/// One legacy dataset record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRecord {
    /// Programming language
    pub lang: String,

    /// Category label
    pub component: String,

    /// Comma-separated keywords
    #[serde(rename = "lang-keywords")]
    pub lang_keywords: String,

    /// Advice text
    pub observation: String,
}

impl From<LegacyRecord> for DatasetRecord {
    fn from(legacy: LegacyRecord) -> Self {
        let keywords: Vec<String> = legacy
            .lang_keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            language: normalize_language(&legacy.lang),
            component: legacy.component,
            keywords,
            observation: legacy.observation,
        }
    }
}

/// Shape of a loaded dataset, for `ecolens dataset validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    /// Number of records
    pub records: usize,

    /// Records per normalized language
    pub languages: BTreeMap<String, usize>,

    /// Records repeating an observation already seen for the same language
    pub duplicate_observations: usize,
}

impl DatasetStats {
    /// Compute statistics over validated records.
    pub fn from_records(records: &[DatasetRecord]) -> Self {
        let mut languages: BTreeMap<String, usize> = BTreeMap::new();
        let mut seen: HashSet<(String, &str)> = HashSet::new();
        let mut duplicate_observations = 0;

        for record in records {
            let language = normalize_language(&record.language);
            if !seen.insert((language.clone(), record.observation.as_str())) {
                duplicate_observations += 1;
            }
            *languages.entry(language).or_default() += 1;
        }

        Self {
            records: records.len(),
            languages,
            duplicate_observations,
        }
    }
}

/// Load and validate every record of a dataset file.
///
/// # Errors
/// * `BackendError::Dataset` - file missing, unreadable, not JSON, or not an array
/// * `BackendError::InvalidRecord` - first record with a missing, mistyped or empty field
pub fn load_dataset(source: &DatasetSource) -> Result<Vec<DatasetRecord>> {
    debug!(
        "Loading {} dataset from {}",
        source.schema,
        source.path.display()
    );

    let content = std::fs::read_to_string(&source.path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BackendError::dataset(&source.path, "file not found"),
        _ => BackendError::dataset(&source.path, format!("failed to read: {}", e)),
    })?;

    let records = parse_dataset(&source.path, &content, source.schema)?;

    let stats = DatasetStats::from_records(&records);
    if records.is_empty() {
        warn!("Dataset {} contains no records", source.path.display());
    }
    if stats.duplicate_observations > 0 {
        warn!(
            "Dataset {} repeats {} observation(s); only the first occurrence is ever returned",
            source.path.display(),
            stats.duplicate_observations
        );
    }

    info!(
        "Loaded {} records ({} languages) from {}",
        stats.records,
        stats.languages.len(),
        source.path.display()
    );
    Ok(records)
}

/// Write records as a canonical dataset file.
pub fn write_dataset(path: &Path, records: &[DatasetRecord]) -> Result<()> {
    let mut content = serde_json::to_string_pretty(records)?;
    content.push('\n');
    std::fs::write(path, content)
        .map_err(|e| BackendError::dataset(path, format!("failed to write: {}", e)))?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Rewrite a legacy dataset file in canonical form.
///
/// Returns the number of records converted. Nothing is written unless the
/// whole input validates.
pub fn convert_legacy(input: &Path, output: &Path) -> Result<usize> {
    let records = load_dataset(&DatasetSource::legacy(input))?;
    write_dataset(output, &records)?;
    Ok(records.len())
}

fn parse_dataset(path: &Path, content: &str, schema: DatasetSchema) -> Result<Vec<DatasetRecord>> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| BackendError::dataset(path, format!("malformed JSON: {}", e)))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(BackendError::dataset(
                path,
                format!("expected a JSON array of records, found {}", json_type(&other)),
            ))
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_record(index, item, schema))
        .collect()
}

fn parse_record(index: usize, value: &Value, schema: DatasetSchema) -> Result<DatasetRecord> {
    let object = value.as_object().ok_or_else(|| {
        BackendError::invalid_record(
            index,
            format!("expected a JSON object, found {}", json_type(value)),
        )
    })?;

    let required: &[&str] = match schema {
        DatasetSchema::Canonical => &CANONICAL_FIELDS,
        DatasetSchema::Legacy => &LEGACY_FIELDS,
    };
    if let Some(missing) = required.iter().find(|field| !object.contains_key(**field)) {
        return Err(BackendError::invalid_record(
            index,
            format!("missing required field '{}'", missing),
        ));
    }

    match schema {
        DatasetSchema::Canonical => Ok(DatasetRecord {
            language: text_field(object, index, "language")?,
            component: text_field(object, index, "component")?,
            keywords: keyword_list(object, index, "keywords")?,
            observation: text_field(object, index, "observation")?,
        }),
        DatasetSchema::Legacy => {
            let legacy = LegacyRecord {
                lang: text_field(object, index, "lang")?,
                component: text_field(object, index, "component")?,
                lang_keywords: string_field(object, index, "lang-keywords")?,
                observation: text_field(object, index, "observation")?,
            };
            Ok(legacy.into())
        }
    }
}

fn string_field(object: &Map<String, Value>, index: usize, field: &str) -> Result<String> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(BackendError::invalid_record(
            index,
            format!("field '{}' must be a string, found {}", field, json_type(other)),
        )),
        None => Err(BackendError::invalid_record(
            index,
            format!("missing required field '{}'", field),
        )),
    }
}

/// A string field that must not be blank.
fn text_field(object: &Map<String, Value>, index: usize, field: &str) -> Result<String> {
    let value = string_field(object, index, field)?;
    if value.trim().is_empty() {
        return Err(BackendError::invalid_record(
            index,
            format!("field '{}' is empty", field),
        ));
    }
    Ok(value)
}

fn keyword_list(object: &Map<String, Value>, index: usize, field: &str) -> Result<Vec<String>> {
    let Some(Value::Array(items)) = object.get(field) else {
        let found = object.get(field).map(json_type).unwrap_or("nothing");
        return Err(BackendError::invalid_record(
            index,
            format!("field '{}' must be an array of strings, found {}", field, found),
        ));
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(BackendError::invalid_record(
                index,
                format!(
                    "field '{}' must contain only strings, found {}",
                    field,
                    json_type(other)
                ),
            )),
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
