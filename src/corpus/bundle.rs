//! Compiled project bundle: template, bibliography and records in one file

use super::record::{normalize_source_ref, Record, RecordScope};
use super::CorpusError;
use crate::graph::Properties;
use crate::schema::Template;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RawBundle {
    #[serde(default)]
    project: ProjectInfo,
    template: serde_json::Value,
    #[serde(default)]
    bibliography: BTreeMap<String, Properties>,
    #[serde(default)]
    records: Vec<Record>,
}

/// Everything one run consumes
#[derive(Debug, Clone)]
pub struct ProjectBundle {
    pub project: ProjectInfo,
    pub template: Template,
    /// Keyed by normalized source reference
    pub bibliography: BTreeMap<String, Properties>,
    pub records: Vec<Record>,
}

impl ProjectBundle {
    /// Load a bundle, choosing the format by extension (`.yaml`/`.yml`
    /// for YAML, anything else JSON).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let bundle = if is_yaml {
            Self::from_yaml_str(&text)?
        } else {
            Self::from_json_str(&text)?
        };

        debug!(
            path = %path.display(),
            records = bundle.records.len(),
            fields = bundle.template.fields.len(),
            "loaded project bundle"
        );
        Ok(bundle)
    }

    pub fn from_json_str(s: &str) -> Result<Self, CorpusError> {
        let raw: RawBundle = serde_json::from_str(s)?;
        Self::from_raw(raw)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, CorpusError> {
        let raw: RawBundle = serde_yaml::from_str(s)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawBundle) -> Result<Self, CorpusError> {
        let template = Template::from_json_value(raw.template)?;

        let bibliography: BTreeMap<String, Properties> = raw
            .bibliography
            .into_iter()
            .map(|(k, v)| (normalize_source_ref(&k).to_string(), v))
            .collect();

        validate_records(&raw.records)?;

        let records = raw
            .records
            .into_iter()
            .map(|record| with_bibliography(record, &bibliography))
            .collect();

        Ok(Self {
            project: raw.project,
            template,
            bibliography,
            records,
        })
    }

    pub fn items(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| r.scope == RecordScope::Item)
    }

    pub fn ontology(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| r.scope == RecordScope::Ontology)
    }
}

/// Every record needs an id unique within its scope and a traceable origin.
fn validate_records(records: &[Record]) -> Result<(), CorpusError> {
    let mut seen: HashSet<(RecordScope, &str)> = HashSet::new();
    for (index, record) in records.iter().enumerate() {
        if record.id.trim().is_empty() {
            return Err(CorpusError::MissingId { index });
        }
        if record.origin.source_file.trim().is_empty() || record.origin.line == 0 {
            return Err(CorpusError::MissingOrigin(record.id.clone()));
        }
        if !seen.insert((record.scope, record.id.trim())) {
            return Err(CorpusError::DuplicateRecord(record.id.clone()));
        }
    }
    Ok(())
}

/// Fill a record's source metadata from the bibliography. Values already on
/// the record win.
fn with_bibliography(mut record: Record, bibliography: &BTreeMap<String, Properties>) -> Record {
    if record.scope != RecordScope::Item {
        return record;
    }
    if let Some(entry) = bibliography.get(record.source_key()) {
        for (key, value) in entry {
            record
                .source_metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
    record
}
