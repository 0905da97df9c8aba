//! JSONL datasets
//!
//! Labeled examples and ranking candidates are stored one JSON object per line.
//! The signals of each line are turned into a feature vector by the configured
//! [`FeatureBuilder`] at load time, so a dataset always matches the current
//! feature catalogue.
//!
//! ```text
//! {"query_id":"r1","item_id":"j4","label":5,"similarity":0.81,"query_skills":["rust"],"item_skills":["rust","sql"]}
//! ```

use jobrank_core::{
    Candidate, Error, FeatureBuilder, FeatureSignals, LabelSet, LabeledExample, Result,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

/// One weakly labeled (query, item) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelRecord {
    pub query_id: String,
    pub item_id: String,
    pub label: i64,
    #[serde(flatten)]
    pub signals: FeatureSignals,
}

/// One item to rank for a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRecord {
    pub item_id: String,
    #[serde(flatten)]
    pub signals: FeatureSignals,
}

/// Parse JSON lines, skipping blank lines. Errors carry the 1-based line number.
pub fn read_jsonl<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|e| Error::Serialization(format!("line {}: {}", index + 1, e)))?;
        records.push(record);
    }
    Ok(records)
}

fn read_jsonl_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path)?;
    read_jsonl(file)
}

/// Build a label set from records.
pub fn build_label_set(records: Vec<LabelRecord>, builder: &FeatureBuilder) -> Result<LabelSet> {
    let examples = records
        .into_iter()
        .map(|record| {
            let features = builder.build(&record.signals)?;
            LabeledExample::new(record.query_id, record.item_id, features, record.label)
        })
        .collect::<Result<Vec<_>>>()?;
    LabelSet::new(examples)
}

pub fn load_label_set<P: AsRef<Path>>(path: P, builder: &FeatureBuilder) -> Result<LabelSet> {
    let records: Vec<LabelRecord> = read_jsonl_file(path.as_ref())?;
    let set = build_label_set(records, builder)?;
    debug!(
        "Loaded {} labeled examples ({} queries, {} items) from {:?}",
        set.len(),
        set.queries().len(),
        set.items().len(),
        path.as_ref()
    );
    Ok(set)
}

pub fn build_candidates(
    records: Vec<CandidateRecord>,
    builder: &FeatureBuilder,
) -> Result<Vec<Candidate>> {
    records
        .into_iter()
        .map(|record| {
            Ok(Candidate {
                features: builder.build(&record.signals)?,
                item_id: record.item_id,
            })
        })
        .collect()
}

pub fn load_candidates<P: AsRef<Path>>(
    path: P,
    builder: &FeatureBuilder,
) -> Result<Vec<Candidate>> {
    let records: Vec<CandidateRecord> = read_jsonl_file(path.as_ref())?;
    build_candidates(records, builder)
}
