use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A (query id, item id) pair with no weak label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MissingPair {
    pub query_id: String,
    pub item_id: String,
}

impl std::fmt::Display for MissingPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.query_id, self.item_id)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Missing required signal: {0}")]
    MissingSignal(&'static str),

    #[error("Signal '{name}' out of range: {value} (expected {min}..={max})")]
    SignalOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Feature mismatch: expected {expected:?}, got {actual:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Invalid feature schema: {0}")]
    InvalidSchema(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Invalid label {label} for ({query_id}, {item_id}): expected 1..=5")]
    InvalidLabel {
        query_id: String,
        item_id: String,
        label: i64,
    },

    #[error("Duplicate label for {0}")]
    DuplicateLabel(MissingPair),

    #[error("Label set does not cover {} required (query, item) pairs: {}", .missing.len(), format_pairs(.missing))]
    MissingLabels { missing: Vec<MissingPair> },

    #[error("Empty label set")]
    EmptyLabelSet,

    #[error("Multicollinear features: {0}")]
    Multicollinearity(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn format_pairs(pairs: &[MissingPair]) -> String {
    pairs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_labels_lists_every_pair() {
        let err = Error::MissingLabels {
            missing: vec![
                MissingPair { query_id: "r1".into(), item_id: "j7".into() },
                MissingPair { query_id: "r2".into(), item_id: "j3".into() },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 required"));
        assert!(msg.contains("(r1, j7)"));
        assert!(msg.contains("(r2, j3)"));
    }
}
