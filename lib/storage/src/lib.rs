pub mod config_store;
pub mod dataset;
pub mod model_store;

pub use config_store::ConfigStore;
pub use dataset::{
    build_candidates, build_label_set, load_candidates, load_label_set, read_jsonl,
    CandidateRecord, LabelRecord,
};
pub use model_store::{ModelBundle, ModelStore, MODEL_FORMAT_VERSION};
