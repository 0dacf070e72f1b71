pub mod column_extractor;
pub mod connectivity;
pub mod metrics;
pub mod model_client;

pub use column_extractor::extract_column;
pub use connectivity::{probe_model, ProbeOutcome};
pub use metrics::{ScoringEngine, TextEmbedder};
pub use model_client::{query_model, ModelClient};
