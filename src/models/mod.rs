pub mod evaluation_table;
pub mod metric;
pub mod model_config;
pub mod question;
pub mod response;
pub mod sheet;
pub mod task;

pub use evaluation_table::EvaluationTable;
pub use metric::Metric;
pub use model_config::{ModelConfig, ModelRole, ModelSettings};
pub use question::QuestionSet;
pub use response::ResponseRecord;
pub use sheet::{Cell, Sheet};
pub use task::{Task, TaskStatus};
