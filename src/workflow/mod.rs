pub mod dual_model;
pub mod evaluation;
pub mod task_ctx;

pub use dual_model::run_dual;
pub use evaluation::{load_questions, EvaluationFlow, EvaluationJob};
pub use task_ctx::TaskCtx;
