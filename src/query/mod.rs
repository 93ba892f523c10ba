pub mod executor;
pub mod expression;
pub mod optimizer;
pub mod plan;

pub use executor::{create_executor, execute_plan, ExecutionError, Executor, ExecutorContext};
pub use optimizer::Optimizer;
