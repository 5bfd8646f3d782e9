pub mod coordinator;
pub mod task_table;

pub use coordinator::TaskCoordinator;
pub use task_table::TaskTable;

use crate::models::CoreError;

pub type OrchestrationResult<T> = Result<T, CoreError>;
