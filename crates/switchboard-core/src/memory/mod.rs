pub mod recall;
pub mod store;

pub use recall::RecallEngine;
pub use store::{MemoryStore, PRUNE_KEEP_FROM};

use crate::models::CoreError;

pub type MemoryResult<T> = Result<T, CoreError>;
