pub mod chapter;
pub mod error;
pub mod reconcile;
pub mod store;
pub mod task;
pub mod title;

pub use chapter::{ChapterId, ChapterSet};
pub use error::{Error, Result};
pub use reconcile::{missing, missing_from_labels};
pub use store::{JsonTitleStore, MemoryTitleStore, TitleStore};
pub use task::{Task, TaskHandle, TaskId, TaskRegistry, TaskStatus};
pub use title::{NewTitle, Title, TitleId, DEFAULT_GROUP_NAME};
