//! HTTP front end: build submission, status polling and result retrieval.

mod archive;
mod routes;
mod task_store;
mod tasks;
pub mod types;

pub use archive::{zip_dir, zip_root};
pub use routes::{router, serve, AppState};
pub use task_store::{now_string, Completion, InMemoryTaskStore, TaskRecord, TaskStore};
