pub mod cache;
pub mod classify;
pub mod collab;
pub mod config;
pub mod engine;
pub mod error;
pub mod fsops;
pub mod judge;
pub mod lock;
pub mod marker;
pub mod model;
pub mod platform;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod storage;

pub use config::AppConfig;
pub use engine::{Collaborators, ProcessContext, ProcessEngine};
pub use error::Error;
pub use judge::Judge;
pub use model::{ActionType, ClassifyType, FileRecord, FileState, JudgeResult, ReasonType, StoredRecord};
pub use progress::{ProgressReporter, SilentReporter};
pub use report::ProcessReport;
