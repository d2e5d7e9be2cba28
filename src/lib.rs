pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod log;
pub mod orchestration;

pub use config::Config;
pub use core::{
    Catalog, Complexity, Domain, ExecutionRecord, RoleId, SubTask, SubTaskId, SubTaskStatus,
    TaskAnalysis,
};
pub use engine::Engine;
pub use error::{Error, Result};
pub use orchestration::{
    ExecutionPlan, FailurePolicy, RunResult, RunStatus, SchedulerEvent, SimulatedWorker, Worker,
    WorkerRegistry,
};
