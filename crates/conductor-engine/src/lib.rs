//! # Workflow Execution Engine
//!
//! The execution core behind the admission API:
//!
//! - **DAG resolver**: validates workflow shape, produces a deterministic
//!   topological order, detects cycles and dangling dependencies
//! - **Step executor**: resolves input templates against prior results and
//!   dispatches to a typed in-process adapter or over HTTP, with per-step
//!   timeout and retry
//! - **Workflow engine**: drains the persistent queue and drives each
//!   execution through its state machine, recording tasks and events
//!
//! Steps always run sequentially in topological order; `ready_steps` is
//! exposed for future parallel schedulers but unused by the engine.

pub mod adapter;
pub mod engine;
pub mod executor;
pub mod http;
pub mod processor;
pub mod registry;
pub mod resolver;
pub mod template;

pub use adapter::{AdapterError, AdapterRegistry, EchoAdapter, PluginAdapter};
pub use engine::{EngineConfig, EngineError, WorkflowEngine};
pub use executor::{ExecutorError, StepExecutor, StepFailure, StepSuccess};
pub use http::HttpDispatcher;
pub use registry::PluginRegistry;
pub use resolver::{resolve, validate, ready_steps, ResolverError};
pub use template::StepContext;
