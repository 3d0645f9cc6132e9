// Public contracts for the Conductor API
// This crate defines the workflow/plugin spec documents, status enums,
// response DTOs, and the admission-time shape validation rules.

pub mod plugin;
pub mod status;
pub mod validate;
pub mod views;
pub mod workflow;

pub use plugin::*;
pub use status::*;
pub use validate::*;
pub use views::*;
pub use workflow::*;
