//! Handler module loading and invalidation
//!
//! The [`ModuleRegistry`] owns every loaded module. With the module cache
//! disabled the dispatcher purges a handler before each load, so every
//! request runs the source currently on disk.

pub mod envelope;
pub mod registry;
pub mod script;

pub use registry::ModuleRegistry;
pub use script::{ScriptLoader, ScriptModule};
