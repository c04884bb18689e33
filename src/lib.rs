// Public exports for library usage
pub mod campaign;
pub mod config;
pub mod error;
pub mod executor;
pub mod task;
pub mod template;
pub mod value;
