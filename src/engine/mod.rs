// Core engine components
pub mod filter_compiler;
pub mod plan_selector;
pub mod execution_reporter;
pub mod engine;

pub use filter_compiler::*;
pub use plan_selector::*;
pub use execution_reporter::*;
pub use engine::*;
