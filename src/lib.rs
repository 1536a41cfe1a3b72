pub mod engine;
pub mod stores;
pub mod cli;
pub mod utils;

pub use engine::*;
pub use stores::*;
pub use cli::*;
pub use utils::*;
