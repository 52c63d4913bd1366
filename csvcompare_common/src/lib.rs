pub mod config;
pub mod error;
pub mod options;

pub use config::*;
pub use error::*;
pub use options::*;
