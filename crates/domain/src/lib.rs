pub mod config;
pub mod entities;
pub mod error;

pub use config::Config;
pub use entities::*;
pub use error::{Error, Result};
