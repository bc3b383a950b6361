pub mod verification;
pub mod storage;
pub mod server;
pub mod notify;
pub mod config;
pub mod error;
pub mod utils;

pub use error::{Result, VerifyError};
pub use config::Config;
