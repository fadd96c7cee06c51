pub mod backend;
pub mod cli;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod export;
pub mod oracle;
pub mod service;
pub mod sync;

pub use error::{FinanceError, Result};
pub use service::FinanceService;
