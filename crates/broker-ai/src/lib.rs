pub mod agents;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod error;
pub mod storage;
pub mod store;
pub mod telemetry;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::AppError;
