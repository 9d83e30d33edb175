pub mod error;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod profile;
pub mod service;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use error::{Error, Result};
pub use node::{Node, NodeConfig, http::HttpServer};
