//! Protobuf bindings for the subset of the Hyperledger Fabric protocol spoken by the dashboard's
//! gateway client.
//!
//! The modules mirror the protobuf packages: [`common`], [`msp`], [`protos`] (peer) and
//! [`gateway`]. Bindings are committed; see `build.rs` to regenerate them.

#[allow(clippy::all, clippy::pedantic, clippy::restriction, clippy::nursery)]
pub mod generated {
    pub mod common;
    pub mod gateway;
    pub mod msp;
    pub mod protos;
}

// Re-export
pub use generated::{common, gateway, msp, protos};
pub use prost::Message;
