mod backoff;
mod client;
mod error;
mod frame;
mod reader;

pub use client::{ConnectionState, PbxMiClient, PbxMiConfig, Tolerance};
pub use error::{PbxMiError, Result};
pub use frame::Frame;
