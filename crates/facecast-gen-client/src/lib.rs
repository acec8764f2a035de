//! Client for a long-running-operation generative video API.
//!
//! A generation request returns an operation name; the operation is polled
//! until `done`, and the finished video is downloaded from the URI in its
//! response. Credentials are checked when the client is built, before any
//! network call.

pub mod client;
pub mod error;
pub mod types;

pub use client::{GenClient, GenClientConfig};
pub use error::{GenError, GenResult};
pub use types::{GenerateVideoRequest, InlineImage, Operation, OperationError};
