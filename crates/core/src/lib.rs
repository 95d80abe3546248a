//! Core library: a Sidetree-style DID operation processor and a bitcoin
//! value-time-lock monitor, with no I/O or scheduling of its own —
//! callers (`sidetree-node`, tests) supply the wallet, the store, and
//! the clock.

#![warn(
    unused_extern_crates,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::fallible_impl_from,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
    clippy::dbg_macro
)]
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![forbid(unsafe_code)]

pub mod codec;
pub mod document;
pub mod error;
pub mod jws;
pub mod lock;
pub mod operation;
pub mod processor;

pub use codec::{Encoder, Multihash};
pub use document::{DidDocument, Patch};
pub use error::{LockMonitorError, LockResolverError, OperationParseError};
pub use operation::Operation;
pub use processor::{OperationProcessor, ResolutionModel};
