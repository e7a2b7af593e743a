//! LSP protocol handlers.
//!
//! - [`completion`]: version completion inside constraints and assignment values
//! - [`hover`]: package metadata for the requirement under the cursor
//! - [`code_lens`]: latest release above each requirement
//!
//! Handlers take the shared [`ServerState`](crate::document::ServerState) and
//! a [`MetadataSource`](pyreq_pypi::MetadataSource) and degrade to an empty
//! answer on any failure; they never panic and never return JSON-RPC errors.

pub mod code_lens;
pub mod completion;
pub mod hover;
