//! Remote document store: a single versioned file in a GitHub repository,
//! accessed through the contents API with sha-based optimistic concurrency.

mod client;
mod types;

pub use client::GithubClient;
pub use types::{decode_text, encode_text, RemoteDocument, RemoteError};
