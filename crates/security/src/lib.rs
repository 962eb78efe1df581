//! Security policies for SolverBot.
//!
//! Provides the upload gate: which senders may add documents to the
//! knowledge base.

pub mod allowlist;

pub use allowlist::{AllowlistPolicy, SenderCheckResult, UploadPolicy};
