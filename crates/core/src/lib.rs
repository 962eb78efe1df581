//! # SolverBot Core
//!
//! Domain types, traits, and error definitions for the SolverBot assistant.
//! This crate has **no transport or storage dependencies**. It defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`TurnStore`] / [`KnowledgeStore`]: the storage contract
//! - [`Provider`]: the remote reasoning model
//! - [`FormulaRenderer`]: markup-to-image conversion
//! - [`Channel`]: the messaging transport
//!
//! Implementations live in their respective crates, so tests can swap in
//! in-memory or scripted doubles.

pub mod channel;
pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod render;

// Re-export key types at crate root for ergonomics
pub use channel::{Attachment, Channel, ChannelMessage, InboundKind};
pub use error::{ChannelError, Error, RenderError, Result, StorageError, UpstreamError};
pub use memory::{KnowledgeStore, KnowledgeUnit, TurnStore};
pub use message::{ConversationId, ConversationTurn, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use render::FormulaRenderer;
