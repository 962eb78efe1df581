//! The knowledge-augmented conversation pipeline.
//!
//! A turn flows through these stages:
//!
//! 1. **Receive** a message from a channel
//! 2. **Ingest** uploaded PDFs into the knowledge store and arm priming
//! 3. **Assemble** the context: directive, replayed history, knowledge, question
//! 4. **Ask** the reasoning model and record the turn pair
//! 5. **Render** the reply as plain text or styled text plus a formula image
//!
//! [`Assistant`] drives the whole flow; each stage is usable on its own.

pub mod client;
pub mod context;
pub mod ingest;
pub mod lookup;
pub mod pipeline;
pub mod render;
pub mod state;

#[cfg(test)]
mod test_helpers;

pub use client::ReasoningClient;
pub use context::{AssembledContext, ContextAssembler};
pub use ingest::{Ingestor, extract_text};
pub use lookup::{KnowledgeFragment, KnowledgeLookup};
pub use pipeline::{Assistant, Handled};
pub use render::{RenderedReply, ReplyRenderer};
pub use state::{ConversationState, ConversationStates};
