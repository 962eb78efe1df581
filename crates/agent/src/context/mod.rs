//! Context assembly for reasoning calls.
//!
//! # Layers (in order)
//!
//! | Layer | Source | Present when |
//! |-------|--------|--------------|
//! | 1. System | Config directive, or the priming text | Always |
//! | 2. History | Recent turns from the turn store | Turns exist |
//! | 3. Knowledge | Fragments from the active document | Not priming, document in scope, matches found |
//! | 4. User | The current message | Not priming |

pub mod assembler;

pub use assembler::{AssembledContext, ContextAssembler};
