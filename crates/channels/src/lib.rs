//! Messaging transport adapters for SolverBot.
//!
//! Each adapter implements `solverbot_core::Channel`.
//!
//! Available channels:
//! - **Telegram**: Bot API over HTTPS, fed by webhook updates
//! - **CLI**: interactive terminal chat (stdin/stdout)

pub mod cli;
pub mod telegram;

pub use cli::CliChannel;
pub use telegram::{TelegramChannel, TelegramConfig, parse_update};
