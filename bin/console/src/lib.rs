//! Terminal front end of the parlance claim bot.
//!
//! The console reads lines from stdin, classifies them with keyword rules
//! and prints the bot's answers with their typing delays.

pub mod app;
pub mod config;
pub mod error;
pub mod nlu;
pub mod terminal;

pub use app::{Input, build_manager, parse_input};
pub use config::{AssetPaths, ConsoleConfig, UserConfig};
pub use error::{ConsoleError, NluError};
pub use nlu::KeywordNlu;
pub use terminal::TerminalBot;
