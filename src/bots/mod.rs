//! Bundled sample bots.

pub mod walker;

pub use walker::WalkerBot;
