#![forbid(unsafe_code)]

//! Wire disguise for WireGuard-style messages: randomised type fields
//! drawn from per-category ranges, plus keystream junk ahead of each message.

pub mod config;
pub mod junk;
pub mod magic;
pub mod state;

pub use config::ObfuscationConfig;
pub use junk::{JunkCreator, RandomJunk};
pub use magic::{parse_range, MagicHeaderRange, MagicHeaderSet};
pub use state::{HandshakeObserver, ObfuscationState, StateBuilder};
