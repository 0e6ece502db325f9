#![forbid(unsafe_code)]

//! Per-account automation worker for a multiplayer farming game.
//!
//! One worker process drives one account: it logs in through a game
//! transport, runs the adaptive farm/friend scheduler, claims task rewards,
//! sells fruit, and reports status to a supervising coordinator over a
//! newline-delimited JSON control channel.

pub mod analytics;
pub mod config;
pub mod control;
pub mod errors;
pub mod game;
pub mod gate;
pub mod models;
pub mod scheduler;
pub mod store;
pub mod tasks;
pub mod warehouse;
pub mod worker;

pub use config::WorkerConfig;
pub use errors::{AppError, Result};
