//! Core batch translation engine

pub mod cache;
pub mod client;
pub mod config;
pub mod cost;
pub mod errors;
pub mod mock;
pub mod models;
pub mod observer;
pub mod pacing;
pub mod parser;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod rate_limits;
pub mod retry;
pub mod runner;
