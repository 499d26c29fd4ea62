//! Swipe-deck discovery and realtime chat core for the ConnectHub client.

pub mod client;
pub mod common;
pub mod utils;
