//! Interfaces layer - External API adapters

pub mod http;
