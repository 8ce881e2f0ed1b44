/// State management module
///
/// This module handles all application state, including:
/// - The record model that flows between storage and the views (data.rs)
/// - The authoritative record collection and its change events (store.rs)
/// - The single key-value slot holding the persisted snapshot (slot.rs)
/// - Store configuration (config.rs)
/// - Error types shared by the store and the slots (error.rs)

pub mod config;
pub mod data;
pub mod error;
pub mod slot;
pub mod store;
