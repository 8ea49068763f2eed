//! Stampa content publication workflow engine.
//!
//! The decision core of a hierarchical, multi-language content backoffice:
//! given an action request (save / publish / send-to-publish / unpublish /
//! move / copy / sort / delete) it decides whether the change may happen,
//! what the next persisted state is, and reports a structured outcome.
//! Transport, serialization, localization, and identity resolution are
//! external collaborators consumed through the traits in [`store`].

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod schema;
pub mod store;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
