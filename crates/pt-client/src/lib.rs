//! Persistence for tour documents: a fallible [`TourBackend`] transport and
//! the never-failing [`PersistenceClient`] facade the editor talks to.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;

pub use backend::{ResourceKind, TourBackend, Upload};
pub use client::{PersistenceClient, SaveOutcome};
pub use config::ClientConfig;
pub use error::PersistError;
pub use http::{HttpBackend, decode_tour_list};
pub use memory::{MemoryBackend, SaveRecord};
