//! newsroom domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: Ingestion, planning, publishing and scheduling
//! - `slots`, `ranker`, `links`, `keywords`, `text`: pure helpers

pub mod keywords;
pub mod links;
pub mod model;
pub mod ports;
pub mod ranker;
pub mod slots;
pub mod text;
pub mod usecases;

pub use model::*;
pub use ports::*;
pub use slots::{MAX_SLOTS_PER_DAY, SlotTime};
