//! hashtag-tracker domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `pipeline` and `scoring`: Post validation, relevance scoring and ranking
//! - `calendar`: ISO-week and time zone arithmetic
//! - `usecases`: Collection and analysis entry points

pub mod cache;
pub mod calendar;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod ports;
pub mod schedule;
pub mod scoring;
pub mod usecases;

pub use error::{DataProcessingError, ProcessingStep, TrackerError};
pub use model::*;
pub use ports::*;
