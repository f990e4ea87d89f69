//! Delay threshold alerting engine.
//!
//! Tracks, per monitored entity, how long ago a reference event happened
//! (last acquisition, first pending modification, ...) and raises an alert
//! whenever that age moves into another severity bucket of a
//! [`threshold::ThresholdTable`]. Improvements are damped by a percentage
//! margin and repeated back-and-forth transitions are flagged as flapping.
//!
//! [`engine::DelayAlertEngine`] drives the evaluation, either for a single
//! entity or round-robin over an [`source::EntityCatalog`].

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod scanner;
pub mod source;
pub mod state;
pub mod threshold;


pub use engine::{DelayAlertEngine, EngineConfig, Target};
pub use error::{AlertError, SourceError};
pub use source::{AgeSource, EntityCatalog};
