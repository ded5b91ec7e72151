//! Core domain model types for status tracking.
//!
//! This module contains the types shared by every layer of the tracker:
//! - Stage lifecycle and connection state enums
//! - The stage event wire message
//! - The ordered catalog of pipeline steps

mod catalog;
mod event;
mod status;

pub use catalog::{PipelineStep, StepCatalog};
pub use event::{EventRejection, StageEvent};
pub use status::{ConnectionState, LifecycleState, UnknownLifecycleState};
