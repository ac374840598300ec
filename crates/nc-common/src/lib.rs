//! Neutron correlation analysis common types and errors.
//!
//! This crate provides the value types shared by the analysis crates:
//! - Detector events and the time-ordered event stream
//! - Feynman (gated count) and Rossi (time difference) histograms
//! - Named analysis choices (models, Rossi variants, pairing policies)
//! - The unified error taxonomy with stable codes

pub mod error;
pub mod event;
pub mod histogram;
pub mod policy;

pub use error::{Error, ErrorCategory, InputError, RejectReason, Result, StructuredError};
pub use event::{Event, EventStream};
pub use histogram::{FeynmanHistogram, RossiHistogram};
pub use policy::{DecayModel, EmptyGates, PairingPolicy, RossiVariant};
