//! Knob Bridge - smart knob to dimmer state aggregator
//!
//! Folds rotation, press and step events from a rotary smart knob into a
//! single brightness/output state and reports it to a dimmer. The state core
//! ([`state`], [`dispatcher`]) is transport-agnostic; [`service`] wires it to
//! a publish/subscribe [`transport`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logfile;
pub mod report;
pub mod service;
pub mod state;
pub mod transport;

pub use dispatcher::{DispatchOutcome, Dispatcher, DropReason};
pub use error::{KnobError, Result};
pub use service::KnobService;
pub use state::{StateReport, StateStore};
