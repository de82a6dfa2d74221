//! A provider-neutral abstraction layer for language models.
//!
//! This crate establishes the protocol between the agent runtime and the
//! models it drives: a request carries instructions, input items, tuning
//! settings, tools and handoffs; a response carries output items and usage
//! counters. Models can answer in one shot ([`Model::get_response`]) or as
//! an ordered event stream ([`Model::stream_response`]).
//!
//! Types in this crate don't define any runtime behavior, instead they are
//! the constraints that the implementors should adhere to. The only logic
//! here is data plumbing shared by every implementor: settings overlay,
//! usage accumulation and stream ordering checks.

#![deny(missing_docs)]

mod aggregate;
mod error;
mod items;
mod model;
mod request;
mod response;
mod settings;
mod usage;

pub use aggregate::*;
pub use error::*;
pub use items::*;
pub use model::*;
pub use request::*;
pub use response::*;
pub use settings::*;
pub use usage::*;
