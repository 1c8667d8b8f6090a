#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for sempool
//!
//! This crate provides the small vocabulary shared by every other crate:
//! request priorities, gate tiers, per-tier permit counts and the call-site
//! labels attached to telemetry.

pub mod call_site;
pub mod priority;

pub use call_site::CallSite;
pub use priority::{ParseEnumError, Priority, Tier, TierPermits};
