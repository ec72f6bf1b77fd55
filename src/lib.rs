//! Salon Planner library crate.
//!
//! This crate exposes the salon financial planning engine and its
//! supporting components as reusable modules.  External applications
//! may call [`engine::compute`] directly with an input snapshot, keep
//! named plans in a [`scenario::ScenarioStore`], drive edits and undo
//! through a [`session::PlannerSession`], or embed the HTTP API via
//! [`api::build_router`].

pub mod access;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod history;
pub mod models;
pub mod profile;
pub mod scenario;
pub mod session;
pub mod summary;

pub use engine::{compute, compute_and_apply, Computation};
pub use error::{PlannerError, Result};
pub use models::{InputSnapshot, Metrics};
