//! Owner access policies.
//!
//! Authentication happens elsewhere; by the time a request reaches the
//! planner it carries an owner id.  A policy decides whether that owner
//! may use owner-scoped operations (scenarios, profile).  The engine
//! itself is never gated.

use crate::error::{PlannerError, Result};
use std::collections::HashSet;

pub trait AccessPolicy: Send + Sync {
    fn authorize(&self, owner: &str) -> Result<()>;
}

/// Admits every non-empty owner id.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn authorize(&self, owner: &str) -> Result<()> {
        if owner.trim().is_empty() {
            return Err(PlannerError::Unauthorized(owner.to_string()));
        }
        Ok(())
    }
}

/// Admits only the listed owner ids.
#[derive(Debug, Clone)]
pub struct AllowList {
    owners: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }
}

impl AccessPolicy for AllowList {
    fn authorize(&self, owner: &str) -> Result<()> {
        if self.owners.contains(owner) {
            Ok(())
        } else {
            Err(PlannerError::Unauthorized(owner.to_string()))
        }
    }
}
