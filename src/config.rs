//! Runtime configuration read from the environment.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `SALON_BIND_ADDR` | HTTP listen address | `127.0.0.1:3000` |
//! | `SALON_SCENARIO_DIR` | directory for the file scenario store | unset: in-memory |
//! | `SALON_ALLOWED_OWNERS` | comma separated owner allow-list | unset: any owner |

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub scenario_dir: Option<PathBuf>,
    pub allowed_owners: Option<Vec<String>>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let addr = lookup("SALON_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = addr
            .parse()
            .with_context(|| format!("invalid SALON_BIND_ADDR {addr:?}"))?;
        let scenario_dir = lookup("SALON_SCENARIO_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        let allowed_owners = lookup("SALON_ALLOWED_OWNERS").map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|owner| !owner.is_empty())
                .map(String::from)
                .collect()
        });
        Ok(Self {
            bind_addr,
            scenario_dir,
            allowed_owners,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.scenario_dir, None);
        assert_eq!(config.allowed_owners, None);
    }

    #[test]
    fn reads_all_variables() {
        let config = Config::from_lookup(lookup(&[
            ("SALON_BIND_ADDR", "0.0.0.0:8080"),
            ("SALON_SCENARIO_DIR", "/var/lib/salon"),
            ("SALON_ALLOWED_OWNERS", "alice, bob,,"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.scenario_dir, Some(PathBuf::from("/var/lib/salon")));
        assert_eq!(
            config.allowed_owners,
            Some(vec!["alice".to_string(), "bob".to_string()])
        );
    }

    #[test]
    fn rejects_bad_address() {
        assert!(Config::from_lookup(lookup(&[("SALON_BIND_ADDR", "not an addr")])).is_err());
    }
}
