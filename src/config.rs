use std::path::PathBuf;
use std::time::Duration;

use crate::coordinator::FailurePolicy;
use crate::logging::{self, obj, v_str, Domain};

#[derive(Clone, Debug)]
pub struct Config {
    pub backend: String,
    pub timeout_secs: u64,
    pub checking_secs: u64,
    pub stale_failures: FailurePolicy,
    /// Address-bar fragment the session starts from.
    pub fragment: String,
    /// Page query string; `profile=` in it starts the liveness check.
    pub search: String,
    pub out_dir: PathBuf,
    pub fixture_dir: PathBuf,
    pub fixture_port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            backend: std::env::var("PROFVIEW_BACKEND").unwrap_or_else(|_| "http://127.0.0.1:7007".to_string()),
            timeout_secs: std::env::var("PROFVIEW_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(3600),
            checking_secs: std::env::var("PROFVIEW_CHECKING_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            stale_failures: std::env::var("PROFVIEW_STALE_FAILURES")
                .ok()
                .and_then(|v| parse_policy(&v))
                .unwrap_or_default(),
            fragment: std::env::var("PROFVIEW_FRAGMENT").unwrap_or_default(),
            search: std::env::var("PROFVIEW_SEARCH").unwrap_or_default(),
            out_dir: std::env::var("PROFVIEW_OUT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("out/profview")),
            fixture_dir: std::env::var("FIXTURE_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("fixtures")),
            fixture_port: std::env::var("FIXTURE_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(7007),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn checking_for(&self) -> Duration {
        Duration::from_secs(self.checking_secs)
    }
}

fn parse_policy(raw: &str) -> Option<FailurePolicy> {
    let parsed = FailurePolicy::parse(raw);
    if parsed.is_none() {
        logging::warn(
            Domain::System,
            "config_ignored",
            obj(&[("key", v_str("PROFVIEW_STALE_FAILURES")), ("value", v_str(raw))]),
        );
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_policy_falls_back() {
        assert_eq!(parse_policy("discard"), Some(FailurePolicy::DiscardStale));
        assert_eq!(parse_policy("sometimes"), None);
    }

    #[test]
    fn test_durations() {
        let cfg = Config {
            backend: "http://localhost:1".into(),
            timeout_secs: 2,
            checking_secs: 5,
            stale_failures: FailurePolicy::Surface,
            fragment: String::new(),
            search: String::new(),
            out_dir: PathBuf::from("out"),
            fixture_dir: PathBuf::from("fixtures"),
            fixture_port: 7007,
        };
        assert_eq!(cfg.timeout(), Duration::from_secs(2));
        assert_eq!(cfg.checking_for(), Duration::from_secs(5));
    }
}
