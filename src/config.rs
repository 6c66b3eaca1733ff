use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::concierge::intake::IntakeTimings;

/// Largest accepted `CONCIERGE_DELAY_SCALE`.
pub const MAX_DELAY_SCALE: f64 = 1000.0;

/// Server configuration, read from `CONCIERGE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host address to bind to (default: "0.0.0.0")
    pub host: String,
    /// Port to listen on (default: 3000)
    pub port: u16,
    /// JSON catalog replacing the built-in demo fixtures
    pub fixtures: Option<PathBuf>,
    /// Multiplier for every scripted delay; 0 makes them instant
    pub delay_scale: f64,
    /// Fixed seed for comparison metrics; random per session when unset
    pub compare_seed: Option<u64>,
    /// Idle sessions older than this are reaped
    pub session_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            fixtures: None,
            delay_scale: 1.0,
            compare_seed: None,
            session_ttl: Duration::from_secs(1800),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset keys keep their defaults;
    /// set but unparseable ones are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let delay_scale = parse_or(&lookup, "CONCIERGE_DELAY_SCALE", defaults.delay_scale)?;
        if !(0.0..=MAX_DELAY_SCALE).contains(&delay_scale) {
            bail!(
                "CONCIERGE_DELAY_SCALE must be between 0 and {}, got {}",
                MAX_DELAY_SCALE,
                delay_scale
            );
        }

        let ttl_secs = parse_or(
            &lookup,
            "CONCIERGE_SESSION_TTL_SECS",
            defaults.session_ttl.as_secs(),
        )?;
        if ttl_secs == 0 {
            bail!("CONCIERGE_SESSION_TTL_SECS must be positive");
        }

        Ok(Self {
            host: lookup("CONCIERGE_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "CONCIERGE_PORT", defaults.port)?,
            fixtures: lookup("CONCIERGE_FIXTURES")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            delay_scale,
            compare_seed: lookup("CONCIERGE_COMPARE_SEED")
                .map(|raw| {
                    raw.trim()
                        .parse()
                        .with_context(|| format!("Invalid CONCIERGE_COMPARE_SEED: {}", raw))
                })
                .transpose()?,
            session_ttl: Duration::from_secs(ttl_secs),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timings(&self) -> Timings {
        Timings::default().scaled(self.delay_scale)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {}", key, raw)),
        None => Ok(default),
    }
}

/// Every scripted delay a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub intake: IntakeTimings,
    pub visit_request: Duration,
    pub property_reply: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            intake: IntakeTimings::default(),
            visit_request: Duration::from_millis(1500),
            property_reply: Duration::from_millis(800),
        }
    }
}

impl Timings {
    /// Multiplies every delay by `factor`. Results that do not fit a
    /// `Duration` saturate.
    pub fn scaled(self, factor: f64) -> Self {
        let scale = |d: Duration| {
            Duration::try_from_secs_f64(d.as_secs_f64() * factor).unwrap_or(Duration::MAX)
        };
        Self {
            intake: IntakeTimings {
                start: scale(self.intake.start),
                typing: scale(self.intake.typing),
                answer_gap: scale(self.intake.answer_gap),
                closing: scale(self.intake.closing),
                completion: scale(self.intake.completion),
            },
            visit_request: scale(self.visit_request),
            property_reply: scale(self.property_reply),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert!(config.fixtures.is_none());
        assert!(config.compare_seed.is_none());
        assert_eq!(config.session_ttl, Duration::from_secs(1800));
        assert_eq!(config.timings(), Timings::default());
    }

    #[test]
    fn reads_all_keys() {
        let config = config(&[
            ("CONCIERGE_HOST", "127.0.0.1"),
            ("CONCIERGE_PORT", "8080"),
            ("CONCIERGE_FIXTURES", "/tmp/catalog.json"),
            ("CONCIERGE_DELAY_SCALE", "0.5"),
            ("CONCIERGE_COMPARE_SEED", "42"),
            ("CONCIERGE_SESSION_TTL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.fixtures, Some(PathBuf::from("/tmp/catalog.json")));
        assert_eq!(config.compare_seed, Some(42));
        assert_eq!(config.session_ttl, Duration::from_secs(60));
        assert_eq!(config.timings().visit_request, Duration::from_millis(750));
        assert_eq!(config.timings().intake.start, Duration::from_millis(500));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = config(&[("CONCIERGE_PORT", "not_a_number")]).unwrap_err();
        assert!(err.to_string().contains("CONCIERGE_PORT"));
        assert!(config(&[("CONCIERGE_DELAY_SCALE", "-1")]).is_err());
        assert!(config(&[("CONCIERGE_DELAY_SCALE", "NaN")]).is_err());
        let err = config(&[("CONCIERGE_DELAY_SCALE", "1e20")]).unwrap_err();
        assert!(err.to_string().contains("CONCIERGE_DELAY_SCALE"));
        assert!(config(&[("CONCIERGE_DELAY_SCALE", "1000")]).is_ok());
        assert!(config(&[("CONCIERGE_SESSION_TTL_SECS", "0")]).is_err());
        assert!(config(&[("CONCIERGE_COMPARE_SEED", "abc")]).is_err());
    }

    #[test]
    fn zero_scale_makes_delays_instant() {
        let timings = Timings::default().scaled(0.0);
        assert_eq!(timings.intake.completion, Duration::ZERO);
        assert_eq!(timings.property_reply, Duration::ZERO);
    }

    #[test]
    fn huge_scale_saturates_instead_of_panicking() {
        let timings = Timings::default().scaled(1e20);
        assert_eq!(timings.visit_request, Duration::MAX);
        assert_eq!(timings.intake.start, Duration::MAX);
    }
}
