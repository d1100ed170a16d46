//! Process configuration from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use bulksend_infra::jobs::RetentionPolicy;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Runtime settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub retention: RetentionPolicy,
    pub max_concurrent_jobs: usize,
    /// Per-recipient send limit enforced by the orchestrator.
    pub send_timeout: Option<Duration>,
    /// Connection/command timeout handed to the SMTP transport.
    pub smtp_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            retention: RetentionPolicy::default(),
            max_concurrent_jobs: 4,
            send_timeout: None,
            smtp_timeout: Duration::from_secs(20),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    /// Read the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or blank keys keep their
    /// defaults; `0` disables the retention limits.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match (get("BIND_ADDR"), get("PORT")) {
            (Some(addr), _) => addr
                .trim()
                .parse()
                .with_context(|| format!("BIND_ADDR is not a socket address: {addr}"))?,
            (None, Some(port)) => {
                let port: u16 = port
                    .trim()
                    .parse()
                    .with_context(|| format!("PORT is not a valid port: {port}"))?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            (None, None) => defaults.bind_addr,
        };

        let mut retention = defaults.retention;
        if let Some(max) = parse::<usize>(&get, "MAX_RETAINED_JOBS")? {
            retention.max_jobs = (max > 0).then_some(max);
        }
        if let Some(secs) = parse::<u64>(&get, "JOB_TTL_SECS")? {
            retention.ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }

        let max_concurrent_jobs =
            parse::<usize>(&get, "MAX_CONCURRENT_JOBS")?.unwrap_or(defaults.max_concurrent_jobs);
        if max_concurrent_jobs == 0 {
            anyhow::bail!("MAX_CONCURRENT_JOBS must be at least 1");
        }

        let send_timeout = parse::<u64>(&get, "SEND_TIMEOUT_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let smtp_timeout = parse::<u64>(&get, "SMTP_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.smtp_timeout);
        let max_upload_bytes =
            parse::<usize>(&get, "MAX_UPLOAD_BYTES")?.unwrap_or(defaults.max_upload_bytes);

        Ok(Self {
            bind_addr,
            retention,
            max_concurrent_jobs,
            send_timeout,
            smtp_timeout,
            max_upload_bytes,
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value: {raw}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(cfg.retention, RetentionPolicy::default());
        assert_eq!(cfg.max_concurrent_jobs, 4);
        assert_eq!(cfg.send_timeout, None);
        assert_eq!(cfg.smtp_timeout, Duration::from_secs(20));
        assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn port_is_used_when_bind_addr_is_absent() {
        assert_eq!(config(&[("PORT", "8081")]).unwrap().bind_addr.to_string(), "0.0.0.0:8081");
        assert_eq!(
            config(&[("PORT", "8081"), ("BIND_ADDR", "127.0.0.1:9000")])
                .unwrap()
                .bind_addr
                .to_string(),
            "127.0.0.1:9000"
        );
    }

    #[test]
    fn zero_disables_retention_limits() {
        let cfg = config(&[("MAX_RETAINED_JOBS", "0"), ("JOB_TTL_SECS", "0")]).unwrap();
        assert_eq!(cfg.retention, RetentionPolicy::unbounded());
    }

    #[test]
    fn timeouts_are_read_in_seconds() {
        let cfg = config(&[("SEND_TIMEOUT_SECS", "30"), ("SMTP_TIMEOUT_SECS", "5")]).unwrap();
        assert_eq!(cfg.send_timeout, Some(Duration::from_secs(30)));
        assert_eq!(cfg.smtp_timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = config(&[("MAX_CONCURRENT_JOBS", "lots")]).unwrap_err();
        assert!(err.to_string().contains("MAX_CONCURRENT_JOBS"));

        let err = config(&[("PORT", "70000")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        assert!(config(&[("MAX_CONCURRENT_JOBS", "0")]).is_err());
    }
}
