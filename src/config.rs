//! Runtime configuration.
//!
//! Values come from `KEYGATE_*` environment variables, then `--flag value` command
//! line arguments override them. Durations accept `ms`, `s`, `m` and `h` suffixes;
//! a bare number is seconds.

use std::path::PathBuf;
use std::time::Duration;

use crate::identity::{SessionConfig, DEFAULT_TIMEOUT};
use crate::storage::PersistenceSettings;

pub const DEFAULT_HTTP_PORT: u16 = 25000;
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub http_port: u16,
    /// Snapshot file for the in-memory backend; `None` keeps state in memory only.
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval: Duration,
    pub session_timeout: Duration,
    /// Admin account created at startup if missing.
    pub bootstrap_admin: Option<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            snapshot_path: None,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            session_timeout: DEFAULT_TIMEOUT,
            bootstrap_admin: None,
        }
    }
}

pub const USAGE: &str = "keygate\n\nUSAGE:\n  keygate [--http-port N] [--db PATH] [--snapshot-interval DUR] [--session-timeout DUR]\n          [--admin-email EMAIL --admin-password PW]\n\nOPTIONS:\n  --http-port N             HTTP API port (env: KEYGATE_HTTP_PORT, default 25000)\n  --db PATH                 Snapshot file for persisted state (env: KEYGATE_DB)\n  --snapshot-interval DUR   Background snapshot interval (env: KEYGATE_SNAPSHOT_INTERVAL, default 5s)\n  --session-timeout DUR     Sliding session window (env: KEYGATE_SESSION_TIMEOUT, default 5m)\n  --admin-email EMAIL       Bootstrap admin email (env: KEYGATE_ADMIN_EMAIL)\n  --admin-password PW       Bootstrap admin password (env: KEYGATE_ADMIN_PASSWORD)\n";

/// Parse `250ms`, `30s`, `5m`, `1h` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (num, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => s.split_at(i),
        None => (s, "s"),
    };
    let n: u64 = num.parse().ok()?;
    match unit.trim().to_ascii_lowercase().as_str() {
        "ms" => Some(Duration::from_millis(n)),
        "s" | "sec" | "secs" => Some(Duration::from_secs(n)),
        "m" | "min" | "mins" => n.checked_mul(60).map(Duration::from_secs),
        "h" => n.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

impl Config {
    /// Load from the process environment and command line.
    pub fn load(args: &[String]) -> Self {
        Self::from_sources(|name| std::env::var(name).ok(), args)
    }

    /// Resolve configuration from an environment lookup and argument list.
    /// Arguments win over environment; unparsable values fall back to defaults.
    pub fn from_sources(env: impl Fn(&str) -> Option<String>, args: &[String]) -> Self {
        let pick = |flag: &str, var: &str| parse_arg(args, flag).or_else(|| env(var));
        let d = Config::default();

        let http_port = pick("--http-port", "KEYGATE_HTTP_PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(d.http_port);
        let snapshot_path = pick("--db", "KEYGATE_DB").filter(|p| !p.is_empty()).map(PathBuf::from);
        let snapshot_interval = pick("--snapshot-interval", "KEYGATE_SNAPSHOT_INTERVAL")
            .and_then(|v| parse_duration(&v))
            .filter(|d| !d.is_zero())
            .unwrap_or(d.snapshot_interval);
        let session_timeout = pick("--session-timeout", "KEYGATE_SESSION_TIMEOUT")
            .and_then(|v| parse_duration(&v))
            .unwrap_or(d.session_timeout);
        let bootstrap_admin = match (
            pick("--admin-email", "KEYGATE_ADMIN_EMAIL"),
            pick("--admin-password", "KEYGATE_ADMIN_PASSWORD"),
        ) {
            (Some(e), Some(p)) if !e.is_empty() => Some((e, p)),
            _ => None,
        };

        Self { http_port, snapshot_path, snapshot_interval, session_timeout, bootstrap_admin }
    }

    pub fn session(&self) -> SessionConfig { SessionConfig::with_timeout(self.session_timeout) }

    pub fn persistence(&self) -> PersistenceSettings {
        PersistenceSettings {
            path: self.snapshot_path.clone(),
            interval_ms: self.snapshot_interval.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(a: &[&str]) -> Vec<String> { a.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("50ms"), Some(Duration::from_millis(50)));
        assert_eq!(parse_duration("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("5 weeks"), None);
        assert_eq!(parse_duration("ms"), None);
    }

    #[test]
    fn defaults_without_sources() {
        let c = Config::from_sources(|_| None, &[]);
        assert_eq!(c, Config::default());
        assert_eq!(c.session().timeout, Duration::from_secs(300));
        assert!(c.persistence().path.is_none());
    }

    #[test]
    fn args_override_env() {
        let env: HashMap<&str, &str> = [
            ("KEYGATE_HTTP_PORT", "9000"),
            ("KEYGATE_SESSION_TIMEOUT", "10m"),
            ("KEYGATE_DB", "/var/lib/keygate.bin"),
        ]
        .into_iter()
        .collect();
        let c = Config::from_sources(
            |k| env.get(k).map(|v| v.to_string()),
            &args(&["keygate", "--http-port", "9100", "--snapshot-interval", "250ms"]),
        );
        assert_eq!(c.http_port, 9100);
        assert_eq!(c.session_timeout, Duration::from_secs(600));
        assert_eq!(c.snapshot_path, Some(PathBuf::from("/var/lib/keygate.bin")));
        assert_eq!(c.persistence().interval_ms, 250);
    }

    #[test]
    fn bootstrap_admin_needs_both_parts() {
        let c = Config::from_sources(|_| None, &args(&["--admin-email", "root@x.com"]));
        assert!(c.bootstrap_admin.is_none());
        let c = Config::from_sources(|_| None, &args(&["--admin-email", "root@x.com", "--admin-password", "pw"]));
        assert_eq!(c.bootstrap_admin, Some(("root@x.com".into(), "pw".into())));
    }

    #[test]
    fn bad_port_falls_back() {
        let c = Config::from_sources(|k| (k == "KEYGATE_HTTP_PORT").then(|| "nope".to_string()), &[]);
        assert_eq!(c.http_port, DEFAULT_HTTP_PORT);
    }
}
