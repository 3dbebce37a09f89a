//! Server configuration resolved from defaults, environment, then CLI flags (highest wins).

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::explorer::{ArchiveOptions, TraversalPolicy};

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_ROOT: &str = "files";

pub const USAGE: &str = "velo server\n\nUSAGE:\n  velo [--bind ADDR] [--http-port N] [--root PATH] [--strip-leading-traversal] [--no-archive-hidden]\n\nOPTIONS:\n  --bind ADDR                 Listen address (env: VELO_BIND, default 0.0.0.0)\n  --http-port N               HTTP port (env: VELO_HTTP_PORT or PORT, default 3000)\n  --root PATH                 Directory served read-only (env: VELO_ROOT, default ./files)\n  --strip-leading-traversal   Serve '../a' as 'a' instead of denying it (env: VELO_TRAVERSAL=strip)\n  --no-archive-hidden         Leave dotfiles out of zip downloads (env: VELO_ARCHIVE_HIDDEN=false)\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub http_port: u16,
    pub root: PathBuf,
    pub traversal: TraversalPolicy,
    pub archive_hidden: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: DEFAULT_HTTP_PORT,
            root: PathBuf::from(DEFAULT_ROOT),
            traversal: TraversalPolicy::Reject,
            archive_hidden: true,
        }
    }
}

fn parse_bool_word(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1).map(String::as_str)
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

impl ServerConfig {
    /// Layer `env` over the defaults, then `args` over that.
    /// `env` is a lookup so callers (and tests) decide where variables come from.
    pub fn resolve<F>(env: F, args: &[String]) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = ServerConfig::default();

        if let Some(v) = env("VELO_BIND") {
            cfg.bind = v.parse().with_context(|| format!("VELO_BIND is not an IP address: {}", v))?;
        }
        if let Some(v) = env("VELO_HTTP_PORT").or_else(|| env("PORT")) {
            cfg.http_port = v.parse().with_context(|| format!("invalid HTTP port: {}", v))?;
        }
        if let Some(v) = env("VELO_ROOT") {
            cfg.root = PathBuf::from(v);
        }
        if let Some(v) = env("VELO_TRAVERSAL") {
            cfg.traversal = v.parse().map_err(|e: String| anyhow!(e))?;
        }
        if let Some(v) = env("VELO_ARCHIVE_HIDDEN") {
            cfg.archive_hidden = parse_bool_word(&v)
                .ok_or_else(|| anyhow!("VELO_ARCHIVE_HIDDEN must be a boolean word, got '{}'", v))?;
        }

        if let Some(v) = flag_value(args, "--bind") {
            cfg.bind = v.parse().with_context(|| format!("--bind is not an IP address: {}", v))?;
        }
        if let Some(v) = flag_value(args, "--http-port") {
            cfg.http_port = v.parse().with_context(|| format!("invalid --http-port: {}", v))?;
        }
        if let Some(v) = flag_value(args, "--root") {
            cfg.root = PathBuf::from(v);
        }
        if has_flag(args, "--strip-leading-traversal") {
            cfg.traversal = TraversalPolicy::StripLeading;
        }
        if has_flag(args, "--no-archive-hidden") {
            cfg.archive_hidden = false;
        }

        Ok(cfg)
    }

    /// Resolve from the process environment and arguments.
    pub fn from_process() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        Self::resolve(|k| std::env::var(k).ok(), &args)
    }

    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions { include_hidden: self.archive_hidden }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_without_env_or_args() {
        let cfg = ServerConfig::resolve(|_| None, &args(&["velo"])).unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.http_port, 3000);
        assert_eq!(cfg.root, PathBuf::from("files"));
        assert!(cfg.archive_options().include_hidden);
    }

    #[test]
    fn precedence_default_env_args() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PORT", "8080"),
            ("VELO_HTTP_PORT", "9000"),
            ("VELO_ROOT", "/data/env"),
            ("VELO_TRAVERSAL", "strip"),
            ("VELO_ARCHIVE_HIDDEN", "off"),
        ]);
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        let cfg = ServerConfig::resolve(lookup, &args(&["velo"])).unwrap();
        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.root, PathBuf::from("/data/env"));
        assert_eq!(cfg.traversal, TraversalPolicy::StripLeading);
        assert!(!cfg.archive_hidden);

        let cfg = ServerConfig::resolve(lookup, &args(&["velo", "--http-port", "7000", "--root", "/data/cli", "--bind", "127.0.0.1"])).unwrap();
        assert_eq!(cfg.http_port, 7000);
        assert_eq!(cfg.root, PathBuf::from("/data/cli"));
        assert_eq!(cfg.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn plain_port_env_is_honoured() {
        let cfg = ServerConfig::resolve(|k| (k == "PORT").then(|| "4000".to_string()), &args(&["velo"])).unwrap();
        assert_eq!(cfg.http_port, 4000);
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(ServerConfig::resolve(|_| None, &args(&["velo", "--http-port", "nope"])).is_err());
        assert!(ServerConfig::resolve(|k| (k == "VELO_TRAVERSAL").then(|| "sideways".into()), &args(&["velo"])).is_err());
        assert!(ServerConfig::resolve(|k| (k == "VELO_ARCHIVE_HIDDEN").then(|| "maybe".into()), &args(&["velo"])).is_err());
    }

    #[test]
    fn cli_switches() {
        let cfg = ServerConfig::resolve(|_| None, &args(&["velo", "--strip-leading-traversal", "--no-archive-hidden"])).unwrap();
        assert_eq!(cfg.traversal, TraversalPolicy::StripLeading);
        assert!(!cfg.archive_hidden);
    }
}
