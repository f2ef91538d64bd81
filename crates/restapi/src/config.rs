//! Settings resolved from CLI/env, the TOML configuration file and defaults,
//! in that order of precedence.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use restapi_catalog::BasePath;

use crate::cli::Cli;

pub const DEFAULT_BASE_URL: &str = "/api/v0.1";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_LOG_LEVEL: &str = "warning";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sections consulted in increasing priority; the client name comes last.
const SHARED_SECTIONS: [&str; 2] = ["global", "client"];

/// Settings a configuration section may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub restapi_base_url: Option<String>,
    pub restapi_public_addr: Option<String>,
    pub restapi_log_level: Option<String>,
    pub restapi_log_file: Option<PathBuf>,
    pub restapi_backends: Option<Vec<String>>,
    pub restapi_timeout: Option<u64>,
}

impl FileSettings {
    /// Fields set in `over` win.
    fn overlay(self, over: FileSettings) -> FileSettings {
        FileSettings {
            restapi_base_url: over.restapi_base_url.or(self.restapi_base_url),
            restapi_public_addr: over.restapi_public_addr.or(self.restapi_public_addr),
            restapi_log_level: over.restapi_log_level.or(self.restapi_log_level),
            restapi_log_file: over.restapi_log_file.or(self.restapi_log_file),
            restapi_backends: over.restapi_backends.or(self.restapi_backends),
            restapi_timeout: over.restapi_timeout.or(self.restapi_timeout),
        }
    }
}

/// Listen address. The host may be a name, so it is kept apart from the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicAddr {
    pub host: String,
    pub port: u16,
}

impl PublicAddr {
    /// Parse `host[:port]`; the port defaults to [`DEFAULT_PORT`].
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        if let Ok(sock) = raw.parse::<SocketAddr>() {
            return Ok(Self {
                host: sock.ip().to_string(),
                port: sock.port(),
            });
        }
        if let Ok(ip) = raw.trim_matches(['[', ']']).parse::<IpAddr>() {
            return Ok(Self {
                host: ip.to_string(),
                port: DEFAULT_PORT,
            });
        }
        let (host, port) = match raw.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .with_context(|| format!("invalid port in public address {raw:?}"))?;
                (host, port)
            }
            None => (raw, DEFAULT_PORT),
        };
        anyhow::ensure!(!host.is_empty(), "empty host in public address {raw:?}");
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for PublicAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Fully resolved process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Configuration file actually read, if any.
    pub conf_path: Option<PathBuf>,
    pub name: String,
    pub base_url: BasePath,
    pub public_addr: PublicAddr,
    /// `tracing` filter directive derived from the configured level name.
    pub log_level: &'static str,
    pub log_file: Option<PathBuf>,
    pub backends: Vec<String>,
    pub timeout: Duration,
}

impl Config {
    /// Resolve settings for `cli`.
    ///
    /// An explicit `--conf` must be readable; otherwise the first file found
    /// in the standard locations is used, and none at all means defaults.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let conf_path = match &cli.conf {
            Some(path) => Some(path.clone()),
            None => find_config_file(&cli.cluster, home_dir()),
        };
        let file = match &conf_path {
            Some(path) => read_settings(path, &cli.name)?,
            None => FileSettings::default(),
        };
        Self::resolve(cli, conf_path, file)
    }

    fn resolve(cli: &Cli, conf_path: Option<PathBuf>, file: FileSettings) -> anyhow::Result<Self> {
        let base_url = cli
            .base_url
            .clone()
            .or(file.restapi_base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let public_addr = match cli.public_addr.clone().or(file.restapi_public_addr) {
            Some(raw) => PublicAddr::parse(&raw)?,
            None => PublicAddr {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
        };

        let level_name = cli
            .log_level
            .clone()
            .or(file.restapi_log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let log_level = filter_directive(&level_name)
            .with_context(|| format!("unknown log level {level_name:?}"))?;

        let backends = if cli.backends.is_empty() {
            file.restapi_backends.unwrap_or_default()
        } else {
            cli.backends.clone()
        };

        let timeout = cli
            .timeout
            .or(file.restapi_timeout)
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

        Ok(Self {
            conf_path,
            name: cli.name.clone(),
            base_url: BasePath::new(&base_url),
            public_addr,
            log_level,
            log_file: cli.log_file.clone().or(file.restapi_log_file),
            backends,
            timeout,
        })
    }
}

/// Map a level name to a `tracing` filter directive.
pub fn filter_directive(level: &str) -> Option<&'static str> {
    match level.to_ascii_lowercase().as_str() {
        "critical" | "error" => Some("error"),
        "warning" | "warn" => Some("warn"),
        "info" => Some("info"),
        "debug" => Some("debug"),
        "trace" => Some("trace"),
        _ => None,
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Standard configuration file locations for `cluster`, in search order.
fn candidate_paths(cluster: &str, home: Option<PathBuf>) -> Vec<PathBuf> {
    let file = format!("{cluster}.toml");
    let mut paths = vec![Path::new("/etc/ceph").join(&file)];
    if let Some(home) = home {
        paths.push(home.join(".ceph").join(&file));
    }
    paths.push(PathBuf::from(file));
    paths
}

fn find_config_file(cluster: &str, home: Option<PathBuf>) -> Option<PathBuf> {
    candidate_paths(cluster, home)
        .into_iter()
        .find(|p| p.is_file())
}

fn read_settings(path: &Path, name: &str) -> anyhow::Result<FileSettings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("can't read configuration file {}", path.display()))?;
    parse_settings(&raw, name)
        .with_context(|| format!("invalid configuration file {}", path.display()))
}

/// Merge `[global]`, `[client]` and `[<name>]`, later sections winning.
fn parse_settings(raw: &str, name: &str) -> anyhow::Result<FileSettings> {
    let value: toml::Value = raw.parse()?;
    let mut sections: Vec<&str> = SHARED_SECTIONS.to_vec();
    sections.push(name);

    let mut settings = FileSettings::default();
    for section in sections {
        let Some(table) = value.get(section) else {
            continue;
        };
        let parsed: FileSettings = table
            .clone()
            .try_into()
            .with_context(|| format!("invalid section [{section}]"))?;
        settings = settings.overlay(parsed);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["restapi"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let config = Config::resolve(&cli(&[]), None, FileSettings::default()).unwrap();
        assert_eq!(config.base_url.as_str(), "/api/v0.1");
        assert_eq!(config.public_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.backends.is_empty());
    }

    #[test]
    fn cli_beats_file_beats_defaults() {
        let file = FileSettings {
            restapi_base_url: Some("/from/file/".into()),
            restapi_public_addr: Some("10.0.0.1:8000".into()),
            restapi_log_level: Some("info".into()),
            restapi_backends: Some(vec!["http://file:7480".into()]),
            restapi_timeout: Some(5),
            ..Default::default()
        };
        let config = Config::resolve(
            &cli(&["--base-url", "/cli", "--backend", "http://cli:7480"]),
            None,
            file,
        )
        .unwrap();
        assert_eq!(config.base_url.as_str(), "/cli");
        assert_eq!(config.backends, vec!["http://cli:7480"]);
        assert_eq!(config.public_addr.port, 8000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let err = Config::resolve(&cli(&["--log-level", "loud"]), None, FileSettings::default());
        assert!(err.is_err());
        assert_eq!(filter_directive("CRITICAL"), Some("error"));
        assert_eq!(filter_directive("warning"), Some("warn"));
    }

    #[test]
    fn public_addr_port_defaults_to_5000() {
        assert_eq!(
            PublicAddr::parse("localhost").unwrap(),
            PublicAddr {
                host: "localhost".into(),
                port: 5000
            }
        );
        assert_eq!(PublicAddr::parse("127.0.0.1:8080").unwrap().port, 8080);
        assert_eq!(PublicAddr::parse("::1").unwrap().to_string(), "[::1]:5000");
        assert_eq!(PublicAddr::parse("[::1]:9000").unwrap().port, 9000);
        assert!(PublicAddr::parse("host:notaport").is_err());
    }

    #[test]
    fn named_section_overrides_shared_sections() {
        let raw = r#"
            [global]
            restapi_timeout = 10
            restapi_log_level = "error"

            [client]
            restapi_log_level = "info"

            ["client.restapi"]
            restapi_base_url = "/api/v1"
            restapi_backends = ["http://mon1:7480", "http://mon2:7480"]
        "#;
        let settings = parse_settings(raw, "client.restapi").unwrap();
        assert_eq!(settings.restapi_timeout, Some(10));
        assert_eq!(settings.restapi_log_level.as_deref(), Some("info"));
        assert_eq!(settings.restapi_base_url.as_deref(), Some("/api/v1"));
        assert_eq!(settings.restapi_backends.unwrap().len(), 2);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(parse_settings("not = [toml", "client.restapi").is_err());
        assert!(parse_settings("[client]\nrestapi_timeout = \"soon\"", "client.restapi").is_err());
    }

    #[test]
    fn explicit_missing_conf_is_fatal() {
        let c = cli(&["--conf", "/nonexistent/restapi-test.toml"]);
        assert!(Config::load(&c).is_err());
    }

    #[test]
    fn search_order_is_etc_home_cwd() {
        let paths = candidate_paths("ceph", Some(PathBuf::from("/home/u")));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/etc/ceph/ceph.toml"),
                PathBuf::from("/home/u/.ceph/ceph.toml"),
                PathBuf::from("ceph.toml"),
            ]
        );
    }
}
