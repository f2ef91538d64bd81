use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Cluster name used to locate the default configuration file.
pub const DEFAULT_CLUSTER: &str = "ceph";

/// Client name; also the configuration section read for settings.
pub const DEFAULT_CLIENT_NAME: &str = "client.restapi";

#[derive(Parser, Debug)]
#[command(
    name = "restapi",
    version,
    about = "Serve the cluster's administrative commands as a REST API"
)]
pub struct Cli {
    /// Configuration file (default: search /etc/ceph, ~/.ceph, then cwd)
    #[arg(short, long, env = "CEPH_CONF", value_name = "PATH")]
    pub conf: Option<PathBuf>,

    /// Cluster name, used to find <cluster>.toml
    #[arg(long, env = "CEPH_CLUSTER_NAME", default_value = DEFAULT_CLUSTER)]
    pub cluster: String,

    /// Client name; selects the configuration section
    #[arg(short = 'n', long, env = "CEPH_NAME", default_value = DEFAULT_CLIENT_NAME)]
    pub name: String,

    /// URL prefix the API is mounted under (default: /api/v0.1)
    #[arg(long, env = "RESTAPI_BASE_URL")]
    pub base_url: Option<String>,

    /// Address to listen on, host[:port] (default: 0.0.0.0:5000)
    #[arg(long, env = "RESTAPI_PUBLIC_ADDR")]
    pub public_addr: Option<String>,

    /// Backend command endpoint (repeatable or comma-separated)
    #[arg(long = "backend", env = "RESTAPI_BACKEND", value_delimiter = ',')]
    pub backends: Vec<String>,

    /// Log level (critical, error, warning, info, debug, trace)
    #[arg(long, env = "RESTAPI_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Write logs to file (in addition to stderr)
    #[arg(long, env = "RESTAPI_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Backend call timeout in seconds (default: 30)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
