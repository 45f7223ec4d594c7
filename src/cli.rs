use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

/// klances - A terminal dashboard for monitoring Kubernetes clusters
#[derive(Parser, Debug)]
#[command(name = "klances")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Kubernetes context name (defaults to the current context)
    #[arg(long, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Namespace to select at startup, may be repeated (default: all)
    #[arg(short = 'n', long = "namespace", value_name = "NAMESPACE")]
    pub namespaces: Vec<String>,

    /// Poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Log lines kept per pod
    #[arg(long, value_name = "LINES")]
    pub log_capacity: Option<usize>,

    /// Configuration file (default: ~/.klances/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Run against a built-in fake cluster, no kubeconfig needed
    #[arg(long)]
    pub demo: bool,
}

impl Args {
    /// Override configuration values given on the command line
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(poll_interval) = self.poll_interval {
            config.poll_interval_ms = poll_interval;
        }
        if let Some(log_capacity) = self.log_capacity {
            config.log_capacity = log_capacity;
        }
        if !self.namespaces.is_empty() {
            config.namespaces = self.namespaces.clone();
        }
    }
}
