//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use guestcp_client::config::{ENV_API_KEY, ENV_BASE_URL};

#[derive(Debug, Parser)]
#[command(name = "guestcp", version, about = "Copy files to and from guest instances")]
pub struct Cli {
    /// Config file [default: ~/.config/guestcp/config.toml]
    #[arg(long, global = true, env = "GUESTCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// API base URL
    #[arg(long, global = true, env = ENV_BASE_URL)]
    pub base_url: Option<String>,

    /// API bearer token
    #[arg(long, global = true, env = ENV_API_KEY, hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Copy between the local filesystem and an instance.
    ///
    /// Exactly one of SRC and DST is written INSTANCE:PATH.
    Cp(CpArgs),
}

#[derive(Debug, Args)]
pub struct CpArgs {
    /// Preserve uid/gid ownership
    #[arg(short, long)]
    pub archive: bool,

    /// Follow symbolic links in SRC
    #[arg(short = 'L', long)]
    pub follow_links: bool,

    /// Permission bits for the copied entry, in octal (copy-to only)
    #[arg(long, value_parser = parse_octal)]
    pub mode: Option<u32>,

    /// Payload frame size in bytes
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Suppress the progress display
    #[arg(short, long)]
    pub quiet: bool,

    pub src: String,
    pub dst: String,
}

/// One side of a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Guest { instance: String, path: String },
}

impl Location {
    /// Parses `INSTANCE:PATH` as a guest location, anything else as local.
    ///
    /// A prefix holding a path separator, or a drive letter on Windows,
    /// keeps the argument local.
    pub fn parse(arg: &str) -> Self {
        let Some((prefix, path)) = arg.split_once(':') else {
            return Location::Local(PathBuf::from(arg));
        };
        let drive_letter =
            cfg!(windows) && prefix.len() == 1 && prefix.chars().all(|c| c.is_ascii_alphabetic());
        if prefix.is_empty() || prefix.contains(['/', '\\']) || drive_letter {
            return Location::Local(PathBuf::from(arg));
        }
        Location::Guest {
            instance: prefix.to_string(),
            path: path.to_string(),
        }
    }
}

/// Direction and endpoints of a parsed `cp` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyPlan {
    ToGuest {
        src: PathBuf,
        instance: String,
        dst: String,
    },
    FromGuest {
        instance: String,
        src: String,
        dst: PathBuf,
    },
}

impl CopyPlan {
    pub fn from_args(src: &str, dst: &str) -> anyhow::Result<Self> {
        match (Location::parse(src), Location::parse(dst)) {
            (Location::Local(src), Location::Guest { instance, path }) => Ok(CopyPlan::ToGuest {
                src,
                instance,
                dst: guest_path_or_root(path),
            }),
            (Location::Guest { instance, path }, Location::Local(dst)) => {
                Ok(CopyPlan::FromGuest {
                    instance,
                    src: guest_path_or_root(path),
                    dst,
                })
            }
            (Location::Guest { .. }, Location::Guest { .. }) => {
                anyhow::bail!("copying between two instances is not supported")
            }
            (Location::Local(_), Location::Local(_)) => {
                anyhow::bail!("one of SRC or DST must be INSTANCE:PATH")
            }
        }
    }
}

fn guest_path_or_root(path: String) -> String {
    if path.is_empty() { "/".into() } else { path }
}

fn parse_octal(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    let mode =
        u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode {s:?}: {e}"))?;
    if mode > 0o7777 {
        return Err(format!("mode {s} out of range"));
    }
    Ok(mode)
}
