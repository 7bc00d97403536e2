//! Copy files and directory trees into and out of guest instances.
//!
//! ```no_run
//! # async fn demo() -> Result<(), guestcp_client::CopyError> {
//! use guestcp_client::{CpConfig, CpToInstanceOptions, WsConnector, copy_to_instance};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = CpConfig::new("https://api.example.com", "token");
//! let opts = CpToInstanceOptions::new("inst_123", "./local-file.txt", "/app/file.txt");
//! copy_to_instance(&WsConnector::new(), &config, &opts, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
mod receive;
mod send;
mod session;
pub mod transport;

#[cfg(test)]
mod loopback;

pub use config::{CpConfig, build_ws_url};
pub use error::CopyError;
pub use guestcp_transfer::CopyCallbacks;
pub use receive::{CpFromInstanceOptions, copy_from_instance};
pub use send::{CpToInstanceOptions, copy_to_instance};
pub use transport::{Channel, Connector, ScriptedConnector, WsConnector};
