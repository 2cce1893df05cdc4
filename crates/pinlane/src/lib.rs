//! Client for an IPFS pinning service.
//!
//! Pins files and JSON documents through the pinning API, on top of the
//! request orchestration in [`pinlane_net`].
//!
//! # Example
//!
//! ```ignore
//! use pinlane::{PinataConfig, PinningClient};
//! use pinlane_net::http::FileData;
//!
//! let config = PinataConfig::from_file("pinata.toml")?.with_env_overrides();
//! let client = PinningClient::connect(config)?;
//!
//! client.pin_file_to_ipfs(
//!     FileData::new(std::fs::read("art.png")?, "art.png", "image/png"),
//!     r#"{"name":"art"}"#,
//!     r#"{"cidVersion":1}"#,
//!     |pin| println!("{} ({} bytes)", pin.ipfs_hash, pin.pin_size),
//!     |error| eprintln!("{error}"),
//! );
//! ```

pub mod config;
mod error;
pub mod pinata;

pub use config::PinataConfig;
pub use error::{ConfigError, Error, Result};
pub use pinata::{PinataResponse, PinningClient};
