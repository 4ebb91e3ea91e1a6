#![doc(html_root_url = "https://docs.rs/mpegremux/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # mpegremux - MPEG output stage for live transcoding
//!
//! `mpegremux` repackages the raw output of a transcoding process into the
//! containers that hardware media players expect when streaming over HTTP.
//! It is the last step between an encoder pipe and a client socket.
//!
//! ## Features
//!
//! - MPEG-2 program stream remultiplexing with timestamp ordered
//!   interleaving, regular pack headers and clock rebasing
//! - Recovery from garbage input, clock discontinuities and lagging streams
//! - BDAV M2TS repacketization of transport streams
//! - A uniform pull-based byte source interface for all outputs, with an
//!   async adapter for tokio based servers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mpegremux::format::{FilterStream, Mux};
//! use std::process::{Command, Stdio};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mux: Mux = "m2ts".parse()?;
//!
//!     // The encoder is asked for plain TS; the filter adds the M2TS framing.
//!     let encoder = Command::new("encoder")
//!         .args(["--mux", mux.encoder_mux()])
//!         .stdout(Stdio::piped())
//!         .spawn()?;
//!     let output = encoder.stdout.ok_or("encoder has no stdout")?;
//!
//!     let stream = FilterStream::spawn(mux.open(output), 16);
//!     let mut socket = tokio::io::stdout();
//!     stream.copy_to(&mut socket).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `format`: the output containers
//!   - `ps`: program stream packet model, reader and remultiplexer
//!   - `m2ts`: transport stream to M2TS repacketizer
//!   - `stream`: byte source trait, passthrough and tokio adapter
//!   - `mux`: selection of the filter for a container name
//!
//! - `config`: scheduler tunables from the environment or a config file
//!
//! - `error`: error type and result alias
//!
//! - `utils`: bitstream reading/writing
//!

/// Configuration module
pub mod config;

/// Error types and utilities
pub mod error;

/// Output container implementations (PS, M2TS, TS passthrough)
pub mod format;

/// Common utilities and helper functions
pub mod utils;

pub use error::{RemuxError, Result};
