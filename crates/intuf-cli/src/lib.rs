//! # intuf-cli — Command-Line Client
//!
//! Provides the `intuf` binary.
//!
//! ## Subcommands
//!
//! - `intuf download` — fetch a target and its attachments, verify with
//!   in-toto, install on success.
//! - `intuf upload` — publish an artifact with its layout, key and links.
//! - `intuf upload-layout` — publish a layout with its keys.
//! - `intuf delete` — retract targets from the index.
//!
//! ```bash
//! intuf -vv download app-1.0.whl --dest ./dist
//! INTUF_WRITE_TOKEN=... intuf upload app-1.0.whl root.layout alice.pub build.link
//! INTUF_DELETE_TOKEN=... intuf delete app-1.0.whl
//! ```

pub mod delete;
pub mod download;
pub mod upload;

/// Log filter for a `-v` count.
pub fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    }
}
