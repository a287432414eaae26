#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Standalone forestcast API server.
//!
//! Reads its inputs from the environment: `FORESTCAST_EXPORTS` serves a
//! previously exported directory, otherwise the pipeline runs using
//! `FORESTCAST_CONFIG` or the embedded layout over `FORESTCAST_DATA_DIR`
//! (default: the layout's `[data] dir`). `FORESTCAST_STATIC_DIR`
//! optionally serves a frontend.

use std::path::PathBuf;

use forestcast_pipeline::progress::null_progress;
use forestcast_server::{ResultSource, ServerOptions};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let source = ResultSource::from_vars(|name| std::env::var_os(name))
        .map_err(std::io::Error::other)?;

    let options = ServerOptions {
        source,
        static_dir: std::env::var_os("FORESTCAST_STATIC_DIR").map(PathBuf::from),
    };

    forestcast_server::run_server(options, null_progress()).await
}
