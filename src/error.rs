// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Error types of the pointer analysis.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid analysis setup, reported before the solver starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The input program references something that does not exist.
    #[error("Malformed IR: {0}")]
    MalformedIr(String),

    /// A plugin hook failed. The whole run is aborted.
    #[error("Plugin failure in {hook}: {cause:#}")]
    Plugin {
        hook: &'static str,
        cause: anyhow::Error,
    },

    /// The dumped points-to results differ from the expected ones.
    #[error("{0} mismatched points-to results")]
    Compare(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
