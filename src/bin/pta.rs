// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The main routine of `pta`.
//!
//! Loads a program in JSON form, runs the pointer analysis over it and
//! writes the requested results.

use std::env;

use anyhow::Context;
use log::*;

use cspta::pta::run_pointer_analysis;
use cspta::util::options::AnalysisOptions;

fn main() -> anyhow::Result<()> {
    // Initialize loggers.
    if env::var("PTA_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PTA_LOG")
            .write_style("PTA_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    // Get any options specified via the PTA_FLAGS environment variable
    let mut options = AnalysisOptions::default();
    if let Ok(pta_flags) = env::var("PTA_FLAGS") {
        let pta_args: Vec<String> =
            serde_json::from_str(&pta_flags).context("PTA_FLAGS must be a JSON array of strings")?;
        options.parse_from_args(&pta_args)?;
    }

    // Let arguments supplied on the command line override the environment variable.
    let args: Vec<String> = env::args().skip(1).collect();
    options.parse_from_args(&args)?;
    info!("PTA Options: {:?}", options);

    run_pointer_analysis(&options)?;
    Ok(())
}
