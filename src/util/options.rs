// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Analysis options.

use clap::error::ErrorKind;
use clap::{Arg, Command};

use crate::error::{Error, Result};

const PTA_USAGE: &str = r#"pta [OPTIONS] INPUT"#;

/// Creates the clap::Command metadata for argument parsing.
fn make_options_parser() -> Command<'static> {
    Command::new("pta")
        .no_binary_name(true)
        .override_usage(PTA_USAGE)
        .version(env!("CARGO_PKG_VERSION"))
        .arg(Arg::new("context-sensitivity")
            .long("cs")
            .takes_value(true)
            .default_value("ci")
            .help("The context sensitivity variant.")
            .long_help("One of 'ci', '<k>-call', '<k>-obj' and '<k>-type', e.g. '2-obj'."))
        .arg(Arg::new("only-app")
            .long("only-app")
            .takes_value(false)
            .help("Only analyze statements of application classes."))
        .arg(Arg::new("implicit-entries")
            .long("implicit-entries")
            .takes_value(false)
            .help("Also start the analysis from the implicit entries of the program."))
        .arg(Arg::new("merge-string-constants")
            .long("merge-string-constants")
            .takes_value(false)
            .help("Represent all string constants of a type by one object."))
        .arg(Arg::new("model-null-literals")
            .long("model-null-literals")
            .takes_value(false)
            .help("Let variables assigned `null` point to a shared null object."))
        .arg(Arg::new("model-number-literals")
            .long("model-number-literals")
            .takes_value(false)
            .help("Give boxed number literals one object per value."))
        .arg(Arg::new("model-exceptions")
            .long("model-exceptions")
            .takes_value(false)
            .help("Propagate thrown objects to handlers and callers."))
        .arg(Arg::new("native-arraycopy")
            .long("native-arraycopy")
            .takes_value(true)
            .help("Signature of the native array copy method to model, e.g. '<System: arraycopy(Object,int,Object,int,int)>'."))
        .arg(Arg::new("thread-class")
            .long("thread-class")
            .takes_value(true)
            .help("Name of the class whose start() runs run() asynchronously."))
        .arg(Arg::new("check-constraints")
            .long("check-constraints")
            .takes_value(false)
            .hide(true)
            .help("Check the order of solver events and warn on violations."))
        .arg(Arg::new("taint-config")
            .long("taint-config")
            .takes_value(true)
            .help("Enable taint analysis with the given JSON configuration file."))
        .arg(Arg::new("dump-stats")
            .long("dump-stats")
            .takes_value(false)
            .help("Dump the statistics of the analysis results."))
        .arg(Arg::new("call-graph-output")
            .long("dump-call-graph")
            .takes_value(true)
            .help("Dump the call graph in DOT format to the output file."))
        .arg(Arg::new("pts-output")
            .long("dump-pts")
            .takes_value(true)
            .help("Dump points-to results to the output file, or 'stdout'."))
        .arg(Arg::new("compare-pts")
            .long("compare-pts")
            .takes_value(true)
            .help("Compare points-to results with a previous dump and fail on mismatches."))
        .arg(Arg::new("INPUT")
            .help("The program to be analyzed, in JSON form."))
}

#[derive(Clone, Debug)]
pub struct AnalysisOptions {
    pub input: Option<String>,
    /// Description of the context selector.
    pub context_sensitivity: String,
    pub only_app: bool,
    pub implicit_entries: bool,
    pub merge_string_constants: bool,
    pub model_null_literals: bool,
    pub model_number_literals: bool,
    pub model_exceptions: bool,
    pub native_arraycopy: Option<String>,
    pub thread_class: Option<String>,
    pub check_constraints: bool,
    pub taint_config: Option<String>,

    pub dump_stats: bool,
    pub call_graph_output: Option<String>,
    pub pts_output: Option<String>,
    pub compare_pts: Option<String>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            input: None,
            context_sensitivity: "ci".to_string(),
            only_app: false,
            implicit_entries: false,
            merge_string_constants: false,
            model_null_literals: false,
            model_number_literals: false,
            model_exceptions: false,
            native_arraycopy: None,
            thread_class: None,
            check_constraints: false,
            taint_config: None,
            dump_stats: false,
            call_graph_output: None,
            pts_output: None,
            compare_pts: None,
        }
    }
}

impl AnalysisOptions {
    /// Parses options from a list of strings. Options given here override
    /// the ones already set, so flags from the environment are parsed first.
    pub fn parse_from_args(&mut self, args: &[String]) -> Result<()> {
        let matches = match make_options_parser().try_get_matches_from(args.iter()) {
            Ok(matches) => matches,
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
                _ => return Err(Error::Config(e.to_string())),
            },
        };

        if let Some(input) = matches.get_one::<String>("INPUT") {
            self.input = Some(input.clone());
        }
        if matches.value_source("context-sensitivity") == Some(clap::ValueSource::CommandLine) {
            if let Some(cs) = matches.get_one::<String>("context-sensitivity") {
                self.context_sensitivity = cs.clone();
            }
        }

        self.only_app |= matches.contains_id("only-app");
        self.implicit_entries |= matches.contains_id("implicit-entries");
        self.merge_string_constants |= matches.contains_id("merge-string-constants");
        self.model_null_literals |= matches.contains_id("model-null-literals");
        self.model_number_literals |= matches.contains_id("model-number-literals");
        self.model_exceptions |= matches.contains_id("model-exceptions");
        self.check_constraints |= matches.contains_id("check-constraints");
        self.dump_stats |= matches.contains_id("dump-stats");

        let set = |target: &mut Option<String>, id: &str| {
            if let Some(value) = matches.get_one::<String>(id) {
                *target = Some(value.clone());
            }
        };
        set(&mut self.native_arraycopy, "native-arraycopy");
        set(&mut self.thread_class, "thread-class");
        set(&mut self.taint_config, "taint-config");
        set(&mut self.call_graph_output, "call-graph-output");
        set(&mut self.pts_output, "pts-output");
        set(&mut self.compare_pts, "compare-pts");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::AnalysisOptions;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn command_line_overrides_environment() {
        let mut options = AnalysisOptions::default();
        options
            .parse_from_args(&args(&["--cs", "2-obj", "--dump-pts", "env.txt", "--only-app"]))
            .unwrap();
        options
            .parse_from_args(&args(&["--dump-pts", "stdout", "program.json"]))
            .unwrap();
        assert_eq!(options.context_sensitivity, "2-obj");
        assert_eq!(options.pts_output.as_deref(), Some("stdout"));
        assert_eq!(options.input.as_deref(), Some("program.json"));
        assert!(options.only_app);
        assert!(!options.dump_stats);
    }

    #[test]
    fn unknown_flags_are_config_errors() {
        let mut options = AnalysisOptions::default();
        let err = options.parse_from_args(&args(&["--no-such-flag"])).unwrap_err();
        assert!(matches!(err, crate::error::Error::Config(_)));
    }
}
