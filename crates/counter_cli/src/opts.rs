use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Parser, Debug)]
#[command(name = "counter_cli")]
#[command(bin_name = "counter_cli")]
#[command(version, about, long_about = None)]
pub(crate) struct Opts {
    /// Initial count
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub(crate) start: f64,

    /// Derived field options, a JSON file e.g. '{ "keys": ["count"], "equality": "deep" }'
    #[arg(long, value_name = "CONFIG_FILE")]
    pub(crate) config: Option<PathBuf>,

    /// Trace log file
    #[arg(long, num_args = 0..=1, default_missing_value = "trace.log")]
    pub(crate) trace: Option<PathBuf>,

    #[command(flatten)]
    pub(crate) verbose: Verbosity<InfoLevel>,

    /// Actions to apply, in order
    #[arg(value_enum, required = true, value_name = "ACTION")]
    pub(crate) actions: Vec<Action>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    /// count + 1
    Inc,
    /// count - 1
    Dec,
    /// count = countSq
    Square,
    /// count = floor(sqrt(count))
    Root,
}
