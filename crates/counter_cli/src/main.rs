use std::fs::read_to_string;

use anyhow::Context;
use clap::Parser;
use computed::{ComputedConfig, ComputedOptions};
use tracing::{debug, info};

use crate::counter::Counter;
use crate::opts::Opts;

mod counter;
mod logging;
mod opts;

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    logging::configure_tracing(opts.trace.clone(), opts.verbose.clone())?;

    let options = match &opts.config {
        Some(path) => {
            let content = read_to_string(path).with_context(|| format!("Unable to read config. path: {:?}", path))?;
            let config = ComputedConfig::from_json(&content)?;
            debug!("Loaded config. config: {:?}", config);
            ComputedOptions::from(config)
        }
        None => ComputedOptions::new(),
    };

    let counter = Counter::new(opts.start, options)?;
    print_state(&counter)?;

    for action in opts.actions {
        counter.apply(action)?;
        print_state(&counter)?;
    }

    info!("Done. derivations: {}", counter.derivations());
    println!("derivations: {}", counter.derivations());

    Ok(())
}

fn print_state(counter: &Counter) -> anyhow::Result<()> {
    let json = serde_json::to_string(&*counter.state())?;
    println!("{}", json);
    Ok(())
}
