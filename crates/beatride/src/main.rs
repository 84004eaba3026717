mod cli;
mod prefs;
mod run;
mod shared;
mod states;
mod synth;
mod track;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::run(args)
}
