mod cli;

use crate::cli::app::App;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    cli::init_tracing();
    App::parse().run()
}
