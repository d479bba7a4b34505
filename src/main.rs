mod actions;
mod cli;
mod config;
mod host;
mod input;
mod layout;
mod logging;
mod sim;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
