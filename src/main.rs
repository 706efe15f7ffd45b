mod actions;
mod cli;
mod config;
mod deck;
mod gestures;
mod ipc;
mod landmarks;
mod layout;
mod lock;
mod logging;
mod machine;
mod replay;
mod session;
mod shake;
mod tracker;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
