use anyhow::Result;
use clap::Parser;

mod cli;
mod controller;
mod drive;
mod event;
mod play;
mod port;
mod proto;
mod send;
mod sequence;
mod settings;
mod state;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    match args.cmd {
        cli::Cmd::Ports => {
            for name in port::list_endpoints()? {
                println!("{}", name);
            }
            Ok(())
        }
        cli::Cmd::Send(opts) => send::run(opts),
        cli::Cmd::Drive(opts) => drive::run(opts),
        cli::Cmd::Run(opts) => play::run(opts),
    }
}
