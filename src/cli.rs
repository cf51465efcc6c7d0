use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rc-drive",
    about = "RC vehicle controller over serial (interactive drive + scripted sequences)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Cmd {
    /// List available serial ports
    Ports,
    /// Send a single drive command
    Send(SendOpts),
    /// Drive interactively from stdin
    Drive(DriveOpts),
    /// Replay the programmed sequence from sequence.txt
    Run(RunOpts),
}

#[derive(Args, Debug, Clone)]
pub struct PortOpts {
    /// Serial port name; persisted to port.txt for next time
    /// (default: the name stored in port.txt)
    #[arg(long)]
    pub port: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SendOpts {
    #[command(flatten)]
    pub link: PortOpts,
    /// Direction mnemonic: FF, FR, FL, BB, BL, BR, LL, RR, SS
    #[arg(long)]
    pub dir: String,
    /// Speed 0-255
    #[arg(long, default_value_t = 255)]
    pub speed: u8,
}

#[derive(Args, Debug, Clone)]
pub struct DriveOpts {
    #[command(flatten)]
    pub link: PortOpts,
}

#[derive(Args, Debug, Clone)]
pub struct RunOpts {
    #[command(flatten)]
    pub link: PortOpts,
    /// Reject unknown direction mnemonics instead of treating them as stop
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}
