use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "meetnote")]
#[command(about = "Meeting assistant service", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// Print the resolved configuration
    Config,
}
