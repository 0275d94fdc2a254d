use clap::{Parser, Subcommand};
use srpc_config::LogLevel;

/// SRPC: shows what is playing in the browser as chat-client presence.
#[derive(Parser, Debug)]
#[command(name = "srpc", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level override (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the relay and presence bridge (default).
    Start,

    /// Set and persist the log level.
    LogLevel {
        /// One of: error, warn, info, debug, trace.
        level: LogLevel,
    },

    /// Enable or disable starting with the system.
    AutoStart {
        /// true or false.
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
