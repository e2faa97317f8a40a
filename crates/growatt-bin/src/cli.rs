// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: poll continuously until interrupted (default)
//! - `poll`: run a fixed number of cycles and print the snapshot
//! - `validate`: check configuration and mapping
//! - `write-register`, `write-registers`, `write-u32`, `write-coil`: one write
//! - `set`: drive a configured control
//! - `log-mapping`: log the normalized mapping
//! - `version`: show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use growatt_modbus::WordOrder;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Growatt inverter Modbus gateway.
///
/// Polls inverter registers over Modbus TCP or RTU-over-TCP and writes
/// settings through a cache-coherent coordinator.
#[derive(Parser, Debug)]
#[command(
    name = "growatt",
    author = "Sylvex <contact@sylvex.io>",
    version,
    about = "Modbus polling and control for Growatt inverters",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "growatt.yaml",
        env = "GROWATT_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "GROWATT_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Poll the inverter until interrupted
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Run a fixed number of poll cycles and print the snapshot
    Poll(PollArgs),

    /// Validate the configuration and register mapping
    Validate(ValidateArgs),

    /// Write one holding register
    #[command(name = "write-register")]
    WriteRegister(WriteRegisterArgs),

    /// Write consecutive holding registers
    #[command(name = "write-registers")]
    WriteRegisters(WriteRegistersArgs),

    /// Write a 32-bit value across two holding registers
    #[command(name = "write-u32")]
    WriteU32(WriteU32Args),

    /// Write one coil
    #[command(name = "write-coil")]
    WriteCoil(WriteCoilArgs),

    /// Drive a configured control (switch on/off, select label, number)
    Set(SetArgs),

    /// Log the mapping source and the normalized sensors and controls
    #[command(name = "log-mapping")]
    LogMapping,

    /// Show version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Override the configured scan interval (e.g. 30s)
    #[arg(long, value_parser = humantime_duration)]
    pub scan_interval: Option<std::time::Duration>,
}

/// Arguments for the `poll` command.
#[derive(Args, Debug, Clone)]
pub struct PollArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Number of cycles to run
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub cycles: u32,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `write-register` command.
#[derive(Args, Debug, Clone)]
pub struct WriteRegisterArgs {
    /// Register address
    pub address: u16,

    /// Raw register value
    pub value: u16,
}

/// Arguments for the `write-registers` command.
#[derive(Args, Debug, Clone)]
pub struct WriteRegistersArgs {
    /// First register address
    pub address: u16,

    /// Raw register values
    #[arg(required = true, num_args = 1..)]
    pub values: Vec<u16>,
}

/// Arguments for the `write-u32` command.
#[derive(Args, Debug, Clone)]
#[command(allow_negative_numbers = true)]
pub struct WriteU32Args {
    /// Base register address
    pub address: u16,

    /// Value, reduced modulo 2^32
    pub value: i64,

    /// Word order (high_low, low_high)
    #[arg(long, default_value = "high_low")]
    pub word_order: WordOrder,
}

/// Arguments for the `write-coil` command.
#[derive(Args, Debug, Clone)]
pub struct WriteCoilArgs {
    /// Coil address
    pub address: u16,

    /// Coil state
    pub state: CoilState,
}

/// Arguments for the `set` command.
#[derive(Args, Debug, Clone)]
#[command(allow_negative_numbers = true)]
pub struct SetArgs {
    /// Control unique id
    pub control: String,

    /// Value: on/off, option label, or number
    pub value: String,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
    /// YAML format
    Yaml,
}

/// Coil state argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CoilState {
    /// Coil on
    On,
    /// Coil off
    Off,
}

impl CoilState {
    /// Returns the coil value.
    pub fn is_on(&self) -> bool {
        matches!(self, CoilState::On)
    }
}

fn humantime_duration(value: &str) -> Result<std::time::Duration, humantime::DurationError> {
    humantime::parse_duration(value)
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

impl Default for ValidateArgs {
    fn default() -> Self {
        Self {
            show_config: false,
            format: OutputFormat::Text,
            strict: false,
        }
    }
}

impl Default for PollArgs {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            cycles: 1,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let cli = Cli::parse_from(["growatt"]);
        assert!(cli.command.is_none());
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["growatt", "-c", "/etc/growatt/growatt.yaml", "validate"]);
        assert_eq!(cli.config, PathBuf::from("/etc/growatt/growatt.yaml"));
    }

    #[test]
    fn test_quiet_and_verbose() {
        let cli = Cli::parse_from(["growatt", "-q"]);
        assert_eq!(cli.effective_log_level(), "warn");

        let cli = Cli::parse_from(["growatt", "-v"]);
        assert_eq!(cli.effective_log_level(), "debug");

        let cli = Cli::parse_from(["growatt", "-l", "trace"]);
        assert_eq!(cli.effective_log_level(), "trace");
    }

    #[test]
    fn test_poll_command() {
        let cli = Cli::parse_from(["growatt", "poll", "--format", "json", "--cycles", "3"]);
        match cli.command {
            Some(Commands::Poll(args)) => {
                assert_eq!(args.format, OutputFormat::Json);
                assert_eq!(args.cycles, 3);
            }
            other => panic!("Expected Poll command, got {other:?}"),
        }
        assert!(Cli::try_parse_from(["growatt", "poll", "--cycles", "0"]).is_err());
    }

    #[test]
    fn test_write_commands() {
        let cli = Cli::parse_from(["growatt", "write-registers", "1100", "1", "2"]);
        match cli.command {
            Some(Commands::WriteRegisters(args)) => {
                assert_eq!(args.address, 1100);
                assert_eq!(args.values, vec![1, 2]);
            }
            other => panic!("Expected WriteRegisters, got {other:?}"),
        }

        let cli = Cli::parse_from(["growatt", "write-u32", "30", "-1", "--word-order", "low_high"]);
        match cli.command {
            Some(Commands::WriteU32(args)) => {
                assert_eq!(args.value, -1);
                assert_eq!(args.word_order, WordOrder::LowHigh);
            }
            other => panic!("Expected WriteU32, got {other:?}"),
        }

        let cli = Cli::parse_from(["growatt", "write-coil", "5", "on"]);
        match cli.command {
            Some(Commands::WriteCoil(args)) => assert!(args.state.is_on()),
            other => panic!("Expected WriteCoil, got {other:?}"),
        }

        assert!(Cli::try_parse_from(["growatt", "write-register", "1", "70000"]).is_err());
        assert!(Cli::try_parse_from(["growatt", "write-registers", "1"]).is_err());
    }

    #[test]
    fn test_set_command() {
        let cli = Cli::parse_from(["growatt", "set", "priority_mode", "Battery First"]);
        match cli.command {
            Some(Commands::Set(args)) => {
                assert_eq!(args.control, "priority_mode");
                assert_eq!(args.value, "Battery First");
            }
            other => panic!("Expected Set, got {other:?}"),
        }
    }

    #[test]
    fn test_run_scan_interval() {
        let cli = Cli::parse_from(["growatt", "run", "--scan-interval", "30s"]);
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.scan_interval, Some(std::time::Duration::from_secs(30)));
            }
            other => panic!("Expected Run, got {other:?}"),
        }
    }
}
