//! Command-line interface for the scanner.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{ScanConfig, DEFAULT_CONFIG_FILE};
use crate::error::{Result, ScanError};
use crate::extract::open_source;
use crate::scan::{scan_manual, table_of_contents};
use crate::visit::Summary;
use crate::yaml::save_yaml;

/// regscan - Extract register and bit-field definitions from reference manuals.
#[derive(Parser)]
#[command(name = "regscan")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options selecting a configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Configuration to use when the file defines several
    #[arg(short = 'n', long)]
    pub configuration: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a manual and write its register map as YAML.
    Scan {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output directory (default: output_dir from the configuration)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Drop registers without bit-fields and peripherals left without registers
        #[arg(long)]
        prune_empty: bool,

        /// Print the resulting tree
        #[arg(long)]
        print_tree: bool,
    },

    /// Print the table of contents as found in the manual.
    Toc {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            config,
            output,
            prune_empty,
            print_tree,
        } => scan_command(&config, output.as_deref(), prune_empty, print_tree),
        Commands::Toc { config } => toc_command(&config),
    }
}

fn load_config(args: &ConfigArgs) -> Result<ScanConfig> {
    ScanConfig::load(&args.config, args.configuration.as_deref())
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Execute the scan command.
fn scan_command(
    args: &ConfigArgs,
    output: Option<&Path>,
    prune_empty: bool,
    print_tree: bool,
) -> Result<()> {
    let config = load_config(args)?;

    if let Some(output_dir) = output {
        if output_dir.exists() && !output_dir.is_dir() {
            return Err(ScanError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Output path is not a directory: {}", output_dir.display()),
            )));
        }
    }

    println!(
        "{} {}",
        style("Scanning").bold(),
        style(&config.name).cyan()
    );
    println!();

    let pb = spinner();
    pb.set_message("Opening manual...");

    let source = match open_source(&config) {
        Ok(source) => source,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    pb.set_message("Reading table of contents...");
    let report = scan_manual(&config, source.as_ref(), |register| {
        pb.set_message(format!("{} (p{})", register.name, register.page));
    });
    let mut report = match report {
        Ok(report) => report,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    if prune_empty {
        crate::scan::prune_empty(&mut report.tree);
    }

    pb.set_message("Saving YAML...");
    let output_dir = output.unwrap_or(config.output_dir.as_path());
    let output_path = match save_yaml(&report.tree, &report.exceptions, output_dir) {
        Ok(path) => path,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };
    pb.finish_and_clear();

    let summary = Summary::of(&report.tree);
    println!("  Peripherals: {}", summary.peripherals);
    println!("  Registers: {}", summary.registers);
    println!("  Bit-fields: {}", summary.bitfields);
    if !report.skipped.is_empty() {
        println!("  Skipped: {}", report.skipped.join(", "));
    }
    if !report.exceptions.is_empty() {
        println!(
            "  {} {}",
            style(format!("No bit-field table ({}):", report.exceptions.len()))
                .yellow()
                .bold(),
            report.exceptions.join(", ")
        );
    }

    if print_tree {
        println!();
        print!("{}", report.tree);
    }

    println!();
    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        output_path.display()
    );

    Ok(())
}

/// Execute the toc command.
fn toc_command(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args)?;
    let source = open_source(&config)?;
    let toc = table_of_contents(&config, source.as_ref())?;

    print!("{}", toc.tree());
    println!();
    println!(
        "{} {}",
        style("Registers:").bold(),
        toc.register_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_scan_defaults() {
        let cli = Cli::parse_from(["regscan", "scan"]);

        let Commands::Scan {
            config,
            output,
            prune_empty,
            print_tree,
        } = cli.command
        else {
            panic!("expected scan command");
        };
        assert_eq!(config.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(config.configuration.is_none());
        assert!(output.is_none());
        assert!(!prune_empty);
        assert!(!print_tree);
    }

    #[test]
    fn test_cli_parse_scan_with_options() {
        let cli = Cli::parse_from([
            "regscan",
            "scan",
            "--config",
            "manuals.yaml",
            "-n",
            "MSP430FR5969",
            "--output",
            "out",
            "--prune-empty",
        ]);

        let Commands::Scan {
            config,
            output,
            prune_empty,
            ..
        } = cli.command
        else {
            panic!("expected scan command");
        };
        assert_eq!(config.config, PathBuf::from("manuals.yaml"));
        assert_eq!(config.configuration.as_deref(), Some("MSP430FR5969"));
        assert_eq!(output, Some(PathBuf::from("out")));
        assert!(prune_empty);
    }

    #[test]
    fn test_cli_parse_toc() {
        let cli = Cli::parse_from(["regscan", "toc", "-c", "other.yaml"]);
        let Commands::Toc { config } = cli.command else {
            panic!("expected toc command");
        };
        assert_eq!(config.config, PathBuf::from("other.yaml"));
    }
}
