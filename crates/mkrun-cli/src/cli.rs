use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for mkrun
#[derive(Parser, Debug)]
#[command(name = "mkrun")]
#[command(about = "Find, inspect and run Makefile and justfile targets", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Configuration file, defaults to `<project>/.mkrun/config.toml`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "List the targets of every target file in the project")]
    List {
        #[arg(long, help = "Only scan files of this runner (make, just)")]
        runner: Option<String>,

        #[arg(long, help = "File to list first, relative to the project")]
        active: Option<PathBuf>,
    },

    #[command(about = "Show the targets of one file with their lines")]
    Targets {
        #[arg(help = "Target file, relative to the project")]
        file: PathBuf,
    },

    #[command(about = "Run a target of a file, by name or by header line")]
    Run {
        #[arg(help = "Target file, relative to the project")]
        file: PathBuf,

        #[arg(help = "Target name", required_unless_present = "line")]
        name: Option<String>,

        #[arg(long, conflicts_with = "name", help = "1-based line of the target header")]
        line: Option<usize>,

        #[arg(long, help = "Use the dry-run command")]
        dry_run: bool,

        #[arg(long, help = "Print the command instead of running it")]
        print: bool,
    },

    #[command(about = "List or run the targets reached through an include line")]
    Included {
        #[arg(help = "Target file, relative to the project")]
        file: PathBuf,

        #[arg(long, help = "1-based line of the include directive")]
        line: usize,

        #[arg(long, help = "Target to run; without it the reachable targets are listed")]
        name: Option<String>,

        #[arg(long, help = "Use the dry-run command")]
        dry_run: bool,

        #[arg(long, help = "Print the command instead of running it")]
        print: bool,
    },

    #[command(about = "Run the last executed target again")]
    Rerun {
        #[arg(long, help = "Print the command instead of running it")]
        print: bool,
    },

    #[command(about = "Show the lines inline runners are anchored to")]
    Lenses {
        #[arg(help = "Target file, relative to the project")]
        file: PathBuf,
    },

    #[command(about = "Show the effective configuration")]
    Config {
        #[arg(long, help = "Write the default configuration file")]
        init: bool,
    },
}
