//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Relance rebuild-and-restart watcher CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Print version and exit
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Directory to watch (repeatable; defaults to the current directory)
    #[arg(short = 'd', long = "directory", value_name = "DIR", value_hint = clap::ValueHint::DirPath)]
    pub directories: Vec<PathBuf>,

    /// Directory prefix to exclude from watching (repeatable)
    #[arg(short = 'e', long = "exclude", value_name = "DIR", value_hint = clap::ValueHint::DirPath)]
    pub excludes: Vec<PathBuf>,

    /// File glob to match (repeatable; defaults to everything)
    #[arg(short = 'p', long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,

    /// File glob to ignore (repeatable)
    #[arg(short = 'i', long = "ignore", value_name = "GLOB")]
    pub ignores: Vec<String>,

    /// Build command to execute when relevant files change
    #[arg(short = 'b', long = "build", value_name = "CMD", required = true)]
    pub build: String,

    /// Server command to run after a successful build
    #[arg(short = 's', long = "server", value_name = "CMD")]
    pub server: Option<String>,

    /// Address (host:port) serving the last failed build's output
    #[arg(short = 'w', long = "error-server", value_name = "ADDR")]
    pub error_server: Option<String>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

impl Cli {
    /// Directories to watch, defaulting to the current directory.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        if self.directories.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.directories.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["relance", "-b", "make"]);
        assert_eq!(cli.build, "make");
        assert_eq!(cli.watch_roots(), vec![PathBuf::from(".")]);
        assert!(cli.patterns.is_empty());
        assert!(cli.ignores.is_empty());
        assert!(cli.server.is_none());
        assert!(cli.error_server.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_repeatable_flags() {
        let cli = Cli::parse_from([
            "relance", "-b", "make", "-d", "src", "-d", "vendor", "-e", "vendor/gen", "-p", "*.go",
            "-i", "*_test.go",
        ]);
        assert_eq!(cli.directories.len(), 2);
        assert_eq!(cli.excludes, vec![PathBuf::from("vendor/gen")]);
        assert_eq!(cli.patterns, vec!["*.go"]);
        assert_eq!(cli.ignores, vec!["*_test.go"]);
    }

    #[test]
    fn test_build_is_required() {
        assert!(Cli::try_parse_from(["relance"]).is_err());
    }

    #[test]
    fn test_positional_arguments_rejected() {
        assert!(Cli::try_parse_from(["relance", "-b", "make", "stray"]).is_err());
    }
}
