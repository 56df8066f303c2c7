pub mod onboard;

use crate::report::ReportType;
use crate::report::window::Frequency;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "kb4-report",
    about = "KnowBe4 training & phishing status reports delivered as CSV over email"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// weekly-training (wt), training (t) or phishing (p)
    #[arg(long, short = 't')]
    pub kind: ReportType,
    /// week, month, quarter or year; required for training and phishing
    #[arg(long, short = 'f')]
    pub frequency: Option<Frequency>,
    /// Client name used in the report title; defaults to report.client
    #[arg(long, short = 'c')]
    pub client: Option<String>,
    /// Skip campaigns whose name carries the new hire marker
    #[arg(long, short = 'e', default_value_t = false)]
    pub exclude_new_hire: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Doctor,
    Send {
        #[command(flatten)]
        report: ReportArgs,
        #[arg(long, short = 'r')]
        to: String,
        #[arg(long, default_value_t = false)]
        keep_file: bool,
    },
    Export {
        #[command(flatten)]
        report: ReportArgs,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use crate::report::ReportType;
    use crate::report::window::Frequency;
    use clap::Parser;

    #[test]
    fn send_accepts_short_codes() {
        let cli = Cli::try_parse_from([
            "kb4-report", "send", "-t", "p", "-f", "quarter", "-c", "ACME", "-r", "it@example.com",
        ])
        .expect("parsed");

        let Commands::Send { report, to, keep_file } = cli.command else {
            panic!("expected send command");
        };
        assert_eq!(report.kind, ReportType::Phishing);
        assert_eq!(report.frequency, Some(Frequency::Quarter));
        assert_eq!(report.client.as_deref(), Some("ACME"));
        assert_eq!(to, "it@example.com");
        assert!(!keep_file);
    }

    #[test]
    fn unknown_frequency_fails_parsing() {
        let result = Cli::try_parse_from(["kb4-report", "export", "--kind", "t", "--frequency", "decade"]);
        assert!(result.is_err());
    }
}
