//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use rater_domain::CalculationMethod;
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Calculation method as named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    None,
    InProcess,
    Script,
    HeadlessOffice,
    NativeOffice,
}

impl From<MethodArg> for CalculationMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::None => CalculationMethod::None,
            MethodArg::InProcess => CalculationMethod::InProcess,
            MethodArg::Script => CalculationMethod::Script,
            MethodArg::HeadlessOffice => CalculationMethod::HeadlessOffice,
            MethodArg::NativeOffice => CalculationMethod::NativeOffice,
        }
    }
}

/// CLI arguments for ims-rater
#[derive(Parser, Debug)]
#[command(name = "ims-rater")]
#[command(author, version, about = "Rate insurance submissions against an IMS installation")]
#[command(long_about = r#"
ims-rater drives a submission through the IMS quoting workflow:
insured, quote, quote options, rater template, rating and premium.

The rater template of the line of business is filled with the submission
data, recalculated with the configured backend, and scanned for a premium
when the remote rating procedure does not report one.

Configuration files are loaded from (in priority order):
1. IMS_RATER_* environment variables (IMS_RATER_IMS__URL, ...)
2. --config <path>                   Explicit config file
3. ./ims-rater.toml                  Project-level config
4. ~/.config/ims-rater/config.toml   Global config

Example:
  ims-rater process 3f2b8c1e-8d0c-4d8e-9a51-0c7f1b2d9e44
  ims-rater populate --template gl.xlsx --applicant jane.json --out filled.xlsx
  ims-rater calculate --method in-process --input filled.xlsx --out calculated.xlsx
  ims-rater premium --template calculated.xlsx --mapping Summary!B6:1
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Also write diagnostics to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Process a stored submission through the remote workflow
    Process {
        /// Submission id (UUID of a file under <store>/submissions)
        submission_id: String,
    },

    /// Fill a rater template with applicant data
    Populate {
        /// Rater template (.xlsx)
        #[arg(long, value_name = "PATH")]
        template: PathBuf,

        /// Submission form as JSON ({"applicant": {...}, "custom": {...}})
        #[arg(long, value_name = "PATH")]
        applicant: PathBuf,

        /// Where to write the populated workbook
        #[arg(long, value_name = "PATH")]
        out: PathBuf,

        /// Target sheet (defaults to [rater].sheet)
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Recalculate a workbook with one calculation backend
    Calculate {
        #[arg(long, value_enum)]
        method: MethodArg,

        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        #[arg(long, value_name = "PATH")]
        out: PathBuf,
    },

    /// Read the premium out of a calculated workbook
    Premium {
        #[arg(long, value_name = "PATH")]
        template: PathBuf,

        /// Premium cell as SHEET!CELL[:PRIORITY] (repeatable)
        #[arg(long = "mapping", value_name = "SHEET!CELL[:PRIORITY]", required = true)]
        mappings: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from(["ims-rater", "-vv", "process", "abc"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.command,
            Some(Command::Process {
                submission_id: "abc".into()
            })
        );
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_parse_calculate_method() {
        let cli = Cli::try_parse_from([
            "ims-rater",
            "calculate",
            "--method",
            "headless-office",
            "--input",
            "a.xlsx",
            "--out",
            "b.xlsx",
            "--output",
            "json",
        ])
        .unwrap();
        let Some(Command::Calculate { method, .. }) = cli.command else {
            panic!("expected calculate");
        };
        assert_eq!(CalculationMethod::from(method), CalculationMethod::HeadlessOffice);
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_premium_requires_mapping() {
        assert!(Cli::try_parse_from(["ims-rater", "premium", "--template", "a.xlsx"]).is_err());
        let cli = Cli::try_parse_from([
            "ims-rater", "premium", "--template", "a.xlsx", "--mapping", "Summary!B6:1",
            "--mapping", "Rating!C3",
        ])
        .unwrap();
        let Some(Command::Premium { mappings, .. }) = cli.command else {
            panic!("expected premium");
        };
        assert_eq!(mappings, vec!["Summary!B6:1", "Rating!C3"]);
    }
}
