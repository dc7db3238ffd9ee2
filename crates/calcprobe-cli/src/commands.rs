//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// calcprobe: end-to-end checks for the search engine calculator widget
#[derive(Parser, Debug)]
#[command(name = "calcprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (failures only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run calculator scenarios
    Run(RunArgs),

    /// List scenarios without running them
    List(ListArgs),

    /// Print the effective configuration as YAML
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Only run scenarios whose name contains this text
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Page driver
    #[arg(long, value_enum, default_value = "chromium")]
    pub driver: DriverArg,

    /// YAML configuration file
    #[arg(short, long, env = "CALCPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Disable the chromium sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Search engine start page
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory for diagnostic screenshots
    #[arg(short, long)]
    pub reports_dir: Option<PathBuf>,

    /// Hold duration for long presses in milliseconds
    #[arg(long)]
    pub long_press_ms: Option<u64>,

    /// CAPTCHA handling
    #[arg(long, value_enum)]
    pub captcha: Option<CaptchaArg>,

    /// Stop after the first failing scenario
    #[arg(long)]
    pub fail_fast: bool,

    /// Result format
    #[arg(long, value_enum, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only list scenarios whose name contains this text
    #[arg(short, long)]
    pub filter: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// YAML configuration file to merge over the defaults
    #[arg(short, long, env = "CALCPROBE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Page driver selection
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriverArg {
    /// Real chromium over CDP
    #[default]
    Chromium,
    /// In-process simulated search page
    Sim,
}

/// CAPTCHA policy argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptchaArg {
    /// Skip under CI, prompt otherwise
    Auto,
    /// Always skip
    Skip,
    /// Always wait for a human
    Prompt,
}

impl From<CaptchaArg> for calcprobe::CaptchaPolicy {
    fn from(arg: CaptchaArg) -> Self {
        match arg {
            CaptchaArg::Auto => Self::Auto,
            CaptchaArg::Skip => Self::Skip,
            CaptchaArg::Prompt => Self::Prompt,
        }
    }
}

/// Result format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON on stdout
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_run_command() {
            let cli = Cli::parse_from(["calcprobe", "run"]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.driver, DriverArg::Chromium);
                assert_eq!(args.format, FormatArg::Text);
                assert!(!args.headless);
                assert!(args.captcha.is_none());
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_run_with_filter() {
            let cli = Cli::parse_from(["calcprobe", "run", "--filter", "arithmetic"]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.filter, Some("arithmetic".to_string()));
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_run_overrides() {
            let cli = Cli::parse_from([
                "calcprobe",
                "run",
                "--driver",
                "sim",
                "--headless",
                "--no-sandbox",
                "--long-press-ms",
                "1500",
                "--captcha",
                "skip",
                "--reports-dir",
                "out",
                "--fail-fast",
                "--format",
                "json",
            ]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.driver, DriverArg::Sim);
                assert!(args.headless);
                assert!(args.no_sandbox);
                assert_eq!(args.long_press_ms, Some(1500));
                assert_eq!(args.captcha, Some(CaptchaArg::Skip));
                assert_eq!(args.reports_dir, Some(PathBuf::from("out")));
                assert!(args.fail_fast);
                assert_eq!(args.format, FormatArg::Json);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_list_command() {
            let cli = Cli::parse_from(["calcprobe", "list", "-f", "clear"]);
            if let Commands::List(args) = cli.command {
                assert_eq!(args.filter.as_deref(), Some("clear"));
            } else {
                panic!("expected List command");
            }
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let cli = Cli::parse_from(["calcprobe", "list", "-vv", "--color", "never"]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.color, ColorArg::Never));
        }

        #[test]
        fn test_unknown_driver_rejected() {
            assert!(Cli::try_parse_from(["calcprobe", "run", "--driver", "firefox"]).is_err());
        }
    }

    mod conversion_tests {
        use super::*;

        #[test]
        fn test_color_arg_conversion() {
            use crate::config::ColorChoice;

            let auto: ColorChoice = ColorArg::Auto.into();
            assert!(matches!(auto, ColorChoice::Auto));

            let never: ColorChoice = ColorArg::Never.into();
            assert!(matches!(never, ColorChoice::Never));
        }

        #[test]
        fn test_captcha_arg_conversion() {
            use calcprobe::CaptchaPolicy;

            assert_eq!(CaptchaPolicy::from(CaptchaArg::Auto), CaptchaPolicy::Auto);
            assert_eq!(CaptchaPolicy::from(CaptchaArg::Skip), CaptchaPolicy::Skip);
            assert_eq!(CaptchaPolicy::from(CaptchaArg::Prompt), CaptchaPolicy::Prompt);
        }
    }
}
