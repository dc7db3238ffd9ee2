//! calcprobe: run the calculator widget checks from a terminal
//!
//! ## Usage
//!
//! ```bash
//! calcprobe run                          # All scenarios in chromium
//! calcprobe run --headless -f arithmetic # Arithmetic only, no window
//! calcprobe run --driver sim             # Simulated page, no browser needed
//! calcprobe list                         # Scenario names
//! calcprobe config -c probe.yaml         # Effective configuration
//! ```

use calcprobe::{
    all_scenarios, filter_scenarios, BrowserHost, Harness, ProbeConfig, Scenario, SimOptions,
    SimulatedHost,
};
use calcprobe_cli::{
    Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, ConfigArgs, DriverArg, ListArgs,
    OutputFormat, RunArgs, TestResults, TestRunner, Verbosity,
};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match cli.command {
        Commands::Run(args) => run_scenarios(config.with_fail_fast(args.fail_fast), &args),
        Commands::List(args) => {
            list_scenarios(&args);
            Ok(())
        }
        Commands::Config(args) => show_config(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

/// `RUST_LOG` wins over the -v/-q level
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity.is_debug())
        .try_init();
}

/// Defaults, then the YAML file, then flags
fn probe_config(args: &RunArgs) -> CliResult<ProbeConfig> {
    let mut probe = match args.config {
        Some(ref path) => ProbeConfig::load(path)?,
        None => ProbeConfig::new(),
    };

    if args.headless {
        probe = probe.with_headless(true);
    }
    if args.no_sandbox {
        probe.browser.sandbox = false;
    }
    if let Some(ref url) = args.base_url {
        probe.base_url.clone_from(url);
    }
    if let Some(ref dir) = args.reports_dir {
        probe = probe.with_reports_dir(dir);
    }
    if let Some(ms) = args.long_press_ms {
        probe = probe.with_long_press_ms(ms);
    }
    if let Some(captcha) = args.captcha {
        probe.captcha = captcha.into();
    }

    probe
        .validate()
        .map_err(|e| CliError::config(e.to_string()))?;
    Ok(probe)
}

fn run_scenarios(config: CliConfig, args: &RunArgs) -> CliResult<()> {
    let probe = probe_config(args)?;
    let scenarios = filter_scenarios(all_scenarios(), args.filter.as_deref());
    let format: OutputFormat = args.format.into();
    let mut runner = TestRunner::new(config);

    if scenarios.is_empty() {
        runner
            .reporter()
            .warning("No scenarios match the filter");
        return Ok(());
    }

    tracing::info!(
        driver = ?args.driver,
        scenarios = scenarios.len(),
        base_url = %probe.base_url,
        "starting run"
    );

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::test_execution(format!("Failed to create runtime: {e}")))?;

    let results = rt.block_on(async {
        match args.driver {
            DriverArg::Sim => {
                let host = SimulatedHost::new(SimOptions::live_like());
                execute(host, probe, &scenarios, &mut runner).await
            }
            DriverArg::Chromium => run_chromium(probe, &scenarios, &mut runner).await,
        }
    })?;

    if format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&results)
            .map_err(|e| CliError::test_execution(format!("Failed to encode results: {e}")))?;
        println!("{json}");
    }

    if results.all_passed() {
        Ok(())
    } else {
        Err(CliError::test_execution(format!(
            "{} of {} scenarios failed",
            results.failed(),
            results.total()
        )))
    }
}

#[cfg(feature = "browser")]
async fn run_chromium(
    probe: ProbeConfig,
    scenarios: &[Scenario],
    runner: &mut TestRunner,
) -> CliResult<TestResults> {
    let host = calcprobe::ChromiumHost::launch(&probe.browser).await?;
    execute(host, probe, scenarios, runner).await
}

#[cfg(not(feature = "browser"))]
async fn run_chromium(
    _probe: ProbeConfig,
    _scenarios: &[Scenario],
    _runner: &mut TestRunner,
) -> CliResult<TestResults> {
    Err(CliError::invalid_argument(
        "chromium driver not enabled. Rebuild with --features browser or use --driver sim",
    ))
}

async fn execute<H: BrowserHost>(
    host: H,
    probe: ProbeConfig,
    scenarios: &[Scenario],
    runner: &mut TestRunner,
) -> CliResult<TestResults> {
    let harness = Harness::new(host, probe);
    let results = runner.run(&harness, scenarios).await;
    if let Err(e) = harness.shutdown().await {
        tracing::warn!(error = %e, "browser shutdown failed");
    }
    Ok(results)
}

fn list_scenarios(args: &ListArgs) {
    for scenario in filter_scenarios(all_scenarios(), args.filter.as_deref()) {
        println!("{}", scenario.name());
    }
}

fn show_config(args: &ConfigArgs) -> CliResult<()> {
    let probe = match args.config {
        Some(ref path) => ProbeConfig::load(path)?,
        None => ProbeConfig::new(),
    };
    let yaml = serde_yaml_ng::to_string(&probe).map_err(|e| CliError::config(e.to_string()))?;
    print!("{yaml}");
    Ok(())
}
