use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use vismon::demo::{self, DemoOptions};
use vismon::{logging, report, ConsoleListener, FileSource, Settings, SnapshotSource};
use vismon_sdk::{parse_duration, ConfigError, EngineConfig};

#[derive(Parser, Debug)]
#[command(name = "vismon")]
#[command(version, about = "Watch live objects change state and time their phases of work")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "vismon_sdk=debug" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulated workload and print what the engine sees
    Demo(DemoArgs),
    /// Print a snapshot file written by a running engine
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// How long the workload runs (e.g. "10s", "500ms")
    #[arg(short, long, value_parser = duration_arg)]
    duration: Option<Duration>,

    /// Poll interval of every monitor
    #[arg(short, long, value_parser = duration_arg)]
    poll: Option<Duration>,

    /// Number of simulated workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Write snapshots to this JSON file while running
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Export phase timings to this CSV file at the end
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Print state changes only
    #[arg(long)]
    quiet_timings: bool,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Snapshot file to read
    #[arg(short, long, default_value = "snapshot.json")]
    file: PathBuf,

    /// Keep printing whenever the file is rewritten
    #[arg(long)]
    follow: bool,

    /// Check interval when following
    #[arg(short, long, default_value = "1s", value_parser = duration_arg)]
    refresh: Duration,
}

fn duration_arg(s: &str) -> Result<Duration, ConfigError> {
    parse_duration(s)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    logging::init(cli.log.as_deref().or(settings.log.as_deref()))?;

    match cli.command {
        Command::Demo(args) => run_demo(args, &settings),
        Command::Show(args) => show(&args.file, args.follow, args.refresh),
    }
}

/// Merge command-line flags over the loaded settings.
fn demo_options(args: &DemoArgs, settings: &Settings) -> Result<(DemoOptions, EngineConfig)> {
    let mut options = DemoOptions::from(&settings.demo);
    if let Some(duration) = args.duration {
        options.duration = duration;
    }
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
    if args.output.is_some() {
        options.output = args.output.clone();
    }
    if args.export.is_some() {
        options.export = args.export.clone();
    }

    let mut config = settings.engine.clone();
    if let Some(poll) = args.poll {
        config.poll_interval = poll;
    }
    config.validate()?;
    Ok((options, config))
}

fn run_demo(args: DemoArgs, settings: &Settings) -> Result<()> {
    let (options, config) = demo_options(&args, settings)?;
    let console = if args.quiet_timings {
        ConsoleListener::stdout().without_timings()
    } else {
        ConsoleListener::stdout()
    };

    let rt = tokio::runtime::Runtime::new()?;
    let snapshot = rt.block_on(demo::run(&options, config, Arc::new(console)))?;

    println!();
    print!("{}", report::render(&snapshot));
    if let Some(path) = &options.output {
        println!("\nSnapshot written to: {}", path.display());
    }
    if let Some(path) = &options.export {
        println!("Timings exported to: {}", path.display());
    }
    Ok(())
}

fn show(path: &Path, follow: bool, refresh: Duration) -> Result<()> {
    let mut source = FileSource::new(path);

    if !follow {
        return match source.poll() {
            Some(snapshot) => {
                print!("{}", report::render(&snapshot));
                Ok(())
            }
            None => bail!(
                "{}: {}",
                source.description(),
                source.error().unwrap_or("no snapshot available")
            ),
        };
    }

    loop {
        if let Some(snapshot) = source.poll() {
            println!("{}", report::render(&snapshot));
        } else if let Some(error) = source.error() {
            tracing::warn!(source = source.description(), error, "cannot read snapshot");
        }
        thread::sleep(refresh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "vismon", "demo", "--duration", "2s", "--poll", "100ms", "--workers", "5",
        ]);
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        let (options, config) = demo_options(&args, &Settings::default()).unwrap();
        assert_eq!(options.duration, Duration::from_secs(2));
        assert_eq!(options.workers, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.change_history, 1000);
    }

    #[test]
    fn invalid_duration_flag_is_rejected() {
        assert!(Cli::try_parse_from(["vismon", "demo", "--duration", "soon"]).is_err());
    }

    #[test]
    fn zero_poll_is_rejected() {
        let cli = Cli::parse_from(["vismon", "demo", "--poll", "0ms"]);
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert!(demo_options(&args, &Settings::default()).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["vismon", "show", "--file", "x.json", "--log", "debug"]);
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Show(ShowArgs { follow: false, .. })));
    }
}
