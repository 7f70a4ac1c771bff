use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use imgsort_core::{
    app_paths, list_camera_models, load_settings, load_settings_from, run_pipeline,
    CameraOffsetRule, CancellationToken, PipelineSettings, RunHooks, RunReport,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const BAR_STEPS: u64 = 1000;

#[derive(Debug, Parser)]
#[command(name = "imgsort", version)]
#[command(about = "Sorts photos by capture time and gives them sequential file names")]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sort and rename (or copy) the images in a directory.
    Sort(SortArgs),
    /// List the camera models found in a directory.
    Models(ModelsArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
}

#[derive(Debug, Args)]
struct SortArgs {
    dir: PathBuf,
    #[arg(long, overrides_with = "no_recursive")]
    recursive: bool,
    #[arg(long)]
    no_recursive: bool,
    /// Copy destination, relative to DIR unless absolute.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    subdir: Option<String>,
    #[arg(long)]
    prefix: Option<String>,
    #[arg(long)]
    suffix: Option<String>,
    /// Number given to the first file.
    #[arg(long, allow_negative_numbers = true)]
    offset: Option<i64>,
    /// Minimum width of the zero-padded number.
    #[arg(long)]
    digits: Option<usize>,
    #[arg(long, default_value_t = false)]
    copy: bool,
    #[arg(long, default_value_t = false)]
    rotate: bool,
    #[arg(long)]
    workers: Option<usize>,
    /// MODEL=years,months,days,hours,minutes,seconds
    #[arg(long = "camera-offset", value_name = "RULE")]
    camera_offsets: Vec<CameraOffsetRule>,
    #[arg(long = "extension", value_name = "EXT")]
    extensions: Vec<String>,
    /// Settings file to use instead of the per-user one.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct ModelsArgs {
    dir: PathBuf,
    #[arg(long, default_value_t = false)]
    recursive: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Sort(args) => cmd_sort(args),
        Commands::Models(args) => cmd_models(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}

fn cmd_sort(args: SortArgs) -> Result<()> {
    let mut settings = match args.config.as_deref() {
        Some(path) => load_settings_from(path)?,
        None => load_settings()?,
    };
    apply_overrides(&mut settings, &args);
    debug!(?settings, "effective settings");

    let bars = MultiProgress::new();
    let read_bar = bars.add(progress_bar("reading"));
    let write_bar = if args.apply {
        bars.add(progress_bar("writing"))
    } else {
        ProgressBar::hidden()
    };
    let hooks = RunHooks {
        read_progress: Box::new(|f: f64| read_bar.set_position(to_steps(f))),
        write_progress: Box::new(|f: f64| write_bar.set_position(to_steps(f))),
        cancel: cancel_on_interrupt()?,
        dry_run: !args.apply,
    };

    let report = run_pipeline(&args.dir, &settings, &hooks)
        .with_context(|| format!("could not sort {}", args.dir.display()))?;
    read_bar.finish_and_clear();
    write_bar.finish_and_clear();

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            print_table(&report);
        }
    }

    if report.dry_run {
        eprintln!("dry run: no files were changed. Pass --apply to write them.");
    } else {
        eprintln!(
            "{}: {} written, {} failed, {} skipped",
            if report.cancelled { "interrupted" } else { "done" },
            report.written.len(),
            report.write_failures.len(),
            report.skipped
        );
    }
    Ok(())
}

/// Ctrl-C stops the run at the next file; files staged for renaming get their
/// original names back.
fn cancel_on_interrupt() -> Result<CancellationToken> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || on_interrupt.cancel())
        .context("could not install the Ctrl-C handler")?;
    Ok(cancel)
}

fn apply_overrides(settings: &mut PipelineSettings, args: &SortArgs) {
    if args.recursive {
        settings.recursive = true;
    }
    if args.no_recursive {
        settings.recursive = false;
    }
    if let Some(dir) = &args.output_dir {
        settings.output_dir = Some(dir.clone());
    }
    if let Some(subdir) = &args.subdir {
        settings.output_subdir = Some(subdir.clone());
    }
    if let Some(prefix) = &args.prefix {
        settings.prefix = prefix.clone();
    }
    if let Some(suffix) = &args.suffix {
        settings.suffix = suffix.clone();
    }
    if let Some(offset) = args.offset {
        settings.offset = offset;
    }
    if args.digits.is_some() {
        settings.min_digits = args.digits;
    }
    if args.workers.is_some() {
        settings.workers = args.workers;
    }
    settings.write.copy |= args.copy;
    settings.write.rotate |= args.rotate;
    settings.camera_offsets.extend(args.camera_offsets.iter().cloned());
    if !args.extensions.is_empty() {
        settings.extensions = args.extensions.clone();
    }
}

fn cmd_models(args: ModelsArgs) -> Result<()> {
    let settings = PipelineSettings {
        recursive: args.recursive,
        ..load_settings()?
    };
    let models = list_camera_models(&args.dir, &settings)
        .with_context(|| format!("could not read {}", args.dir.display()))?;
    if models.is_empty() {
        eprintln!("no camera models found");
    }
    for model in models {
        println!("{model}");
    }
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let settings = load_settings()?;
    let paths = app_paths()?;
    println!("settings file: {}", paths.settings_path.display());
    println!("{}", toml::to_string_pretty(&settings)?);
    Ok(())
}

fn progress_bar(label: &'static str) -> ProgressBar {
    let bar = ProgressBar::new(BAR_STEPS);
    let style = match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {msg}")
    {
        Ok(style) => style.progress_chars("##-"),
        Err(_) => ProgressStyle::default_bar(),
    };
    bar.set_style(style);
    bar.set_message(label);
    bar
}

fn to_steps(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * BAR_STEPS as f64).round() as u64
}

fn print_table(report: &RunReport) {
    println!("source -> new name (capture time, camera)");
    for planned in &report.planned {
        let time = planned
            .capture_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} -> {} ({}, {})",
            planned.source.display(),
            planned.target_name,
            time,
            if planned.camera_model.is_empty() {
                "-"
            } else {
                &planned.camera_model
            }
        );
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!("\nfailures:");
        for failure in &failures {
            println!("  {failure}");
        }
    }

    println!(
        "\nsummary: scanned={} planned={} failed={} written={} skipped={} cancelled={}",
        report.scanned,
        report.planned.len(),
        failures.len(),
        report.written.len(),
        report.skipped,
        report.cancelled
    );
}
