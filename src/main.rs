use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use themestack::config::{Action, Cli, Config};
use themestack::location::Locator;
use themestack::manifest::discover;
use themestack::pipeline::Toolchain;
use themestack::theme::Theme;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_cli(cli)?;

    init_tracing(config.verbose);

    // Setup Ctrl+C handler
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    // Configure Rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build_global()
        .ok();

    let mut theme = resolve_theme(&config)?.with_toolchain(Toolchain::new(config.include_dev()));
    theme
        .output_to(&config.output)
        .with_context(|| format!("Invalid output directory {}", config.output.display()))?;

    if config.verbose {
        let chain: Vec<String> = theme
            .chain()
            .iter()
            .map(|dir| dir.display().to_string())
            .collect();
        eprintln!("Theme chain: {}", chain.join(" -> "));
    }

    let outcome = match &config.action {
        Action::Build { watch: false, .. } => build_once(&theme, config.verbose),
        Action::Build { watch: true, .. } => {
            eprintln!("Watching for changes, press Ctrl+C to stop");
            theme
                .build_and_watch(&shutdown, |e| {
                    eprintln!("Error: {:#}", anyhow::Error::new(e));
                })
                .map(|()| {
                    eprintln!("\nWatch stopped");
                })
        }
        Action::Page { dest, layout, data } => theme
            .compile_page(dest, data, layout.as_deref())
            .map(|path| println!("Wrote {}", path.display())),
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", anyhow::Error::new(e));
            Ok(ExitCode::from(1))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Explicit parents are chained nearest first; otherwise follow theme.xml
fn resolve_theme(config: &Config) -> Result<Theme> {
    let locator = Locator::from_env();
    if config.parents.is_empty() {
        return discover(&locator, &config.theme)
            .with_context(|| format!("Failed to resolve theme {}", config.theme));
    }

    let parent = config
        .parents
        .iter()
        .rev()
        .fold(None, |parent: Option<Theme>, id| {
            Some(Theme::with_locator(&locator, id, parent.as_ref()))
        });
    Ok(Theme::with_locator(&locator, &config.theme, parent.as_ref()))
}

fn build_once(theme: &Theme, verbose: bool) -> Result<(), themestack::error::ThemeError> {
    // Logs replace the spinner in verbose mode
    let spinner = (!verbose).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Building theme...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = theme.build();

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let report = result?;
    let duration = report.duration.as_secs_f64();
    let throughput = if duration > 0.0 {
        report.files_copied as f64 / duration
    } else {
        0.0
    };

    println!(
        "Copied {} files ({} bytes) in {:.2}s ({:.0} files/sec)",
        report.files_copied, report.bytes_copied, duration, throughput
    );
    if let Some(css) = &report.stylesheet {
        println!("  stylesheet: {}", css.display());
    }
    if let Some(js) = &report.script {
        println!("  script: {}", js.display());
    }
    Ok(())
}
