use anyhow::Context;
use clap::Parser;
use lithmod::config::toml_config::JobConfig;
use lithmod::utils::error::ErrorSeverity;
use lithmod::utils::logger::{self, LogFormat};
use lithmod::utils::validation::Validate;
use std::path::Path;

#[derive(Parser)]
#[command(name = "model-job")]
#[command(about = "Run a lithology model job described in TOML")]
struct Args {
    /// Path to TOML job file
    #[arg(short, long, default_value = "model-job.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON log lines instead of the compact format
    #[arg(long)]
    json_logs: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    logger::init_logger(format, args.verbose);

    tracing::info!("🚀 Starting model job runner");
    tracing::info!("📁 Loading job from: {}", args.config);

    let mut config = JobConfig::from_file(&args.config)
        .with_context(|| format!("failed to load job file '{}'", args.config))?;

    if let Some(monitor) = args.monitor {
        config.monitoring = Some(lithmod::config::toml_config::MonitoringConfig { enabled: monitor });
        tracing::info!("🔧 Monitoring overridden to: {}", monitor);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Job loaded and validated successfully");

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No models will be loaded or written");
        perform_dry_run(&config);
        return Ok(());
    }

    if config.monitoring_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    let outcome = match config.build_engine() {
        Ok(engine) => engine.run().await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(output_path) => {
            tracing::info!("✅ Model job completed successfully!");
            tracing::info!("📁 Archive saved to: {}", output_path);
            println!("✅ Model job completed successfully!");
            println!("📁 Archive saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Model job failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &JobConfig, args: &Args) {
    println!("📋 Job Summary:");
    println!("  Job: {}", config.job.name);
    if let Some(description) = &config.job.description {
        println!("  Description: {}", description);
    }
    println!("  Base path: {}", config.base_path());
    println!("  Sources: {}", config.sources.len());
    println!("  Merge: {}", config.merge_enabled());
    println!("  Archive: {}", config.output.archive);
    if let Some(csv) = &config.output.csv {
        println!("  Voxel CSV: {}", csv);
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &JobConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📥 Sources (first is the master):");
    let base = Path::new(config.base_path());
    for (n, source) in config.sources.iter().enumerate() {
        let full_path = base.join(&source.path);
        let status = if full_path.exists() { "found" } else { "MISSING" };
        println!(
            "  {}. {} [{}] {} ({})",
            n + 1,
            source.name,
            source.r#type,
            full_path.display(),
            status
        );
        if let Some(column) = &source.label_column {
            println!("     label column: {}", column);
        }
        if let Some(prefix) = &source.prefix {
            println!("     record prefix: {}", prefix);
        }
    }

    println!();
    println!("⚙️ Processing:");
    if config.merge_enabled() {
        println!(
            "  🔀 {} merge step(s), later sources fill Background and unset voxels of the master",
            config.sources.len().saturating_sub(1)
        );
    } else {
        println!("  📊 Single source, no merge");
    }
    match config.import_options().color_seed {
        Some(seed) => println!("  🎨 Lithology colour seed: {}", seed),
        None => println!("  🎨 Lithology colours: random"),
    }

    println!();
    println!("💾 Output:");
    println!("  Archive: {}", base.join(&config.output.archive).display());
    if let Some(csv) = &config.output.csv {
        println!("  Voxel CSV: {}", base.join(csv).display());
    }
    if let Some(prefix) = &config.output.prefix {
        println!("  Record prefix: {}", prefix);
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
