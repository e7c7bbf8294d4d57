use clap::Parser;
use lithmod::adapters::{ArchiveSource, BlockModelSource, LogProgress, TracingReporter, XyzSource};
use lithmod::config::{CliConfig, Command, InputFormat};
use lithmod::core::export::export_csv;
use lithmod::domain::ports::{ModelSource, Storage};
use lithmod::utils::error::ErrorSeverity;
use lithmod::utils::logger::{self, LogFormat};
use lithmod::utils::validation::Validate;
use lithmod::{BilinearReprojector, LocalStorage, ModelEngine, ModelError};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    logger::init_logger(LogFormat::Compact, config.verbose);

    tracing::info!("🚀 Starting lithmod CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    if let Err(e) = run(&config).await {
        tracing::error!(
            "❌ lithmod failed: {} (Category: {:?}, Severity: {:?})",
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

    Ok(())
}

async fn run(config: &CliConfig) -> Result<(), ModelError> {
    let storage = LocalStorage::new(config.base_path.clone());

    match &config.command {
        Command::Import {
            input,
            output,
            format,
            label_column,
            csv,
        } => {
            let source: Box<dyn ModelSource> = match format {
                InputFormat::Xyz => Box::new(
                    XyzSource::new(storage.clone(), input, config.import_options())
                        .with_progress_logging(config.verbose),
                ),
                InputFormat::BlockModel => Box::new(
                    BlockModelSource::new(storage.clone(), input, config.import_options())
                        .with_label_column(label_column.clone())
                        .with_progress_logging(config.verbose),
                ),
            };
            let engine = build_engine(config, storage, output, csv.as_deref()).with_source(source);
            let path = engine.run().await?;
            report_saved(&path);
        }
        Command::Merge {
            master,
            slave,
            output,
            csv,
        } => {
            let engine = build_engine(config, storage.clone(), output, csv.as_deref())
                .with_source(Box::new(ArchiveSource::new(storage.clone(), master)))
                .with_source(Box::new(ArchiveSource::new(storage, slave)));
            let path = engine.run().await?;
            report_saved(&path);
        }
        Command::Info { archive } => {
            let model = ArchiveSource::new(storage, archive).load().await?;
            if let Err(violation) = model.validate() {
                tracing::warn!("Archive does not satisfy the model invariants: {}", violation);
            }
            println!("📊 {}", archive);
            println!("{}", model.summary());
        }
        Command::ExportCsv { archive, output } => {
            let model = ArchiveSource::new(storage.clone(), archive).load().await?;
            let mut buffer = Vec::new();
            let rows = export_csv(&model, &mut buffer)?;
            storage.write_file(output, &buffer).await?;
            tracing::info!("📄 Exported {} voxels to {}", rows, output);
            println!("✅ Exported {} voxels to {}", rows, output);
        }
    }

    Ok(())
}

fn build_engine(
    config: &CliConfig,
    storage: LocalStorage,
    output: &str,
    csv: Option<&str>,
) -> ModelEngine<LocalStorage> {
    let mut engine = ModelEngine::new_with_monitoring(
        storage,
        Box::new(BilinearReprojector),
        output,
        config.monitor,
    )
    .with_reporter(Arc::new(TracingReporter));
    if let Some(csv) = csv {
        engine = engine.with_csv_export(csv);
    }
    if config.verbose {
        engine = engine.with_progress(Arc::new(LogProgress));
    }
    engine
}

fn report_saved(path: &str) {
    tracing::info!("✅ Model job completed successfully!");
    tracing::info!("📁 Archive saved to: {}", path);
    println!("✅ Model job completed successfully!");
    println!("📁 Archive saved to: {}", path);
}
