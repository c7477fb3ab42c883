use anyhow::Context;
use clap::Parser;
use re_represent::core::ConfigProvider;
use re_represent::utils::{logger, validation::Validate};
use re_represent::{LocalStorage, RepresentationEngine, RepresentationPipeline, TomlConfig};
use std::path::Path;

#[derive(Parser)]
#[command(name = "toml-represent")]
#[command(about = "Representation runs driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "represent.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the number of time series per region
    #[arg(long)]
    time_series_per_region: Option<usize>,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 套用命令列覆蓋設定
    if let Some(n) = args.time_series_per_region {
        config.representation.n_time_series_per_region = n;
        tracing::info!("🔧 Time series per region overridden to: {}", n);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    // 輸入路徑以設定檔所在目錄為基準
    let config_dir = Path::new(&args.config)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config, &config_dir)?;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let name = config.pipeline.name.clone();
    let output_location = config.output_location(&config_dir);
    let source = LocalStorage::new(config_dir.clone());
    let sink = LocalStorage::new(config.output_dir(&config_dir));
    let pipeline = RepresentationPipeline::new(source, sink, config).with_name(name);
    let engine = RepresentationEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(_) => {
            tracing::info!("✅ Representation completed successfully!");
            println!("✅ Representation completed successfully!");
            println!("📁 Output saved to: {}", output_location.display());
        }
        Err(e) => {
            tracing::error!(
                "❌ Representation failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = e.severity().exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    let representation = config.representation();
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name,
        config.pipeline.version.as_deref().unwrap_or("-")
    );
    println!("  Capacity: {}", config.capacity_file());
    println!("  Capacity factors: {}", config.capacity_factor_file());
    println!("  Regions: {}", config.regions_file());
    println!("  Output: {}", config.output_path());
    println!(
        "  Series per region: {} ({} linkage)",
        representation.n_time_series_per_region, representation.linkage
    );
    println!("  Workers: {}", representation.workers);
    if let Some(typical) = config.typical_periods() {
        println!(
            "  Typical periods: {} x {} steps ({:?})",
            typical.n_typical_periods, typical.period_length, typical.method
        );
    }
    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();
}

fn perform_dry_run(config: &TomlConfig, base: &Path) -> anyhow::Result<()> {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📡 Input Files:");
    for file in [
        config.capacity_file(),
        config.capacity_factor_file(),
        config.regions_file(),
    ] {
        let path = base.join(file);
        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("input file {} is not accessible", path.display()))?;
        println!("  ✅ {} ({} bytes)", path.display(), metadata.len());
    }

    println!();
    println!("🗺️ Columns:");
    let columns = config.columns();
    println!(
        "  {} / {} / {} -> {}, {}",
        columns.time, columns.longitude, columns.latitude, columns.capacity, columns.capacity_factor
    );
    println!("  Region id property: {}", columns.region_index);
    if let Some(crs) = config.dataset_crs() {
        println!("  Dataset CRS: {}", crs);
    }

    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output_dir(base).display());
    match config.archive_name() {
        Some(archive) => println!("  Compression: {} (ZIP)", archive),
        None => println!("  Compression: disabled"),
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
    Ok(())
}
