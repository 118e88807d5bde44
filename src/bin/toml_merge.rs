use anyhow::Context;
use clap::Parser;
use merge_etl::core::ConfigProvider;
use merge_etl::utils::{logger, validation::Validate};
use merge_etl::{EtlEngine, FullRecordMerger, LocalStorage, MergePipeline, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-merge")]
#[command(about = "Merge tool driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "merge-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override max_recorded_date from config (DD/MM/YYYY)
    #[arg(long)]
    max_recorded_date: Option<String>,

    /// Dry run - check configuration and print the first merged rows
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 載入 TOML 配置
    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    // 初始化日誌
    let verbose = args.verbose || config.verbose();
    if config.json_logs() {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 應用命令列覆蓋設定
    if let Some(date) = args.max_recorded_date {
        tracing::info!("🔧 max_recorded_date overridden to: {}", date);
        config.merge.get_or_insert_with(Default::default).max_recorded_date = Some(date);
    }

    config.validate().context("configuration validation failed")?;

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - showing the first rows only");
        let merger = FullRecordMerger::new(
            &config.source_files(),
            Some(5),
            config.max_recorded_date(),
        )?;
        for record in &merger {
            let record = record?;
            println!(
                "{} {} {} -> {} {}",
                record.ssn,
                record.first_name,
                record.last_name,
                record.vehicle_make,
                record.vehicle_model
            );
        }
        return Ok(());
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = MergePipeline::new(storage, config);
    let output_path = EtlEngine::new(pipeline).run()?;

    println!("✅ Merge completed successfully!");
    println!("📁 Output saved to: {}", output_path);
    Ok(())
}
