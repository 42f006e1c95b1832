use std::env;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use ethers::types::Address;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use price_oracle_router::oracle::PriceOracle;
use price_oracle_router::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let matches = Command::new("oracle-router")
        .version("0.1.0")
        .about("가격 오라클 라우터 - 설정된 자산의 base unit 가격 조회")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("설정 파일 경로 (ORACLE_CONFIG 환경 변수로도 지정 가능)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("로그 레벨 (trace, debug, info, warn, error)")
                .default_value("info"),
        )
        .arg(
            Arg::new("asset")
                .short('a')
                .long("asset")
                .value_name("SYMBOL|ADDRESS")
                .help("조회할 자산 (반복 가능, 생략 시 설정된 전체 자산)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON으로 출력")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    // 로그 레벨 설정
    let log_filter = match matches.get_one::<String>("log-level").map(String::as_str) {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => "info",
    };

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 설정 파일 로드
    let config_path = matches
        .get_one::<String>("config")
        .cloned()
        .or_else(|| env::var("ORACLE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());
    info!("Loading config from {}", config_path);

    let config = Config::load(&config_path).await?;
    if let Err(e) = config.validate() {
        error!("Config validation failed: {}", e);
        std::process::exit(1);
    }

    let router = config.build_router().await?;

    let assets = match matches.get_many::<String>("asset") {
        Some(requested) => requested
            .map(|value| resolve_asset(&config, value))
            .collect::<Result<Vec<_>>>()?,
        None => config.assets.iter().map(|asset| asset.address).collect(),
    };

    let results = router.prices_batch(&assets).await;

    if matches.get_flag("json") {
        let report: Vec<serde_json::Value> = assets
            .iter()
            .zip(&results)
            .map(|(asset, result)| match result {
                Ok(price) => serde_json::json!({
                    "asset": asset,
                    "symbol": config.symbol_of(*asset),
                    "price": price.display_value(),
                    "source": price.source,
                    "resolved_at": price.resolved_at,
                }),
                Err(e) => serde_json::json!({
                    "asset": asset,
                    "symbol": config.symbol_of(*asset),
                    "error": e.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (asset, result) in assets.iter().zip(&results) {
        let label = config
            .symbol_of(*asset)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:?}", asset));
        match result {
            Ok(price) => println!("{:<10} {:>28}  ({:?})", label, price.display_value(), price.source),
            Err(e) => {
                warn!("Failed to price {}: {}", label, e);
                println!("{:<10} {:>28}  ({})", label, "-", e);
            }
        }
    }

    Ok(())
}

/// 심볼 또는 주소 문자열을 자산 주소로 변환
fn resolve_asset(config: &Config, value: &str) -> Result<Address> {
    if let Some(asset) = config.asset_by_symbol(value) {
        return Ok(asset.address);
    }
    value
        .parse::<Address>()
        .with_context(|| format!("unknown asset symbol or address: {}", value))
}
