use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{error, info};

use court_case_fetch::utils::logging;
use court_case_fetch::{Config, DocumentFetcher, SearchOrchestrator};

const USAGE: &str = "用法: court_case_fetch <case_type> <case_number> <filing_year> [--download]";

/// 加载配置：设置了 CONFIG_FILE 时读取 TOML，否则读取环境变量
fn load_config() -> Result<Config> {
    match std::env::var("CONFIG_FILE") {
        Ok(path) => Config::from_toml_file(&PathBuf::from(&path))
            .with_context(|| format!("无法加载配置文件 {}", path)),
        Err(_) => {
            let config = Config::from_env();
            config.validate()?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let download = match args.iter().position(|a| a == "--download") {
        Some(index) => {
            args.remove(index);
            true
        }
        None => false,
    };
    let [case_type, case_number, filing_year] = args.as_slice() else {
        bail!(USAGE);
    };

    // 加载配置
    let config = load_config()?;

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(&config);

    let orchestrator = SearchOrchestrator::new(config.clone())?;
    let result = orchestrator.search_raw(case_type, case_number, filing_year).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if download && result.success {
        let fetcher = DocumentFetcher::new(&config)?;
        for document in &result.documents {
            match fetcher.fetch(&document.url, &document.storage_id()).await {
                Ok(downloaded) => println!("{}", serde_json::to_string_pretty(&downloaded)?),
                Err(e) => error!("❌ 文档 {} 下载失败: {}", document.url, e),
            }
        }
    }

    orchestrator.shutdown().await;
    info!("✓ 完成");
    Ok(())
}
