//! gadget-rewrite 命令行入口
//!
//! 按容器配置改写一个HTML或CSS文件，结果写到标准输出。

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gadget_rewrite::config::{ContentRewriteOverride, JsonContainerConfig};
use gadget_rewrite::core::{ResourceRequest, ResourceResponse, RewriteEngine};
use gadget_rewrite::env::{generate_env_docs, EnvConfig};
use gadget_rewrite::error::{RewriteError, RewriteResult};
use gadget_rewrite::policy::GadgetDocument;
use gadget_rewrite::utils::url::Url;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// 容器配置JSON文件（默认读取 GADGET_REWRITE_CONFIG）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 容器ID（默认读取 GADGET_REWRITE_CONTAINER）
    #[arg(long)]
    container: Option<String>,

    /// 内容的来源地址，用于解析相对链接
    #[arg(short, long, required_unless_present = "env_docs")]
    base_url: Option<Url>,

    /// 内容类型，可以带 charset 参数
    #[arg(short, long, default_value = "text/html")]
    mime: String,

    /// 发起请求的 gadget 文档地址
    #[arg(long)]
    document: Option<Url>,

    /// 文档级的 content-rewrite 覆盖（JSON文件，需同时指定 --document）
    #[arg(long = "override", requires = "document")]
    rewrite_override: Option<PathBuf>,

    /// 输出支持的环境变量说明后退出
    #[arg(long)]
    env_docs: bool,

    /// 输入文件（默认读取标准输入）
    input: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.env_docs {
        print!("{}", generate_env_docs());
        return ExitCode::SUCCESS;
    }

    let env = match EnvConfig::from_env() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("错误: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&env);

    match run(cli, &env) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("重写失败: {}", e);
            eprintln!("错误: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(env: &EnvConfig) {
    let filter = EnvFilter::try_new(&env.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(!env.no_color)
        .init();
}

fn run(cli: Cli, env: &EnvConfig) -> RewriteResult<()> {
    let config_path = cli
        .config
        .or_else(|| env.config_path.clone())
        .ok_or_else(|| RewriteError::Config("未指定容器配置文件 (--config)".to_string()))?;
    let container = cli.container.unwrap_or_else(|| env.container.clone());
    let base_url = cli
        .base_url
        .ok_or_else(|| RewriteError::Config("未指定内容地址 (--base-url)".to_string()))?;

    let config = JsonContainerConfig::from_path(&config_path)?;
    let engine = RewriteEngine::new(Arc::new(config));

    let mut request = ResourceRequest::new(base_url, container);
    if let Some(document_url) = cli.document {
        let mut document = GadgetDocument::new(document_url);
        if let Some(path) = cli.rewrite_override {
            let rewrite_override = ContentRewriteOverride::from_json_str(&fs::read_to_string(path)?)?;
            document = document.with_rewrite_override(rewrite_override);
        }
        request = request.with_document(Arc::new(document));
    }

    let body = read_input(cli.input.as_ref())?;
    let response = ResourceResponse::new(Some(cli.mime.as_str()), body);

    let outcome = engine.rewrite_response(&request, &response)?;
    if !outcome.is_rewritten() {
        tracing::info!("内容未改写: {}", request.url);
    }
    let output = outcome.into_content_or(response.body);

    let mut stdout = io::stdout().lock();
    stdout.write_all(&output)?;
    stdout.flush()?;
    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> RewriteResult<Vec<u8>> {
    match path {
        Some(path) => Ok(fs::read(path)?),
        None => {
            let mut buffer = Vec::new();
            io::stdin().lock().read_to_end(&mut buffer)?;
            Ok(buffer)
        }
    }
}
