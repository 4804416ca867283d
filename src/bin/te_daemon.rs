//! 负载均衡守护进程
//!
//! 安装初始最短路径规则后，周期性采样各端口流量作为边权重，
//! 重新规划并只下发差量，直到收到 Ctrl-C / SIGTERM（或达到 `--max-cycles`），
//! 最后删除全部已安装规则。

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sdnte_rs::config::{Config, IntervalMode};
use sdnte_rs::control::{CancelToken, ControlLoop, LoopOptions, RestconfController, RunMode};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "te_daemon", about = "流量感知的最短路径守护进程")]
struct Args {
    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// 采样间隔（毫秒）
    #[arg(long)]
    interval_ms: Option<u64>,
    /// 扣除处理耗时，使周期接近采样间隔
    #[arg(long)]
    fixed_period: bool,
    /// 运行多少轮后正常退出
    #[arg(long)]
    max_cycles: Option<u64>,
    /// 关闭日志输出
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // 初始化 tracing
    tracing_subscriber::fmt()
        .with_env_filter(if args.quiet {
            tracing_subscriber::EnvFilter::new("off")
        } else {
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        })
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "运行失败");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> sdnte_rs::Result<Config> {
    let mut cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(host) = &args.host {
        cfg.controller.host = host.clone();
    }
    if let Some(port) = args.port {
        cfg.controller.port = port;
    }
    if let Some(username) = &args.username {
        cfg.controller.username = username.clone();
    }
    if let Some(password) = &args.password {
        cfg.controller.password = password.clone();
    }
    if let Some(ms) = args.interval_ms {
        cfg.monitor.interval_ms = ms;
    }
    if args.fixed_period {
        cfg.monitor.interval_mode = IntervalMode::Period;
    }
    if args.max_cycles.is_some() {
        cfg.monitor.max_cycles = args.max_cycles;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run(args: &Args) -> sdnte_rs::Result<ExitCode> {
    let cfg = load_config(args)?;
    let controller = RestconfController::new(&cfg.controller, cfg.flows.table_id)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| sdnte_rs::Error::Config(format!("cannot install signal handler: {e}")))?;

    info!(
        controller = %cfg.controller.base_url(),
        interval_ms = cfg.monitor.interval_ms,
        interval_mode = ?cfg.monitor.interval_mode,
        "启动守护进程"
    );
    let mut control = ControlLoop::new(controller, LoopOptions::from(&cfg));
    let report = control.run(RunMode::Daemon, &cancel);

    println!(
        "done: cycles={}, installed={}, removed={}, failures={}, remaining={}, outcome={:?}",
        report.cycles,
        report.installed,
        report.removed,
        report.failures.len(),
        report.teardown.remaining,
        report.outcome
    );
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
