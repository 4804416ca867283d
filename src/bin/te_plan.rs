//! 单次规划
//!
//! 读取控制器拓扑，计算所有主机对的最短路径并安装转发规则，
//! 然后保持规则直到收到 Ctrl-C / SIGTERM，再删除本次安装的全部规则。
//! `--dry-run` 只从快照文件规划并打印转发状态，不连接控制器。

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sdnte_rs::config::Config;
use sdnte_rs::control::{CancelToken, ControlLoop, LoopOptions, RestconfController, RunMode};
use sdnte_rs::flow::{ForwardingState, forwarding_state};
use sdnte_rs::net::{Topology, shortest_paths};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "te_plan", about = "最短路径规划：安装一次转发规则，停止时清理")]
struct Args {
    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,
    /// 覆盖控制器地址
    #[arg(long)]
    host: Option<String>,
    /// 覆盖控制器 RESTCONF 端口
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// 只规划、不下发：从 `--snapshot` 读取拓扑并打印转发状态 JSON
    #[arg(long)]
    dry_run: bool,
    /// 拓扑快照文件（与 `--dry-run` 一起使用）
    #[arg(long, requires = "dry_run")]
    snapshot: Option<PathBuf>,
    /// 关闭日志输出
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Serialize)]
struct DryRunOutput {
    paths: Vec<Vec<String>>,
    forwarding: ForwardingState,
    unresolved: Vec<String>,
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

    let result = if args.dry_run {
        dry_run(&args)
    } else {
        run(&args)
    };
    match result {
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
    cfg.validate()?;
    Ok(cfg)
}

fn dry_run(args: &Args) -> sdnte_rs::Result<ExitCode> {
    let path = args
        .snapshot
        .as_ref()
        .ok_or_else(|| sdnte_rs::Error::Config("--dry-run needs --snapshot".into()))?;
    let topo = Topology::from_json(&fs::read_to_string(path)?)?;
    let paths = shortest_paths(&topo);
    let plan = forwarding_state(&topo, &paths);

    let out = DryRunOutput {
        paths: paths
            .iter()
            .map(|p| topo.names(&p.hops).into_iter().map(str::to_string).collect())
            .collect(),
        forwarding: plan.state,
        unresolved: plan.failures.iter().map(|e| e.to_string()).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(ExitCode::SUCCESS)
}

fn run(args: &Args) -> sdnte_rs::Result<ExitCode> {
    let cfg = load_config(args)?;
    let controller = RestconfController::new(&cfg.controller, cfg.flows.table_id)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| sdnte_rs::Error::Config(format!("cannot install signal handler: {e}")))?;

    info!(controller = %cfg.controller.base_url(), "连接控制器");
    let mut control = ControlLoop::new(controller, LoopOptions::from(&cfg));
    let report = control.run(RunMode::Once, &cancel);

    println!(
        "done: installed={}, removed={}, failures={}, remaining={}, outcome={:?}",
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
