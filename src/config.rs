//! 运行配置
//!
//! JSON 配置文件，所有字段都有默认值；命令行参数可以覆盖单个字段。

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::flow::{DEFAULT_PRIORITY, DEFAULT_TABLE_ID, FlowTemplate};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub controller: ControllerConfig,
    pub monitor: MonitorConfig,
    pub flows: FlowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub request_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8181,
            username: "admin".into(),
            password: "admin".into(),
            request_timeout_ms: 5_000,
        }
    }
}

impl ControllerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// 采样窗口与周期的关系
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMode {
    /// 采样窗口恒为 interval；实际周期 = interval + 处理耗时
    #[default]
    Window,
    /// 采样窗口扣掉上一轮处理耗时，使周期接近 interval
    Period,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_ms: u64,
    pub interval_mode: IntervalMode,
    pub counter_retry: RetryConfig,
    /// 连续多少次采样失败后终止守护循环
    pub max_sample_failures: u32,
    /// 最多运行多少轮监控周期；None 表示直到被取消
    pub max_cycles: Option<u64>,
    /// 单次模式下等待取消时的轮询间隔
    pub hold_poll_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            interval_mode: IntervalMode::Window,
            counter_retry: RetryConfig::default(),
            max_sample_failures: 3,
            max_cycles: None,
            hold_poll_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 200,
            timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub table_id: u8,
    pub priority: u16,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            table_id: DEFAULT_TABLE_ID,
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl FlowConfig {
    pub fn template(&self) -> FlowTemplate {
        FlowTemplate::new(self.table_id, self.priority)
    }
}

impl Config {
    /// 读取并校验配置文件
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.monitor;
        if m.interval_ms == 0 && m.max_cycles.is_none() {
            return Err(Error::Config(
                "monitor.interval_ms must be > 0 for an unbounded run".into(),
            ));
        }
        if m.counter_retry.max_attempts == 0 {
            return Err(Error::Config(
                "monitor.counter_retry.max_attempts must be >= 1".into(),
            ));
        }
        if m.max_sample_failures == 0 {
            return Err(Error::Config("monitor.max_sample_failures must be >= 1".into()));
        }
        if self.controller.host.is_empty() {
            return Err(Error::Config("controller.host must not be empty".into()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.monitor.interval_ms)
    }
}
