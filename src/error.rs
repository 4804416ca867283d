//! 错误类型
//!
//! 控制回路中所有可上报的错误都汇总在 [`Error`] 中。
//! 取消（cancel）不是错误，见 [`crate::control::RunOutcome`]。

use std::fmt;

use thiserror::Error;

/// 对控制器发起的流表操作种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOp {
    Install,
    Delete,
}

impl fmt::Display for FlowOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowOp::Install => f.write_str("install"),
            FlowOp::Delete => f.write_str("delete"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// 拓扑快照获取失败、为空或字段缺失
    #[error("topology unavailable: {0}")]
    TopologyUnavailable(String),

    /// 路径内部交换机找不到通往下一跳的连接
    #[error("switch {switch} has no port toward {next_hop}")]
    PortResolution { switch: String, next_hop: String },

    #[error("failed to {op} flow {flow_id} on {switch}: {reason}")]
    FlowApply {
        op: FlowOp,
        switch: String,
        flow_id: String,
        reason: String,
    },

    /// 计数器重试耗尽
    #[error("counters for flow {flow_id} on {switch} unavailable after {attempts} attempts")]
    CounterUnavailable {
        switch: String,
        flow_id: String,
        attempts: u32,
    },

    #[error("controller request failed: {0}")]
    Controller(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
