//! 标识符类型
//!
//! 定义拓扑节点下标、端口号与主机 MAC 地址。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 节点标识符（拓扑内部下标，按快照中出现顺序分配）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// 交换机本地端口号
pub type PortNo = u32;

/// 主机 MAC 地址（保持控制器给出的原始文本形式）
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddr(pub String);

impl MacAddr {
    pub fn new(mac: impl Into<String>) -> Self {
        Self(mac.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
