//! 控制器拓扑快照的显式 schema
//!
//! 对应控制器 `network-topology` 文档。只声明构图需要的字段，
//! 其余字段由 serde 忽略；必填字段缺失时解析失败，而不是静默补默认值。

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 整个拓扑文档（可能包含多个拓扑实例，只使用第一个）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyDocument {
    #[serde(rename = "network-topology")]
    pub network_topology: NetworkTopology,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkTopology {
    #[serde(default)]
    pub topology: Vec<TopologyInstance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyInstance {
    #[serde(rename = "topology-id", default)]
    pub topology_id: Option<String>,
    #[serde(default)]
    pub node: Vec<NodeRecord>,
    #[serde(default)]
    pub link: Vec<LinkRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "node-id")]
    pub node_id: String,
    /// 只有主机节点携带地址记录
    #[serde(rename = "host-tracker-service:addresses", default)]
    pub addresses: Vec<AddressRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressRecord {
    pub ip: String,
    pub mac: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(rename = "link-id", default)]
    pub link_id: Option<String>,
    pub source: LinkSource,
    pub destination: LinkDestination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSource {
    #[serde(rename = "source-node")]
    pub node: String,
    #[serde(rename = "source-tp")]
    pub tp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDestination {
    #[serde(rename = "dest-node")]
    pub node: String,
    #[serde(rename = "dest-tp")]
    pub tp: String,
}

impl TopologyDocument {
    /// 从 JSON 文本解析；任何 schema 错误都视为拓扑不可用。
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::TopologyUnavailable(e.to_string()))
    }

    /// 第一个拓扑实例；没有任何实例时返回 `TopologyUnavailable`。
    pub fn first_instance(&self) -> Result<&TopologyInstance> {
        self.network_topology
            .topology
            .first()
            .ok_or_else(|| Error::TopologyUnavailable("snapshot contains no topology".into()))
    }
}
