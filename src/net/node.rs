//! 节点类型
//!
//! 拓扑中的节点要么是主机，要么是交换机。交换机记录自己的出端口连接表。

use super::id::{MacAddr, NodeId, PortNo};

/// 交换机的一条出端口连接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// 本地出端口
    pub port: PortNo,
    /// 对端节点
    pub peer: NodeId,
    /// 对端端口；对端为主机时为空
    pub peer_port: Option<PortNo>,
}

/// 主机节点
#[derive(Debug, Clone)]
pub struct Host {
    pub id: NodeId,
    pub name: String,
    pub mac: MacAddr,
    pub ip: String,
}

/// 交换机节点
#[derive(Debug, Clone)]
pub struct Switch {
    pub id: NodeId,
    pub name: String,
    pub connections: Vec<Connection>,
}

impl Switch {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            connections: Vec::new(),
        }
    }

    /// 通往 `peer` 的本地出端口（按连接登记顺序取第一个）
    pub fn port_toward(&self, peer: NodeId) -> Option<PortNo> {
        self.connections
            .iter()
            .find(|c| c.peer == peer)
            .map(|c| c.port)
    }

    /// 该交换机已知的全部出端口（可能有重复，调用方按需去重）
    pub fn ports(&self) -> impl Iterator<Item = PortNo> + '_ {
        self.connections.iter().map(|c| c.port)
    }
}

/// 拓扑节点
#[derive(Debug, Clone)]
pub enum Node {
    Switch(Switch),
    Host(Host),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Switch(s) => s.id,
            Node::Host(h) => h.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Switch(s) => &s.name,
            Node::Host(h) => &h.name,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Node::Host(_))
    }

    pub fn as_host(&self) -> Option<&Host> {
        match self {
            Node::Host(h) => Some(h),
            Node::Switch(_) => None,
        }
    }

    pub fn as_switch(&self) -> Option<&Switch> {
        match self {
            Node::Switch(s) => Some(s),
            Node::Host(_) => None,
        }
    }
}
