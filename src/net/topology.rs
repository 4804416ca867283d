//! 拓扑图
//!
//! 由控制器快照构建的有向带权图。每条链路在图中插入正反两条边，
//! 初始权重为 1；之后由流量采样结果改写交换机出边的权重。

use std::collections::HashMap;

use super::id::{MacAddr, NodeId, PortNo};
use super::node::{Connection, Host, Node, Switch};
use super::snapshot::TopologyDocument;
use crate::error::{Error, Result};
use crate::flow::WeightSample;
use tracing::{debug, info, trace};

/// 没有流量样本时边的默认权重
pub const DEFAULT_WEIGHT: u64 = 1;

/// 网络拓扑
#[derive(Debug, Default, Clone)]
pub struct Topology {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
    /// `adj[from]` 为从 `from` 出发的所有出边邻居
    adj: Vec<Vec<NodeId>>,
    weights: HashMap<(NodeId, NodeId), u64>,
}

impl Topology {
    /// 从 JSON 文本构建拓扑
    pub fn from_json(raw: &str) -> Result<Self> {
        Self::from_snapshot(&TopologyDocument::from_json(raw)?)
    }

    /// 从快照构建拓扑
    #[tracing::instrument(skip(doc))]
    pub fn from_snapshot(doc: &TopologyDocument) -> Result<Self> {
        let inst = doc.first_instance()?;
        let mut topo = Topology::default();

        for rec in &inst.node {
            if topo.by_name.contains_key(&rec.node_id) {
                return Err(Error::TopologyUnavailable(format!(
                    "duplicate node id {}",
                    rec.node_id
                )));
            }
            if is_host_id(&rec.node_id) {
                let addr = rec.addresses.first().ok_or_else(|| {
                    Error::TopologyUnavailable(format!("host {} has no address record", rec.node_id))
                })?;
                topo.add_host(&rec.node_id, MacAddr::new(&addr.mac), &addr.ip);
            } else {
                topo.add_switch(&rec.node_id);
            }
        }

        for link in &inst.link {
            let src = topo.lookup(&link.source.node)?;
            let dst = topo.lookup(&link.destination.node)?;
            trace!(src = %link.source.node, dst = %link.destination.node, "登记链路");

            if topo.nodes[src.0].as_switch().is_some() {
                let port = switch_port(&link.source.tp)?;
                let peer_port = if topo.nodes[dst.0].is_host() {
                    None
                } else {
                    Some(switch_port(&link.destination.tp)?)
                };
                if let Node::Switch(sw) = &mut topo.nodes[src.0] {
                    sw.connections.push(Connection {
                        port,
                        peer: dst,
                        peer_port,
                    });
                }
            }

            topo.add_edge(src, dst, DEFAULT_WEIGHT);
            topo.add_edge(dst, src, DEFAULT_WEIGHT);
        }

        info!(
            switches = topo.switches().count(),
            hosts = topo.hosts().count(),
            edges = topo.edge_count(),
            "🗺️  拓扑加载完成"
        );
        Ok(topo)
    }

    fn add_host(&mut self, name: &str, mac: MacAddr, ip: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::Host(Host {
            id,
            name: name.to_string(),
            mac,
            ip: ip.to_string(),
        }));
        self.register(name, id)
    }

    fn add_switch(&mut self, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::Switch(Switch::new(id, name)));
        self.register(name, id)
    }

    fn register(&mut self, name: &str, id: NodeId) -> NodeId {
        self.by_name.insert(name.to_string(), id);
        self.adj.push(Vec::new());
        id
    }

    /// 插入或更新一条有向边
    fn add_edge(&mut self, from: NodeId, to: NodeId, weight: u64) {
        if self.weights.insert((from, to), weight).is_none() {
            self.adj[from.0].push(to);
        }
    }

    fn lookup(&self, name: &str) -> Result<NodeId> {
        self.node_id(name)
            .ok_or_else(|| Error::TopologyUnavailable(format!("link references unknown node {name}")))
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.nodes[id.0].name()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.nodes.iter().filter_map(Node::as_host)
    }

    pub fn switches(&self) -> impl Iterator<Item = &Switch> {
        self.nodes.iter().filter_map(Node::as_switch)
    }

    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        &self.adj[id.0]
    }

    pub fn weight(&self, from: NodeId, to: NodeId) -> Option<u64> {
        self.weights.get(&(from, to)).copied()
    }

    /// 所有有序主机对 (src, dst)，src != dst。
    ///
    /// 两个方向分别计算，因为每个方向的权重可能不同。
    pub fn host_pairs(&self) -> Vec<(NodeId, NodeId)> {
        let hosts: Vec<NodeId> = self.hosts().map(|h| h.id).collect();
        let mut pairs = Vec::with_capacity(hosts.len() * hosts.len().saturating_sub(1));
        for &src in &hosts {
            for &dst in &hosts {
                if src != dst {
                    pairs.push((src, dst));
                }
            }
        }
        pairs
    }

    /// 把采样得到的端口权重写回交换机出边；样本中缺失的端口回落为 1。
    ///
    /// 两个交换机之间有并行链路时，边权重取 `Switch::port_toward` 选中的端口，
    /// 与转发状态实际使用的出端口一致。
    pub fn apply_weights(&mut self, sample: &WeightSample) {
        let mut updates: Vec<(NodeId, NodeId, u64)> = Vec::new();
        for sw in self.switches() {
            for conn in &sw.connections {
                if sw.port_toward(conn.peer) != Some(conn.port) {
                    continue;
                }
                let w = sample.get(&sw.name, conn.port).unwrap_or(DEFAULT_WEIGHT);
                updates.push((sw.id, conn.peer, w));
            }
        }
        debug!(edges = updates.len(), "更新边权重");
        for (from, to, w) in updates {
            self.add_edge(from, to, w);
        }
    }

    /// 把节点下标序列转换为节点名称
    pub fn names(&self, hops: &[NodeId]) -> Vec<&str> {
        hops.iter().map(|&id| self.name(id)).collect()
    }
}

/// 主机的 node-id 形如 `host:<MAC>`
fn is_host_id(node_id: &str) -> bool {
    node_id.contains("host")
}

/// 交换机端口标识形如 `openflow:<dpid>:<port>`，取第三段作为端口号。
fn switch_port(tp: &str) -> Result<PortNo> {
    tp.splitn(3, ':')
        .nth(2)
        .and_then(|p| p.parse::<PortNo>().ok())
        .ok_or_else(|| Error::TopologyUnavailable(format!("cannot resolve switch port from {tp}")))
}
