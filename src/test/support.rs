//! 测试用的快照构造器与内存控制器

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde_json::{Value, json};

use crate::control::Controller;
use crate::error::{Error, Result};
use crate::flow::flow_id;
use crate::net::{MacAddr, PortNo, Topology, TopologyDocument};

pub fn mac(n: u8) -> MacAddr {
    MacAddr::new(format!("00:00:00:00:00:{n:02x}"))
}

pub fn host(n: u8) -> String {
    format!("host:{}", mac(n))
}

pub fn sw(dpid: u32) -> String {
    format!("openflow:{dpid}")
}

pub fn tp(dpid: u32, port: PortNo) -> String {
    format!("openflow:{dpid}:{port}")
}

pub fn fid(n: u8, dpid: u32, port: PortNo) -> String {
    flow_id(&mac(n), &sw(dpid), port)
}

#[derive(Debug, Default, Clone)]
pub struct SnapshotBuilder {
    nodes: Vec<Value>,
    links: Vec<Value>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn switch(mut self, dpid: u32) -> Self {
        self.nodes.push(json!({ "node-id": sw(dpid) }));
        self
    }

    pub fn host(mut self, n: u8) -> Self {
        self.nodes.push(json!({
            "node-id": host(n),
            "host-tracker-service:addresses": [
                { "id": n, "ip": format!("10.0.0.{n}"), "mac": mac(n).to_string() }
            ]
        }));
        self
    }

    fn link(&mut self, src: String, src_tp: String, dst: String, dst_tp: String) {
        self.links.push(json!({
            "link-id": src_tp.clone(),
            "source": { "source-node": src, "source-tp": src_tp },
            "destination": { "dest-node": dst, "dest-tp": dst_tp }
        }));
    }

    /// 主机 `n` 接在交换机 `dpid` 的 `port` 上（两个方向的链路）
    pub fn host_link(mut self, n: u8, dpid: u32, port: PortNo) -> Self {
        self.link(host(n), host(n), sw(dpid), tp(dpid, port));
        self.link(sw(dpid), tp(dpid, port), host(n), host(n));
        self
    }

    pub fn switch_link(mut self, a: u32, a_port: PortNo, b: u32, b_port: PortNo) -> Self {
        self.link(sw(a), tp(a, a_port), sw(b), tp(b, b_port));
        self.link(sw(b), tp(b, b_port), sw(a), tp(a, a_port));
        self
    }

    pub fn json(&self) -> Value {
        json!({
            "network-topology": {
                "topology": [
                    { "topology-id": "flow:1", "node": self.nodes, "link": self.links }
                ]
            }
        })
    }

    pub fn document(&self) -> TopologyDocument {
        serde_json::from_value(self.json()).expect("valid snapshot")
    }

    pub fn topology(&self) -> Topology {
        Topology::from_snapshot(&self.document()).expect("build topology")
    }
}

/// h1 - s1 - s2 - h2
///
/// s1: p1 -> h1, p2 -> s2；s2: p1 -> h2, p2 -> s1
pub fn line() -> SnapshotBuilder {
    SnapshotBuilder::new()
        .switch(1)
        .switch(2)
        .host(1)
        .host(2)
        .host_link(1, 1, 1)
        .host_link(2, 2, 1)
        .switch_link(1, 2, 2, 2)
}

/// 两条等价路径：
///
/// ```text
///        s2
///  h1 - s1  s4 - h2
///        s3
/// ```
/// s1: p1 h1, p2 s2, p3 s3；s2: p1 s1, p2 s4；s3: p1 s1, p2 s4；s4: p1 h2, p2 s2, p3 s3
pub fn diamond() -> SnapshotBuilder {
    SnapshotBuilder::new()
        .switch(1)
        .switch(2)
        .switch(3)
        .switch(4)
        .host(1)
        .host(2)
        .host_link(1, 1, 1)
        .host_link(2, 4, 1)
        .switch_link(1, 2, 2, 1)
        .switch_link(1, 3, 3, 1)
        .switch_link(2, 2, 4, 2)
        .switch_link(3, 2, 4, 3)
}

/// h1, h2 接在 s1 上；h3, h4 接在 s2 上；s1 p3 <-> s2 p1
pub fn two_racks() -> SnapshotBuilder {
    SnapshotBuilder::new()
        .switch(1)
        .switch(2)
        .host(1)
        .host(2)
        .host(3)
        .host(4)
        .host_link(1, 1, 1)
        .host_link(2, 1, 2)
        .host_link(3, 2, 2)
        .host_link(4, 2, 3)
        .switch_link(1, 3, 2, 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Topology,
    Install { switch: String, flow_id: String },
    Delete { switch: String, flow_id: String },
    Counter { switch: String, flow_id: String },
}

/// 内存中的控制器
#[derive(Debug, Default)]
pub struct FakeController {
    pub snapshot: Option<TopologyDocument>,
    /// (switch, flow_id) -> payload
    pub flows: BTreeMap<(String, String), String>,
    pub fail_install: HashSet<String>,
    pub fail_delete: HashSet<String>,
    /// 始终返回“暂不可用”的规则
    pub unavailable: HashSet<String>,
    /// 读取计数时控制器报错的规则
    pub counter_errors: HashSet<String>,
    /// 按读取顺序给出的计数值；用完后返回 `Some(0)`
    pub counters: HashMap<String, VecDeque<Option<u64>>>,
    pub calls: Vec<Call>,
}

impl FakeController {
    pub fn with_snapshot(builder: &SnapshotBuilder) -> Self {
        Self {
            snapshot: Some(builder.document()),
            ..Self::default()
        }
    }

    pub fn script(&mut self, flow_id: impl Into<String>, reads: &[Option<u64>]) {
        self.counters
            .entry(flow_id.into())
            .or_default()
            .extend(reads.iter().copied());
    }

    pub fn installs(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Install { .. }))
            .collect()
    }

    pub fn deletes(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Delete { .. }))
            .collect()
    }

    pub fn counter_reads(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Counter { .. }))
            .count()
    }
}

impl Controller for FakeController {
    fn topology_snapshot(&mut self) -> Result<TopologyDocument> {
        self.calls.push(Call::Topology);
        self.snapshot
            .clone()
            .ok_or_else(|| Error::Controller("connection refused".into()))
    }

    fn install_flow(&mut self, switch: &str, flow_id: &str, payload: &str) -> Result<()> {
        self.calls.push(Call::Install {
            switch: switch.to_string(),
            flow_id: flow_id.to_string(),
        });
        if self.fail_install.contains(flow_id) {
            return Err(Error::Controller("server returned 500".into()));
        }
        self.flows
            .insert((switch.to_string(), flow_id.to_string()), payload.to_string());
        Ok(())
    }

    fn delete_flow(&mut self, switch: &str, flow_id: &str) -> Result<()> {
        self.calls.push(Call::Delete {
            switch: switch.to_string(),
            flow_id: flow_id.to_string(),
        });
        if self.fail_delete.contains(flow_id) {
            return Err(Error::Controller("server returned 500".into()));
        }
        self.flows.remove(&(switch.to_string(), flow_id.to_string()));
        Ok(())
    }

    fn flow_packet_count(&mut self, switch: &str, flow_id: &str) -> Result<Option<u64>> {
        self.calls.push(Call::Counter {
            switch: switch.to_string(),
            flow_id: flow_id.to_string(),
        });
        if self.counter_errors.contains(flow_id) {
            return Err(Error::Controller("server returned 401 Unauthorized".into()));
        }
        if self.unavailable.contains(flow_id) {
            return Ok(None);
        }
        Ok(self
            .counters
            .get_mut(flow_id)
            .and_then(|q| q.pop_front())
            .unwrap_or(Some(0)))
    }
}
