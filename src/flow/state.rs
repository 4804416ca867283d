//! 转发状态与流表条目
//!
//! `ForwardingState` 描述期望安装到交换机上的全部转发规则：
//! switch -> (出端口 -> 目的 MAC 集合)。同一个 (switch, port, mac)
//! 只对应一条规则，与产生它的主机对数量无关。

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::net::{MacAddr, PortNo, Topology};

/// 由 (mac, switch, port) 确定的流表 id；同一三元组总是得到同一个 id。
pub fn flow_id(mac: &MacAddr, switch: &str, port: PortNo) -> String {
    format!("{mac}_{switch}_to_{port}")
}

/// 一条转发规则：交换机 `switch` 把目的地址为 `mac` 的包从 `port` 转出。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub switch: String,
    pub mac: MacAddr,
    pub port: PortNo,
}

impl FlowKey {
    pub fn new(switch: impl Into<String>, mac: MacAddr, port: PortNo) -> Self {
        Self {
            switch: switch.into(),
            mac,
            port,
        }
    }

    pub fn flow_id(&self) -> String {
        flow_id(&self.mac, &self.switch, self.port)
    }
}

/// switch -> port -> 目的 MAC 集合
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForwardingState {
    switches: BTreeMap<String, BTreeMap<PortNo, BTreeSet<MacAddr>>>,
}

impl ForwardingState {
    /// 为拓扑中每个交换机的每个已知端口登记一个空集合
    pub fn with_ports(topo: &Topology) -> Self {
        let mut state = Self::default();
        for sw in topo.switches() {
            let ports = state.switches.entry(sw.name.clone()).or_default();
            for port in sw.ports() {
                ports.entry(port).or_default();
            }
        }
        state
    }

    /// 登记一个端口（若不存在则为空集合）
    pub fn ensure_port(&mut self, switch: &str, port: PortNo) {
        self.switches
            .entry(switch.to_string())
            .or_default()
            .entry(port)
            .or_default();
    }

    /// 并入一条规则；返回该规则此前是否不存在
    pub fn insert(&mut self, key: &FlowKey) -> bool {
        self.switches
            .entry(key.switch.clone())
            .or_default()
            .entry(key.port)
            .or_default()
            .insert(key.mac.clone())
    }

    /// 移除一条规则（端口本身保留）；返回该规则此前是否存在
    pub fn remove(&mut self, key: &FlowKey) -> bool {
        self.switches
            .get_mut(&key.switch)
            .and_then(|ports| ports.get_mut(&key.port))
            .is_some_and(|macs| macs.remove(&key.mac))
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.macs(&key.switch, key.port)
            .is_some_and(|macs| macs.contains(&key.mac))
    }

    pub fn macs(&self, switch: &str, port: PortNo) -> Option<&BTreeSet<MacAddr>> {
        self.switches.get(switch).and_then(|ports| ports.get(&port))
    }

    pub fn ports(&self, switch: &str) -> Option<&BTreeMap<PortNo, BTreeSet<MacAddr>>> {
        self.switches.get(switch)
    }

    pub fn switch_ids(&self) -> impl Iterator<Item = &str> {
        self.switches.keys().map(String::as_str)
    }

    /// 按 (switch, port) 遍历全部条目，包括空集合
    pub fn entries(&self) -> impl Iterator<Item = (&str, PortNo, &BTreeSet<MacAddr>)> {
        self.switches.iter().flat_map(|(sw, ports)| {
            ports
                .iter()
                .map(move |(&port, macs)| (sw.as_str(), port, macs))
        })
    }

    /// 展开为全部规则
    pub fn flows(&self) -> impl Iterator<Item = FlowKey> + '_ {
        self.entries().flat_map(|(sw, port, macs)| {
            macs.iter()
                .map(move |mac| FlowKey::new(sw, mac.clone(), port))
        })
    }

    /// 规则总数
    pub fn flow_count(&self) -> usize {
        self.entries().map(|(_, _, macs)| macs.len()).sum()
    }
}

/// 一次采样得到的 (switch, port) -> 权重，权重恒 >= 1。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WeightSample {
    weights: BTreeMap<(String, PortNo), u64>,
}

impl WeightSample {
    pub fn insert(&mut self, switch: impl Into<String>, port: PortNo, weight: u64) {
        self.weights.insert((switch.into(), port), weight.max(1));
    }

    pub fn get(&self, switch: &str, port: PortNo) -> Option<u64> {
        self.weights.get(&(switch.to_string(), port)).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PortNo, u64)> {
        self.weights
            .iter()
            .map(|((sw, port), &w)| (sw.as_str(), *port, w))
    }
}
