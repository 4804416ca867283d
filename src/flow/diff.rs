//! 转发状态差分
//!
//! 对每个交换机的每个端口比较新旧 MAC 集合：只在新状态中的进入 `to_add`，
//! 只在旧状态中的进入 `to_remove`。两张列表在任何下发动作之前一次算完。

use std::collections::{BTreeMap, BTreeSet};

use super::state::{FlowKey, ForwardingState};
use crate::net::{MacAddr, PortNo};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlowDiff {
    pub to_add: Vec<FlowKey>,
    pub to_remove: Vec<FlowKey>,
}

impl FlowDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// 计算从 `old` 变到 `new` 需要的最少增删
pub fn diff(new: &ForwardingState, old: &ForwardingState) -> FlowDiff {
    let empty_ports: BTreeMap<PortNo, BTreeSet<MacAddr>> = BTreeMap::new();
    let empty_macs: BTreeSet<MacAddr> = BTreeSet::new();
    let mut out = FlowDiff::default();

    let switches: BTreeSet<&str> = new.switch_ids().chain(old.switch_ids()).collect();
    for sw in switches {
        let new_ports = new.ports(sw).unwrap_or(&empty_ports);
        let old_ports = old.ports(sw).unwrap_or(&empty_ports);
        let ports: BTreeSet<PortNo> = new_ports.keys().chain(old_ports.keys()).copied().collect();

        for port in ports {
            let n = new_ports.get(&port).unwrap_or(&empty_macs);
            let o = old_ports.get(&port).unwrap_or(&empty_macs);
            out.to_add.extend(
                n.difference(o)
                    .map(|mac| FlowKey::new(sw, mac.clone(), port)),
            );
            out.to_remove.extend(
                o.difference(n)
                    .map(|mac| FlowKey::new(sw, mac.clone(), port)),
            );
        }
    }
    out
}
