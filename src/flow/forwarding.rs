//! 路径 -> 转发状态
//!
//! 对每条路径的每个内部交换机，找出通往下一跳的出端口，把路径目的主机的
//! MAC 并入该 (switch, port) 的集合。多条路径经过同一跳时取并集。
//! 一条路径只要有一跳解析不出端口，就整条跳过并记录失败，
//! 不把半条路径写进转发状态。

use super::state::{FlowKey, ForwardingState};
use crate::error::Error;
use crate::net::{Node, Path, Topology};
use tracing::{debug, warn};

/// 一次规划的结果：转发状态，以及被跳过的路径对应的错误
#[derive(Debug, Default)]
pub struct ForwardingPlan {
    pub state: ForwardingState,
    pub failures: Vec<Error>,
}

/// 聚合所有路径得到转发状态
#[tracing::instrument(skip(topo, paths), fields(paths = paths.len()))]
pub fn forwarding_state(topo: &Topology, paths: &[Path]) -> ForwardingPlan {
    let mut plan = ForwardingPlan {
        state: ForwardingState::with_ports(topo),
        failures: Vec::new(),
    };

    for path in paths {
        match resolve_hops(topo, path) {
            Ok(keys) => {
                for key in &keys {
                    plan.state.insert(key);
                }
            }
            Err(e) => {
                warn!(path = ?topo.names(&path.hops), error = %e, "路径端口解析失败，跳过该路径");
                plan.failures.push(e);
            }
        }
    }

    debug!(
        flows = plan.state.flow_count(),
        failures = plan.failures.len(),
        "转发状态聚合完成"
    );
    plan
}

/// 一条路径上所有内部交换机需要的规则
fn resolve_hops(topo: &Topology, path: &Path) -> Result<Vec<FlowKey>, Error> {
    let dst_mac = match topo.node(path.dst()) {
        Node::Host(h) => h.mac.clone(),
        Node::Switch(s) => {
            return Err(Error::PortResolution {
                switch: s.name.clone(),
                next_hop: "<destination is not a host>".into(),
            });
        }
    };

    let mut keys = Vec::with_capacity(path.len().saturating_sub(2));
    for win in path.hops.windows(2).skip(1) {
        let (here, next) = (win[0], win[1]);
        let unresolved = || Error::PortResolution {
            switch: topo.name(here).to_string(),
            next_hop: topo.name(next).to_string(),
        };
        let sw = topo.node(here).as_switch().ok_or_else(unresolved)?;
        let port = sw.port_toward(next).ok_or_else(unresolved)?;
        keys.push(FlowKey::new(sw.name.clone(), dst_mac.clone(), port));
    }
    Ok(keys)
}
