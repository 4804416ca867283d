//! 控制回路使用的控制器接口

use crate::error::Result;
use crate::net::TopologyDocument;

/// SDN 控制器的最小接口
///
/// 所有调用都是阻塞的，由控制回路逐个发出。
pub trait Controller {
    /// 当前拓扑快照
    fn topology_snapshot(&mut self) -> Result<TopologyDocument>;

    /// 在 `switch` 上安装规则；`flow_id` 已存在时覆盖
    fn install_flow(&mut self, switch: &str, flow_id: &str, payload: &str) -> Result<()>;

    fn delete_flow(&mut self, switch: &str, flow_id: &str) -> Result<()>;

    /// 已安装规则的包计数；控制器尚无统计信息时返回 `None`
    fn flow_packet_count(&mut self, switch: &str, flow_id: &str) -> Result<Option<u64>>;
}

impl<C: Controller + ?Sized> Controller for &mut C {
    fn topology_snapshot(&mut self) -> Result<TopologyDocument> {
        (**self).topology_snapshot()
    }

    fn install_flow(&mut self, switch: &str, flow_id: &str, payload: &str) -> Result<()> {
        (**self).install_flow(switch, flow_id, payload)
    }

    fn delete_flow(&mut self, switch: &str, flow_id: &str) -> Result<()> {
        (**self).delete_flow(switch, flow_id)
    }

    fn flow_packet_count(&mut self, switch: &str, flow_id: &str) -> Result<Option<u64>> {
        (**self).flow_packet_count(switch, flow_id)
    }
}
