//! 网络拓扑模块
//!
//! 此模块包含拓扑快照 schema、节点类型、有向带权拓扑图以及最短路径计算。

// 子模块声明
mod id;
mod node;
mod routing;
mod snapshot;
mod topology;

// 重新导出公共接口
pub use id::{MacAddr, NodeId, PortNo};
pub use node::{Connection, Host, Node, Switch};
pub use routing::{Path, ShortestPathTree, shortest_path_tree, shortest_paths};
pub use snapshot::{
    AddressRecord, LinkDestination, LinkRecord, LinkSource, NetworkTopology, NodeRecord,
    TopologyDocument, TopologyInstance,
};
pub use topology::{DEFAULT_WEIGHT, Topology};
