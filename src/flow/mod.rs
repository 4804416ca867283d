//! 转发状态模块
//!
//! 包含转发状态数据模型、由路径聚合转发状态、状态差分以及规则载荷模板。

mod diff;
mod forwarding;
mod payload;
mod state;

pub use diff::{FlowDiff, diff};
pub use forwarding::{ForwardingPlan, forwarding_state};
pub use payload::{DEFAULT_PRIORITY, DEFAULT_TABLE_ID, FlowTemplate};
pub use state::{FlowKey, ForwardingState, WeightSample, flow_id};
