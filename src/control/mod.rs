//! 控制回路模块
//!
//! 此模块包含控制器接口及其 RESTCONF 实现、流量采样、已安装规则登记表、
//! 取消标志以及串联这些组件的控制回路状态机。

// 子模块声明
mod cancel;
mod control_loop;
mod controller;
mod installed;
mod restconf;
mod sampler;

// 重新导出公共接口
pub use cancel::CancelToken;
pub use control_loop::{
    ApplyReport, ControlLoop, LoopOptions, MIN_WINDOW, Phase, RunMode, RunOutcome, RunReport,
    TeardownReport, sampling_window,
};
pub use controller::Controller;
pub use installed::InstalledFlows;
pub use restconf::{RestconfController, counter_pending, flow_path, parse_packet_count};
pub use sampler::{RetryPolicy, TrafficSampler, weight_from_counts};
