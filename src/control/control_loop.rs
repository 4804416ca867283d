//! 流量工程控制回路
//!
//! 状态序列：
//! `Init -> Planning -> Installing -> (MonitorWait -> Replanning -> Applying)* -> Teardown -> Terminated`
//!
//! - 单一任务，所有控制器调用串行发出；
//! - 取消只在回路边界（进入 MonitorWait 之前）生效，进行中的规划/下发总会跑完；
//! - 无论以何种方式结束，都会对登记表中的全部规则执行一次 teardown。

use std::thread;
use std::time::{Duration, Instant};

use super::cancel::CancelToken;
use super::controller::Controller;
use super::installed::InstalledFlows;
use super::sampler::{RetryPolicy, TrafficSampler};
use crate::config::{Config, IntervalMode};
use crate::error::{Error, FlowOp, Result};
use crate::flow::{FlowDiff, FlowKey, FlowTemplate, ForwardingState, diff, forwarding_state};
use crate::net::{Topology, shortest_paths};
use tracing::{debug, error, info, warn};

/// 采样窗口的下限（`IntervalMode::Period` 下扣除处理耗时后使用）
pub const MIN_WINDOW: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Planning,
    Installing,
    MonitorWait,
    Replanning,
    Applying,
    Teardown,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 规划一次、安装一次，然后等待取消
    Once,
    /// 持续监控/重新规划/下发差量，直到取消或达到 `max_cycles`
    Daemon,
}

/// 控制回路参数
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub interval: Duration,
    pub interval_mode: IntervalMode,
    pub retry: RetryPolicy,
    pub max_sample_failures: u32,
    pub max_cycles: Option<u64>,
    pub hold_poll: Duration,
    pub template: FlowTemplate,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for LoopOptions {
    fn from(cfg: &Config) -> Self {
        let m = &cfg.monitor;
        Self {
            interval: cfg.interval(),
            interval_mode: m.interval_mode,
            retry: RetryPolicy::from(&m.counter_retry),
            max_sample_failures: m.max_sample_failures.max(1),
            max_cycles: m.max_cycles,
            hold_poll: Duration::from_millis(m.hold_poll_ms),
            template: cfg.flows.template(),
        }
    }
}

/// 一次差量下发的结果
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub installed: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct TeardownReport {
    pub removed: usize,
    /// 删除失败、仍留在登记表中的规则数
    pub remaining: usize,
    pub failures: Vec<Error>,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// 守护模式达到 `max_cycles`
    Completed,
    /// 收到取消请求；单次模式总是以此结束
    Cancelled,
    Failed(Error),
}

#[derive(Debug)]
pub struct RunReport {
    pub cycles: u64,
    pub installed: usize,
    pub removed: usize,
    /// 运行过程中累积的非致命错误
    pub failures: Vec<Error>,
    pub teardown: TeardownReport,
    pub outcome: RunOutcome,
}

impl RunReport {
    /// 运行没有致命错误，且 teardown 清空了登记表
    pub fn is_clean(&self) -> bool {
        !matches!(self.outcome, RunOutcome::Failed(_)) && self.teardown.remaining == 0
    }
}

/// 本轮采样窗口。`Window` 模式下周期会比 interval 多出处理耗时；
/// `Period` 模式扣掉上一轮处理耗时，但不低于 [`MIN_WINDOW`]。
pub fn sampling_window(
    interval: Duration,
    mode: IntervalMode,
    last_processing: Duration,
) -> Duration {
    match mode {
        IntervalMode::Window => interval,
        IntervalMode::Period => interval.saturating_sub(last_processing).max(MIN_WINDOW),
    }
}

pub struct ControlLoop<C: Controller> {
    controller: C,
    opts: LoopOptions,
    sampler: TrafficSampler,
    phase: Phase,
    topology: Option<Topology>,
    /// 当前认为已安装的转发状态，作为下一轮差分的基准
    current: ForwardingState,
    installed: InstalledFlows,
    cycles: u64,
    installed_total: usize,
    removed_total: usize,
    failures: Vec<Error>,
    last_processing: Duration,
}

impl<C: Controller> ControlLoop<C> {
    pub fn new(controller: C, opts: LoopOptions) -> Self {
        let sampler = TrafficSampler::new(opts.retry);
        Self {
            controller,
            opts,
            sampler,
            phase: Phase::Init,
            topology: None,
            current: ForwardingState::default(),
            installed: InstalledFlows::default(),
            cycles: 0,
            installed_total: 0,
            removed_total: 0,
            failures: Vec::new(),
            last_processing: Duration::ZERO,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn topology(&self) -> Option<&Topology> {
        self.topology.as_ref()
    }

    pub fn current_state(&self) -> &ForwardingState {
        &self.current
    }

    pub fn installed(&self) -> &InstalledFlows {
        &self.installed
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    pub fn into_controller(self) -> C {
        self.controller
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "阶段切换");
        self.phase = phase;
    }

    /// 按 `mode` 跑完整个状态机；teardown 总会执行。
    #[tracing::instrument(skip(self, cancel))]
    pub fn run(&mut self, mode: RunMode, cancel: &CancelToken) -> RunReport {
        info!("▶️  控制回路启动");
        let outcome = match self.drive(mode, cancel) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "控制回路异常终止");
                RunOutcome::Failed(e)
            }
        };

        let teardown = self.teardown();
        self.enter(Phase::Terminated);
        info!(
            cycles = self.cycles,
            installed = self.installed_total,
            removed = self.removed_total,
            failures = self.failures.len(),
            outcome = ?outcome,
            "✅ 控制回路结束"
        );

        RunReport {
            cycles: self.cycles,
            installed: self.installed_total,
            removed: self.removed_total,
            failures: std::mem::take(&mut self.failures),
            teardown,
            outcome,
        }
    }

    fn drive(&mut self, mode: RunMode, cancel: &CancelToken) -> Result<RunOutcome> {
        self.init()?;
        self.install_initial()?;

        match mode {
            RunMode::Once => {
                self.hold(cancel);
                Ok(RunOutcome::Cancelled)
            }
            RunMode::Daemon => self.monitor(cancel),
        }
    }

    /// 单次模式：安装完成后等待取消
    fn hold(&self, cancel: &CancelToken) {
        info!("⏸️  规则已安装，等待停止信号");
        while !cancel.is_cancelled() {
            thread::sleep(self.opts.hold_poll);
        }
    }

    fn monitor(&mut self, cancel: &CancelToken) -> Result<RunOutcome> {
        let mut consecutive_failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                info!(cycles = self.cycles, "🛑 收到取消请求");
                return Ok(RunOutcome::Cancelled);
            }
            if self.opts.max_cycles.is_some_and(|max| self.cycles >= max) {
                info!(cycles = self.cycles, "达到最大周期数");
                return Ok(RunOutcome::Completed);
            }

            match self.run_cycle() {
                Ok(_) => consecutive_failures = 0,
                Err(e @ Error::CounterUnavailable { .. }) => {
                    consecutive_failures += 1;
                    warn!(
                        error = %e,
                        consecutive_failures,
                        limit = self.opts.max_sample_failures,
                        "采样失败，保持当前规则"
                    );
                    if consecutive_failures >= self.opts.max_sample_failures {
                        return Err(e);
                    }
                    self.failures.push(e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Init：获取拓扑快照
    #[tracing::instrument(skip(self))]
    pub fn init(&mut self) -> Result<()> {
        self.enter(Phase::Init);
        let doc = self.controller.topology_snapshot().map_err(|e| match e {
            Error::TopologyUnavailable(_) => e,
            other => Error::TopologyUnavailable(other.to_string()),
        })?;
        self.topology = Some(Topology::from_snapshot(&doc)?);
        Ok(())
    }

    /// Planning：在当前权重上计算最短路径并聚合为转发状态
    fn plan(&mut self) -> Result<ForwardingState> {
        let topo = self
            .topology
            .as_ref()
            .ok_or_else(|| Error::TopologyUnavailable("topology not loaded".into()))?;
        let paths = shortest_paths(topo);
        let plan = forwarding_state(topo, &paths);
        info!(
            paths = paths.len(),
            flows = plan.state.flow_count(),
            unresolved = plan.failures.len(),
            "🧭 规划完成"
        );
        self.failures.extend(plan.failures);
        Ok(plan.state)
    }

    /// Planning + Installing：初始状态相对空状态全部视为新增
    #[tracing::instrument(skip(self))]
    pub fn install_initial(&mut self) -> Result<ApplyReport> {
        self.enter(Phase::Planning);
        let state = self.plan()?;

        self.enter(Phase::Installing);
        let delta = diff(&state, &ForwardingState::default());
        Ok(self.apply(delta, state))
    }

    /// 一轮 MonitorWait -> Replanning -> Applying
    #[tracing::instrument(skip(self), fields(cycle = self.cycles + 1))]
    pub fn run_cycle(&mut self) -> Result<ApplyReport> {
        self.enter(Phase::MonitorWait);
        let window = self.window();
        let sample = self
            .sampler
            .sample(&mut self.controller, &self.current, window)?;
        let started = Instant::now();

        self.enter(Phase::Replanning);
        if let Some(topo) = self.topology.as_mut() {
            topo.apply_weights(&sample);
        }
        let state = self.plan()?;

        self.enter(Phase::Applying);
        let delta = diff(&state, &self.current);
        let report = self.apply(delta, state);

        self.cycles += 1;
        self.last_processing = started.elapsed();
        info!(
            cycle = self.cycles,
            window_ms = window.as_millis() as u64,
            processing_ms = self.last_processing.as_millis() as u64,
            installed = report.installed,
            removed = report.removed,
            failed = report.failed,
            "🔁 周期完成"
        );
        Ok(report)
    }

    fn window(&self) -> Duration {
        sampling_window(
            self.opts.interval,
            self.opts.interval_mode,
            self.last_processing,
        )
    }

    /// 先删后加；登记表只在调用成功后修改。
    ///
    /// 采用 `target` 作为新的基准，但扣掉安装失败的规则、保留删除失败的规则，
    /// 使基准与控制器上的实际状态一致，下一轮差分会重试它们。
    fn apply(&mut self, delta: FlowDiff, target: ForwardingState) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut basis = target;

        for key in &delta.to_remove {
            match self.delete(key) {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(error = %e, "规则删除失败，保留登记");
                    basis.insert(key);
                    report.failed += 1;
                    self.failures.push(e);
                }
            }
        }

        for key in &delta.to_add {
            match self.install(key) {
                Ok(()) => report.installed += 1,
                Err(e) => {
                    warn!(error = %e, "规则安装失败，不登记");
                    basis.remove(key);
                    report.failed += 1;
                    self.failures.push(e);
                }
            }
        }

        self.installed_total += report.installed;
        self.removed_total += report.removed;
        self.current = basis;
        report
    }

    fn install(&mut self, key: &FlowKey) -> Result<()> {
        let flow_id = key.flow_id();
        let payload = self.opts.template.render(&flow_id, key.port, &key.mac);
        self.controller
            .install_flow(&key.switch, &flow_id, &payload)
            .map_err(|e| Error::FlowApply {
                op: FlowOp::Install,
                switch: key.switch.clone(),
                flow_id: flow_id.clone(),
                reason: e.to_string(),
            })?;
        self.installed.record(key.clone());
        Ok(())
    }

    fn delete(&mut self, key: &FlowKey) -> Result<()> {
        let flow_id = key.flow_id();
        self.controller
            .delete_flow(&key.switch, &flow_id)
            .map_err(|e| Error::FlowApply {
                op: FlowOp::Delete,
                switch: key.switch.clone(),
                flow_id: flow_id.clone(),
                reason: e.to_string(),
            })?;
        self.installed.forget(key);
        Ok(())
    }

    /// Teardown：删除登记表中的全部规则，不可取消。
    ///
    /// 删除失败的规则留在登记表中，可以再次调用本函数重试。
    #[tracing::instrument(skip(self), fields(tracked = self.installed.len()))]
    pub fn teardown(&mut self) -> TeardownReport {
        self.enter(Phase::Teardown);
        let mut report = TeardownReport::default();

        for key in self.installed.to_vec() {
            match self.delete(&key) {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    error!(error = %e, "teardown 删除失败");
                    report.failures.push(e);
                }
            }
        }

        self.removed_total += report.removed;
        // 基准只保留仍被登记的规则
        let mut basis = ForwardingState::default();
        for key in self.installed.iter() {
            basis.insert(key);
        }
        self.current = basis;
        report.remaining = self.installed.len();
        info!(
            removed = report.removed,
            remaining = report.remaining,
            "🧹 teardown 完成"
        );
        report
    }
}
