//! 流量采样
//!
//! 对转发状态中的每个 (switch, port)，把该端口上所有 MAC 规则的包计数求和，
//! 在窗口开始和结束各读一次，差值即为该端口出边的新权重（至少为 1）。
//! 采样只产出权重，不修改拓扑。

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use super::controller::Controller;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::flow::{FlowKey, ForwardingState, WeightSample};
use crate::net::PortNo;
use tracing::{debug, trace};

/// 计数器读取的有界重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            delay: Duration::from_millis(cfg.delay_ms),
            timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }
}

/// 计数差值 -> 权重；零流量映射为 1，保证边仍可被最短路径使用。
pub fn weight_from_counts(start: u64, end: u64) -> u64 {
    end.saturating_sub(start).max(1)
}

#[derive(Debug, Clone, Default)]
pub struct TrafficSampler {
    retry: RetryPolicy,
}

impl TrafficSampler {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// 在 `window` 时长内采样 `state` 中每个端口的流量
    #[tracing::instrument(skip(self, ctl, state), fields(window_ms = window.as_millis() as u64))]
    pub fn sample<C: Controller>(
        &self,
        ctl: &mut C,
        state: &ForwardingState,
        window: Duration,
    ) -> Result<WeightSample> {
        let start = self.read_totals(ctl, state)?;
        trace!(ports = start.len(), "窗口起点计数已读取");

        thread::sleep(window);

        let end = self.read_totals(ctl, state)?;
        let mut sample = WeightSample::default();
        for ((sw, port), &before) in &start {
            let after = end.get(&(sw.clone(), *port)).copied().unwrap_or(before);
            sample.insert(sw.clone(), *port, weight_from_counts(before, after));
        }

        debug!(ports = sample.len(), "📈 采样完成");
        Ok(sample)
    }

    fn read_totals<C: Controller>(
        &self,
        ctl: &mut C,
        state: &ForwardingState,
    ) -> Result<BTreeMap<(String, PortNo), u64>> {
        let mut totals = BTreeMap::new();
        for (sw, port, macs) in state.entries() {
            let mut sum = 0u64;
            for mac in macs {
                let key = FlowKey::new(sw, mac.clone(), port);
                sum = sum.saturating_add(self.read_counter(ctl, &key)?);
            }
            totals.insert((sw.to_string(), port), sum);
        }
        Ok(totals)
    }

    /// 读取单条规则的包计数，按重试策略等待其可用。
    ///
    /// 重试用尽时：最后一次是“暂不可用”则返回 `CounterUnavailable`，
    /// 是控制器错误则返回该错误。
    pub fn read_counter<C: Controller>(&self, ctl: &mut C, key: &FlowKey) -> Result<u64> {
        let flow_id = key.flow_id();
        let started = Instant::now();
        let mut attempts = 0u32;
        let mut last_error = None;

        loop {
            attempts += 1;
            match ctl.flow_packet_count(&key.switch, &flow_id) {
                Ok(Some(count)) => return Ok(count),
                Ok(None) => {
                    trace!(flow_id = %flow_id, attempts, "计数器暂不可用");
                    last_error = None;
                }
                Err(e) => {
                    debug!(flow_id = %flow_id, attempts, error = %e, "计数器读取失败");
                    last_error = Some(e);
                }
            }

            if attempts >= self.retry.max_attempts
                || started.elapsed() + self.retry.delay > self.retry.timeout
            {
                // 最后一次是控制器报错（认证、服务端故障）时原样上报
                return Err(last_error.unwrap_or(Error::CounterUnavailable {
                    switch: key.switch.clone(),
                    flow_id,
                    attempts,
                }));
            }
            thread::sleep(self.retry.delay);
        }
    }
}
