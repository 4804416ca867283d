use std::collections::BTreeSet;
use std::time::Duration;

use super::support::{Call, FakeController, diamond, fid, line, mac, sw};
use crate::config::IntervalMode;
use crate::control::{
    CancelToken, ControlLoop, LoopOptions, MIN_WINDOW, Phase, RetryPolicy, RunMode, RunOutcome,
    sampling_window,
};
use crate::error::{Error, FlowOp};
use crate::flow::{FlowKey, FlowTemplate};

fn fast_opts() -> LoopOptions {
    LoopOptions {
        interval: Duration::ZERO,
        interval_mode: IntervalMode::Window,
        retry: RetryPolicy {
            max_attempts: 2,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
        },
        max_sample_failures: 2,
        max_cycles: None,
        hold_poll: Duration::from_millis(1),
        template: FlowTemplate::default(),
    }
}

fn cancelled() -> CancelToken {
    let token = CancelToken::new();
    token.cancel();
    token
}

fn flow_ids(calls: &[&Call]) -> BTreeSet<String> {
    calls
        .iter()
        .filter_map(|c| match c {
            Call::Install { flow_id, .. } | Call::Delete { flow_id, .. } => Some(flow_id.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn missing_topology_fails_fast_without_installing() {
    let mut control = ControlLoop::new(FakeController::default(), fast_opts());
    let report = control.run(RunMode::Daemon, &CancelToken::new());

    assert!(matches!(
        report.outcome,
        RunOutcome::Failed(Error::TopologyUnavailable(_))
    ));
    assert_eq!(report.installed, 0);
    assert_eq!(report.teardown.removed, 0);
    assert!(control.controller().installs().is_empty());
    assert_eq!(control.phase(), Phase::Terminated);
    assert!(!report.is_clean());
}

#[test]
fn once_mode_installs_everything_then_tears_down_on_cancel() {
    let ctl = FakeController::with_snapshot(&line());
    let mut control = ControlLoop::new(ctl, fast_opts());
    let report = control.run(RunMode::Once, &cancelled());

    assert!(matches!(report.outcome, RunOutcome::Cancelled));
    assert_eq!(report.cycles, 0);
    assert_eq!(report.installed, 4);
    assert_eq!(report.teardown.removed, 4);
    assert_eq!(report.teardown.remaining, 0);
    assert!(report.is_clean());

    let ctl = control.controller();
    assert_eq!(flow_ids(&ctl.installs()), flow_ids(&ctl.deletes()));
    assert!(ctl.flows.is_empty());
    assert_eq!(ctl.counter_reads(), 0);
    assert!(control.installed().is_empty());
}

#[test]
fn installs_use_deterministic_ids_and_templated_payloads() {
    let ctl = FakeController::with_snapshot(&line());
    let mut control = ControlLoop::new(ctl, fast_opts());
    control.init().expect("init");
    let report = control.install_initial().expect("install");
    assert_eq!(report.installed, 4);
    assert_eq!(control.phase(), Phase::Installing);

    let key = (sw(1), fid(2, 1, 2));
    let payload = control.controller().flows.get(&key).expect("s1 -> h2 rule");
    assert!(payload.contains("<output-node-connector>2</output-node-connector>"));
    assert!(payload.contains(&format!("<address>{}</address>", mac(2))));
    assert!(
        control
            .installed()
            .contains(&FlowKey::new(sw(1), mac(2), 2))
    );
}

#[test]
fn failed_install_is_not_tracked() {
    let mut ctl = FakeController::with_snapshot(&line());
    ctl.fail_install.insert(fid(2, 1, 2));
    let mut control = ControlLoop::new(ctl, fast_opts());
    let report = control.run(RunMode::Once, &cancelled());

    assert_eq!(report.installed, 3);
    assert_eq!(report.teardown.removed, 3);
    assert!(report.failures.iter().any(|e| matches!(
        e,
        Error::FlowApply {
            op: FlowOp::Install,
            ..
        }
    )));
    let deleted = flow_ids(&control.controller().deletes());
    assert!(!deleted.contains(&fid(2, 1, 2)));
}

#[test]
fn failed_teardown_delete_stays_tracked_for_retry() {
    let mut ctl = FakeController::with_snapshot(&line());
    ctl.fail_delete.insert(fid(1, 2, 2));
    let mut control = ControlLoop::new(ctl, fast_opts());
    let report = control.run(RunMode::Once, &cancelled());

    assert_eq!(report.teardown.removed, 3);
    assert_eq!(report.teardown.remaining, 1);
    assert_eq!(report.teardown.failures.len(), 1);
    assert!(!report.is_clean());
    assert!(
        control
            .installed()
            .contains(&FlowKey::new(sw(2), mac(1), 2))
    );
    // 差分基准与登记表保持一致
    assert_eq!(control.current_state().flow_count(), 1);
    assert!(
        control
            .current_state()
            .contains(&FlowKey::new(sw(2), mac(1), 2))
    );

    control.controller_mut().fail_delete.clear();
    let retry = control.teardown();
    assert_eq!(retry.removed, 1);
    assert_eq!(retry.remaining, 0);
    assert!(control.installed().is_empty());
    assert_eq!(control.current_state().flow_count(), 0);
    assert!(control.controller().flows.is_empty());
}

#[test]
fn daemon_with_steady_traffic_reaches_fixed_point() {
    let ctl = FakeController::with_snapshot(&line());
    let mut opts = fast_opts();
    opts.max_cycles = Some(3);
    let mut control = ControlLoop::new(ctl, opts);
    let report = control.run(RunMode::Daemon, &CancelToken::new());

    assert!(matches!(report.outcome, RunOutcome::Completed));
    assert_eq!(report.cycles, 3);
    // 初始安装之后不再有增删
    assert_eq!(report.installed, 4);
    assert_eq!(report.removed, 4);
    assert_eq!(control.controller().installs().len(), 4);
    assert_eq!(control.controller().counter_reads(), 3 * 2 * 4);
}

#[test]
fn daemon_honors_cancellation_at_loop_boundary() {
    let ctl = FakeController::with_snapshot(&line());
    let mut control = ControlLoop::new(ctl, fast_opts());
    let report = control.run(RunMode::Daemon, &cancelled());

    assert!(matches!(report.outcome, RunOutcome::Cancelled));
    assert_eq!(report.cycles, 0);
    assert_eq!(report.teardown.removed, 4);
    assert_eq!(control.controller().counter_reads(), 0);
}

#[test]
fn heavy_traffic_moves_route_and_teardown_matches_final_set() {
    let ctl = FakeController::with_snapshot(&diamond());
    let mut control = ControlLoop::new(ctl, fast_opts());
    control.init().expect("init");
    control.install_initial().expect("install");

    // 找到 h1 -> h2 当前在 s1 上使用的分支端口
    let first_port = [2, 3]
        .into_iter()
        .find(|&p| {
            control
                .current_state()
                .contains(&FlowKey::new(sw(1), mac(2), p))
        })
        .expect("h2 is routed through s1");
    let other_port = if first_port == 2 { 3 } else { 2 };
    let first_branch = if first_port == 2 { 2 } else { 3 };
    let other_branch = if first_port == 2 { 3 } else { 2 };

    control
        .controller_mut()
        .script(fid(2, 1, first_port), &[Some(0), Some(1_000)]);
    let report = control.run_cycle().expect("cycle");

    assert_eq!(report.removed, 2);
    assert_eq!(report.installed, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(control.phase(), Phase::Applying);

    let state = control.current_state();
    assert!(!state.contains(&FlowKey::new(sw(1), mac(2), first_port)));
    assert!(state.contains(&FlowKey::new(sw(1), mac(2), other_port)));
    assert!(!state.contains(&FlowKey::new(sw(first_branch), mac(2), 2)));
    assert!(state.contains(&FlowKey::new(sw(other_branch), mac(2), 2)));

    // 删除必须先于新增
    let calls = &control.controller().calls;
    let last_delete = calls
        .iter()
        .rposition(|c| matches!(c, Call::Delete { .. }))
        .expect("deletes issued");
    let first_new_install = calls
        .iter()
        .position(|c| matches!(c, Call::Install { flow_id, .. } if *flow_id == fid(2, 1, other_port)))
        .expect("new branch installed");
    assert!(last_delete < first_new_install);

    let tracked: BTreeSet<String> = control.installed().iter().map(FlowKey::flow_id).collect();
    let deletes_before = control.controller().deletes().len();
    let teardown = control.teardown();
    assert_eq!(teardown.removed, tracked.len());

    let teardown_deletes: BTreeSet<String> = control.controller().deletes()[deletes_before..]
        .iter()
        .filter_map(|c| match c {
            Call::Delete { flow_id, .. } => Some(flow_id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(teardown_deletes, tracked);
    assert!(teardown_deletes.contains(&fid(2, 1, other_port)));
    assert!(!teardown_deletes.contains(&fid(2, 1, first_port)));
    assert!(control.installed().is_empty());
    assert!(control.controller().flows.is_empty());
}

#[test]
fn repeated_sampling_failures_stop_daemon_but_still_tear_down() {
    let mut ctl = FakeController::with_snapshot(&line());
    ctl.unavailable.insert(fid(2, 1, 2));
    let mut control = ControlLoop::new(ctl, fast_opts());
    let report = control.run(RunMode::Daemon, &CancelToken::new());

    assert!(matches!(
        report.outcome,
        RunOutcome::Failed(Error::CounterUnavailable { .. })
    ));
    assert_eq!(report.cycles, 0);
    // 第一次失败累积为非致命错误，第二次终止
    assert_eq!(
        report
            .failures
            .iter()
            .filter(|e| matches!(e, Error::CounterUnavailable { .. }))
            .count(),
        1
    );
    assert_eq!(report.teardown.removed, 4);
    assert!(control.installed().is_empty());
}

#[test]
fn single_sampling_gap_does_not_stop_daemon() {
    let mut ctl = FakeController::with_snapshot(&line());
    // 第一轮起点读取两次都不可用，之后恢复
    ctl.script(fid(2, 1, 2), &[None, None]);
    let mut opts = fast_opts();
    opts.max_cycles = Some(2);
    let mut control = ControlLoop::new(ctl, opts);
    let report = control.run(RunMode::Daemon, &CancelToken::new());

    assert!(matches!(report.outcome, RunOutcome::Completed));
    assert_eq!(report.cycles, 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.is_clean());
}

#[test]
fn failed_removal_during_apply_is_retried_next_cycle() {
    let ctl = FakeController::with_snapshot(&diamond());
    let mut control = ControlLoop::new(ctl, fast_opts());
    control.init().expect("init");
    control.install_initial().expect("install");

    let first_port = [2, 3]
        .into_iter()
        .find(|&p| {
            control
                .current_state()
                .contains(&FlowKey::new(sw(1), mac(2), p))
        })
        .expect("h2 is routed through s1");
    let stale = fid(2, 1, first_port);
    control.controller_mut().fail_delete.insert(stale.clone());
    control
        .controller_mut()
        .script(stale.clone(), &[Some(0), Some(1_000)]);

    let report = control.run_cycle().expect("cycle");
    assert_eq!(report.failed, 1);
    // 删除失败的规则仍被登记，也仍在基准状态中
    let stale_key = FlowKey::new(sw(1), mac(2), first_port);
    assert!(control.installed().contains(&stale_key));
    assert!(control.current_state().contains(&stale_key));

    control.controller_mut().fail_delete.clear();
    control
        .controller_mut()
        .script(stale.clone(), &[Some(1_000), Some(2_000)]);
    let report = control.run_cycle().expect("cycle");
    assert_eq!(report.failed, 0);
    assert!(!control.installed().contains(&stale_key));
}

#[test]
fn window_mode_keeps_full_interval() {
    let interval = Duration::from_millis(1_000);
    let w = sampling_window(interval, IntervalMode::Window, Duration::from_millis(300));
    assert_eq!(w, interval);
}

#[test]
fn period_mode_subtracts_processing_time() {
    let interval = Duration::from_millis(1_000);
    assert_eq!(
        sampling_window(interval, IntervalMode::Period, Duration::ZERO),
        interval
    );
    assert_eq!(
        sampling_window(interval, IntervalMode::Period, Duration::from_millis(300)),
        Duration::from_millis(700)
    );
}

#[test]
fn period_mode_window_never_drops_below_floor() {
    let interval = Duration::from_millis(100);
    assert_eq!(
        sampling_window(interval, IntervalMode::Period, Duration::from_millis(100)),
        MIN_WINDOW
    );
    assert_eq!(
        sampling_window(interval, IntervalMode::Period, Duration::from_secs(5)),
        MIN_WINDOW
    );
    assert_eq!(MIN_WINDOW, Duration::from_millis(1));
}

#[test]
fn daemon_runs_in_period_mode() {
    let ctl = FakeController::with_snapshot(&line());
    let mut opts = fast_opts();
    opts.interval = Duration::from_millis(5);
    opts.interval_mode = IntervalMode::Period;
    opts.max_cycles = Some(2);
    let mut control = ControlLoop::new(ctl, opts);
    let report = control.run(RunMode::Daemon, &CancelToken::new());

    assert!(matches!(report.outcome, RunOutcome::Completed));
    assert_eq!(report.cycles, 2);
    assert!(report.is_clean());
}
