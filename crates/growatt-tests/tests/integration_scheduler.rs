// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Scheduler Integration Tests
//!
//! Periodic polling, refresh coalescing, and failure backoff.

use std::sync::Arc;
use std::time::Duration;

use growatt_modbus::{Coordinator, PollScheduler, RegisterDescriptor};
use growatt_tests::prelude::*;
use tokio::sync::oneshot;

fn coordinator() -> (MockDevice, Arc<Coordinator>) {
    init_test_logging();
    let device = MockDevice::new();
    device.set_input(3, 2345).set_holding(3, 80);
    let coordinator = device
        .coordinator(vec![
            RegisterDescriptor::input("pv1_voltage", 3).with_scale(0.1),
            RegisterDescriptor::holding("active_power_rate", 3),
        ])
        .unwrap();
    (device, Arc::new(coordinator))
}

#[tokio::test]
async fn test_scheduler_first_cycle_immediate_then_periodic() {
    let (_device, coordinator) = coordinator();
    let scheduler = PollScheduler::new(Arc::clone(&coordinator), Duration::from_millis(30));
    let health = scheduler.health();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(scheduler.run(async {
        let _ = stopped.await;
    }));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(health.cycles_ok(), 1);
    assert!(coordinator.first_poll_done().await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(health.cycles_ok() >= 3);
    assert!(health.last_success_at().is_some());

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler should stop")
        .unwrap();
}

#[tokio::test]
async fn test_scheduler_coalesces_refresh_requests() {
    let (_device, coordinator) = coordinator();
    let scheduler = PollScheduler::new(Arc::clone(&coordinator), Duration::from_secs(60));
    let health = scheduler.health();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(scheduler.run(async {
        let _ = stopped.await;
    }));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(health.cycles_ok(), 1);

    coordinator.request_refresh();
    coordinator.request_refresh();
    coordinator.request_refresh();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(health.cycles_ok(), 2);

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_scheduler_write_triggers_refresh() {
    let (device, coordinator) = coordinator();
    let scheduler = PollScheduler::new(Arc::clone(&coordinator), Duration::from_secs(60));
    let health = scheduler.health();

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(scheduler.run(async {
        let _ = stopped.await;
    }));

    tokio::time::sleep(Duration::from_millis(20)).await;
    device.set_input(3, 2400);
    assert!(coordinator.write_single_register(3, 50).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(health.cycles_ok(), 2);
    assert_close(coordinator.value("pv1_voltage"), 240.0);
    assert_close(coordinator.value("active_power_rate"), 50.0);

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_scheduler_backoff_on_failure() {
    let (device, coordinator) = coordinator();
    let scan = Duration::from_secs(10);
    let scheduler = PollScheduler::new(Arc::clone(&coordinator), scan)
        .with_failure_backoff_max(Duration::from_secs(25));
    let health = scheduler.health();

    assert_eq!(scheduler.run_cycle().await, scan);

    device.fail_all_reads(Fault::Timeout);
    let first = scheduler.run_cycle().await;
    let second = scheduler.run_cycle().await;
    let third = scheduler.run_cycle().await;

    assert!(first >= Duration::from_secs(9) && first <= Duration::from_secs(11));
    assert!(second >= Duration::from_secs(18) && second <= Duration::from_secs(22));
    assert!(third >= Duration::from_millis(22_500) && third <= Duration::from_millis(27_500));
    assert_eq!(health.consecutive_failures(), 3);
    assert_eq!(health.cycles_failed(), 3);
    assert!(health.last_error().is_some());
    assert!(!coordinator.last_update_success());

    device.clear_faults();
    assert_eq!(scheduler.run_cycle().await, scan);
    assert_eq!(health.consecutive_failures(), 0);
    assert!(coordinator.last_update_success());
}

#[tokio::test]
async fn test_scheduler_stops_immediately_when_shutdown_ready() {
    let (device, coordinator) = coordinator();
    let scheduler = PollScheduler::new(coordinator, Duration::from_millis(10));

    scheduler.run(std::future::ready(())).await;

    assert!(device.reads().is_empty());
}
