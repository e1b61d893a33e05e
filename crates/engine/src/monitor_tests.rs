// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pcs_core::EventBus;
use pcs_exec::ScriptedExecutor;

const DF_ROOMY: &str = "\
Filesystem      1B-blocks       Used   Available Use% Mounted on
/dev/sda2    100000000000 20000000000 80000000000  20% /
";

const DF_FULL: &str = "\
Filesystem      1B-blocks       Used   Available Use% Mounted on
/dev/sda2    100000000000 99000000000  1000000000  99% /
";

fn watchdog_with(
    source_df: &str,
    target_df: &str,
) -> (DiskWatchdog, tokio::sync::mpsc::UnboundedReceiver<pcs_core::Event>) {
    let source = ScriptedExecutor::new(Host::Source);
    let target = ScriptedExecutor::new(Host::Target);
    source.respond("df -B1 /", 0, source_df, "");
    target.respond("df -B1 /", 0, target_df, "");
    let bus = EventBus::new();
    let events = bus.subscribe();
    let watchdog = DiskWatchdog::spawn(
        Arc::new(source),
        Arc::new(target),
        "/".to_string(),
        Threshold::Percent(15),
        Duration::from_millis(5),
        bus,
    );
    (watchdog, events)
}

#[tokio::test]
async fn healthy_hosts_never_breach() {
    let (watchdog, _events) = watchdog_with(DF_ROOMY, DF_ROOMY);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(watchdog.breach().is_none());
    watchdog.stop().await;
}

#[tokio::test]
async fn breach_latches_a_message_and_publishes_critical() {
    let (watchdog, mut events) = watchdog_with(DF_ROOMY, DF_FULL);

    let mut waited = 0;
    while watchdog.breach().is_none() && waited < 200 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += 1;
    }
    let breach = watchdog.breach().unwrap();
    assert!(breach.contains("below runtime minimum"));
    assert!(breach.contains("target"));

    let mut saw_critical = false;
    while let Ok(event) = events.try_recv() {
        if let pcs_core::Event::Log(log) = event {
            if log.level == LogLevel::Critical {
                saw_critical = true;
            }
        }
    }
    assert!(saw_critical);
    watchdog.stop().await;
}

#[tokio::test]
async fn failed_probe_is_not_a_breach() {
    let source = ScriptedExecutor::new(Host::Source);
    let target = ScriptedExecutor::new(Host::Target);
    source.respond("df -B1 /", 1, "", "df: not available");
    target.respond("df -B1 /", 1, "", "df: not available");
    let watchdog = DiskWatchdog::spawn(
        Arc::new(source),
        Arc::new(target),
        "/".to_string(),
        Threshold::Percent(15),
        Duration::from_millis(5),
        EventBus::new(),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(watchdog.breach().is_none());
    watchdog.stop().await;
}

#[tokio::test]
async fn stop_cancels_the_loop() {
    let (watchdog, _events) = watchdog_with(DF_ROOMY, DF_ROOMY);
    watchdog.stop().await;
}
