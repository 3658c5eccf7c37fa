//! Full pipeline tests: in-memory log -> reader -> monitor -> session.

use std::time::Duration;

use skitime::audit::{AuditEntry, Severity};
use skitime::transports::{MemoryLog, MemoryTransport};
use skitime::{MonitorStatus, Race, RegistrySnapshot, Settings, Skitime, TimingError};
use tokio::sync::broadcast;

fn settings(names: &[&str]) -> Settings {
    let mut settings = Settings::default();
    settings.timers.names = names.iter().map(|n| n.to_string()).collect();
    settings.audit.enabled = false;
    settings.reader.reconnect_backoff_ms = 1000;
    settings
}

fn line(second: u32, message: &str) -> String {
    format!("[10:00:{:02}] [Server thread/INFO]: [@] {}\n", second, message)
}

async fn start(log: &MemoryLog, names: &[&str]) -> Race {
    Skitime::start(MemoryTransport::new(log.clone()), &settings(names))
        .await
        .expect("memory log connects")
}

async fn wait_for(race: &Race, f: impl FnMut(&RegistrySnapshot) -> bool) -> RegistrySnapshot {
    let mut snapshots = race.session.snapshots();
    let snapshot = snapshots.wait_for(f).await.expect("session alive").clone();
    snapshot
}

async fn audit_until(audit: &mut broadcast::Receiver<AuditEntry>, text: &str) -> AuditEntry {
    loop {
        let entry = audit.recv().await.expect("audit stream open");
        if entry.text.contains(text) {
            return entry;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn start_phrase_starts_the_named_timer() {
    let log = MemoryLog::new();
    let race = start(&log, &["Иванов", "Петров"]).await;

    log.append(&line(1, "Иванов стартовал"));
    let snapshot = wait_for(&race, |s| s.processed == 1).await;

    let ivanov = snapshot.registry.find_by_name("Иванов").unwrap();
    assert!(ivanov.is_running());
    assert!(!snapshot.registry.find_by_name("Петров").unwrap().is_running());
    assert_eq!(snapshot.ignored, 0);
    race.stop().await;
}

#[tokio::test(start_paused = true)]
async fn disqualification_is_ignored_without_state_change() {
    let log = MemoryLog::new();
    let race = start(&log, &["Иванов"]).await;

    log.append(&line(1, "Иванов дисквалифицирован"));
    let snapshot = wait_for(&race, |s| s.ignored == 1).await;

    assert_eq!(snapshot.processed, 0);
    let ivanov = snapshot.registry.find_by_name("Иванов").unwrap();
    assert!(!ivanov.is_running());
    assert_eq!(ivanov.lap_count(), 0);
    race.stop().await;
}

#[tokio::test(start_paused = true)]
async fn finish_phrase_records_final_lap_then_stops() {
    let log = MemoryLog::new();
    let race = start(&log, &["Иванов"]).await;

    log.append(&line(1, "Иванов стартовал"));
    wait_for(&race, |s| s.processed == 1).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    log.append(&line(4, "Иванов финишировал"));
    let snapshot = wait_for(&race, |s| s.processed == 2).await;

    let ivanov = snapshot.registry.find_by_name("Иванов").unwrap();
    assert_eq!(ivanov.lap_count(), 1);
    assert!(!ivanov.is_running());
    race.stop().await;
}

#[tokio::test(start_paused = true)]
async fn lap_for_everyone_only_touches_running_timers() {
    let log = MemoryLog::new();
    let mut race = start(&log, &["Иванов", "Петров", "Сидоров"]).await;

    log.append(&line(1, "Иванов стартовал"));
    log.append(&line(2, "Петров стартовал"));
    wait_for(&race, |s| s.processed == 2).await;

    log.append(&line(3, "круг всех"));
    let entry = audit_until(&mut race.session.audit, "lap for").await;
    assert_eq!(entry.text, "lap for 2 timers");
    assert_eq!(entry.severity, Severity::Success);

    let snapshot = wait_for(&race, |s| s.processed == 3).await;
    let laps: Vec<usize> = snapshot.registry.iter().map(|t| t.lap_count()).collect();
    assert_eq!(laps, vec![1, 1, 0]);
    race.stop().await;
}

#[tokio::test(start_paused = true)]
async fn numbered_lap_is_reported_in_the_audit_trail() {
    let log = MemoryLog::new();
    let mut race = start(&log, &["Иванов"]).await;

    log.append(&line(1, "старт Иванов"));
    log.append(&line(2, "Иванов прошел 2 круг"));
    let entry = audit_until(&mut race.session.audit, "Lap 2").await;
    assert!(entry.text.starts_with("Lap 2: Иванов"));
    race.stop().await;
}

#[tokio::test(start_paused = true)]
async fn rotation_rereads_the_new_file_from_the_start() {
    let log = MemoryLog::new();
    let race = start(&log, &["Иванов"]).await;

    log.append(&line(1, "болельщики на трибуне"));
    log.append(&line(2, "ещё одно длинное сообщение с трибуны"));
    wait_for(&race, |s| s.messages == 2).await;

    log.rotate(&line(3, "Иванов стартовал"));
    let snapshot = wait_for(&race, |s| s.processed == 1).await;
    assert!(snapshot.registry.find_by_name("Иванов").unwrap().is_running());
    race.stop().await;
}

#[tokio::test(start_paused = true)]
async fn legacy_encoded_lines_are_decoded() {
    let log = MemoryLog::new();
    let race = start(&log, &["Иванов"]).await;

    let text = line(1, "Иванов стартовал");
    let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(&text);
    log.append_bytes(&bytes);
    let snapshot = wait_for(&race, |s| s.processed == 1).await;
    assert!(snapshot.registry.find_by_name("Иванов").unwrap().is_running());
    race.stop().await;
}

#[tokio::test(start_paused = true)]
async fn lost_log_file_becomes_a_fatal_condition() {
    let log = MemoryLog::new();
    let mut race = start(&log, &["Иванов"]).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    log.delete();
    let entry = audit_until(&mut race.session.audit, "Monitoring stopped").await;
    assert_eq!(entry.severity, Severity::Error);

    let snapshot = wait_for(&race, |s| s.fatal.is_some()).await;
    assert!(snapshot.fatal.unwrap().contains("3 attempts"));
    assert!(matches!(*race.monitor.borrow(), MonitorStatus::Failed(_)));

    let session = race.stop().await.expect("session returns");
    assert_eq!(session.registry().len(), 1);
}

#[tokio::test]
async fn first_connect_reports_authentication_failure() {
    let log = MemoryLog::new();
    log.reject_auth(true);
    let result = Skitime::start(MemoryTransport::new(log.clone()), &settings(&["Иванов"])).await;
    let err = result.err().expect("connect must fail");
    assert!(matches!(err, TimingError::Authentication { .. }));
    assert!(err.is_connection_error());
}
