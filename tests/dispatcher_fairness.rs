use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use valet_parking::models::{ShiftWindow, TaskType, ValetStatus};
use valet_parking::repositories::InMemoryStore;
use valet_parking::services::ValetDispatcher;
use valet_parking::utils::clock::ManualClock;
use valet_parking::utils::errors::AppError;

fn ist() -> FixedOffset {
    FixedOffset::east_opt(330 * 60).unwrap()
}

#[tokio::test]
async fn test_round_robin_spread_over_many_assignments() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 6, 0, 0).unwrap());
    let dispatcher = ValetDispatcher::new(Arc::new(InMemoryStore::new()), Arc::new(clock), ist());

    for i in 0..7 {
        dispatcher
            .onboard(&format!("V{}", i), &format!("70000000{:02}", i), None)
            .await
            .unwrap();
    }

    let mut seen: HashMap<Uuid, u32> = HashMap::new();
    for _ in 0..500 {
        let valet = dispatcher.assign(TaskType::Parking).await.unwrap();
        *seen.entry(valet.id).or_default() += 1;
        dispatcher.complete(valet.id).await.unwrap();
    }

    let counts: Vec<u32> = seen.values().copied().collect();
    assert_eq!(counts.len(), 7);
    assert!(counts.iter().max().unwrap() - counts.iter().min().unwrap() <= 1);

    for valet in dispatcher.list_valets().await.unwrap() {
        assert_eq!(valet.status, ValetStatus::Free);
        assert_eq!(valet.today_count, seen[&valet.id]);
        assert_eq!(valet.total_count, u64::from(seen[&valet.id]));
    }
}

#[tokio::test]
async fn test_busy_valets_are_never_handed_out_twice() {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 6, 0, 0).unwrap());
    let dispatcher = ValetDispatcher::new(Arc::new(InMemoryStore::new()), Arc::new(clock), ist());
    for i in 0..3 {
        dispatcher
            .onboard(&format!("V{}", i), &format!("70000000{:02}", i), None)
            .await
            .unwrap();
    }

    let mut held = Vec::new();
    for _ in 0..3 {
        held.push(dispatcher.assign(TaskType::Retrieval).await.unwrap().id);
    }
    held.sort();
    held.dedup();
    assert_eq!(held.len(), 3);

    match dispatcher.assign(TaskType::Retrieval).await {
        Err(AppError::NoAvailableValet(report)) => {
            assert_eq!(report.busy, 3);
            assert_eq!(report.eligible, 0);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_night_shift_follows_local_time() {
    // 17:00 UTC = 22:30 IST
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 17, 0, 0).unwrap());
    let dispatcher =
        ValetDispatcher::new(Arc::new(InMemoryStore::new()), Arc::new(clock.clone()), ist());

    let night = ShiftWindow::new(
        NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
    );
    let day = ShiftWindow::new(
        NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
    );
    let night_valet = dispatcher.onboard("Night", "8000000001", Some(night)).await.unwrap();
    let day_valet = dispatcher.onboard("Day", "8000000002", Some(day)).await.unwrap();

    let assigned = dispatcher.assign(TaskType::Parking).await.unwrap();
    assert_eq!(assigned.id, night_valet.id);
    dispatcher.complete(assigned.id).await.unwrap();

    // 03:00 UTC = 08:30 IST
    clock.advance(Duration::hours(10));
    let assigned = dispatcher.assign(TaskType::Parking).await.unwrap();
    assert_eq!(assigned.id, day_valet.id);

    let report = dispatcher.availability_report().await.unwrap();
    assert_eq!(report.out_of_shift, 1);
}
