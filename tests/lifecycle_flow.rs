use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use valet_parking::config::EnvironmentConfig;
use valet_parking::models::{CustomerType, MarkOutSource, ValetStatus, Vehicle, VehicleState};
use valet_parking::repositories::{InMemoryStore, Stores, VehicleRepository};
use valet_parking::services::{
    EntryRequest, MarkOutScheduler, ValetDispatcher, VehicleLifecycle, ZoneAllocator,
};
use valet_parking::utils::clock::{Clock, ManualClock};
use valet_parking::utils::errors::{AppError, AppResult};

fn start_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 4, 4, 30, 0).unwrap())
}

async fn setup(stores: Stores, slots: u32, valets: usize) -> (VehicleLifecycle, ManualClock) {
    let clock = start_clock();
    let lifecycle =
        VehicleLifecycle::from_config(&stores, &EnvironmentConfig::default(), Arc::new(clock.clone())).unwrap();
    lifecycle.zones().create_zone("A", "Ground floor", None, slots, 1).await.unwrap();
    for i in 0..valets {
        lifecycle
            .valets()
            .onboard(&format!("V{}", i + 1), &format!("99000000{:02}", i), None)
            .await
            .unwrap();
    }
    (lifecycle, clock)
}

fn entry(plate: &str) -> EntryRequest {
    EntryRequest {
        plate_number: plate.to_string(),
        phone_number: "9876543210".to_string(),
        customer_type: CustomerType::Regular,
        entry_operator_id: "gate-1".to_string(),
    }
}

#[tokio::test]
async fn test_full_valet_cycle_with_one_slot_and_one_valet() {
    let (lifecycle, clock) = setup(Stores::in_memory(), 1, 1).await;

    let entered_at = clock.now();
    let created = lifecycle.create_entry(entry("KL01AB0001")).await.unwrap();
    let id = created.vehicle.id;
    assert_eq!(created.vehicle.zone_code.as_deref(), Some("A"));
    let valet_id = created.vehicle.parking_valet_id.unwrap();
    assert_eq!(lifecycle.valets().find(valet_id).await.unwrap().status, ValetStatus::Busy);

    let err = lifecycle.create_entry(entry("KL01AB0002")).await.unwrap_err();
    assert!(matches!(err, AppError::NoCapacity));

    lifecycle.mark_parked(id).await.unwrap();
    assert_eq!(lifecycle.valets().find(valet_id).await.unwrap().status, ValetStatus::Free);

    let scheduled = lifecycle
        .request_markout(id, Some(5), MarkOutSource::Whatsapp)
        .await
        .unwrap()
        .vehicle;
    assert_eq!(scheduled.state, VehicleState::Scheduled);
    assert_eq!(scheduled.scheduled_at, Some(entered_at + Duration::minutes(5)));

    clock.advance(Duration::minutes(4));
    let err = lifecycle.start_retrieval(id).await.unwrap_err();
    assert!(matches!(err, AppError::RetrievalTooEarly { .. }));

    clock.advance(Duration::minutes(1));
    let on_the_way = lifecycle.start_retrieval(id).await.unwrap().vehicle;
    assert_eq!(on_the_way.state, VehicleState::OnTheWay);
    let retrieval_valet = on_the_way.retrieval_valet_id.unwrap();

    clock.advance(Duration::minutes(3));
    let delivered = lifecycle.mark_delivered(id).await.unwrap();
    assert_eq!(delivered.vehicle.state, VehicleState::Delivered);
    assert_eq!(delivered.vehicle.total_duration(), Some(Duration::minutes(8)));
    assert_eq!(delivered.notifications().count(), 1);
    assert_eq!(
        lifecycle.valets().find(retrieval_valet).await.unwrap().status,
        ValetStatus::Free
    );
    let zone = lifecycle.zones().list_zones().await.unwrap().remove(0);
    assert_eq!(zone.available_slots, 1);

    let closed = lifecycle.close(id).await.unwrap().vehicle;
    assert_eq!(closed.state, VehicleState::Closed);
    assert!(closed.closed_at.is_some());

    let history = lifecycle.scheduler().history(id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].resolved_at.is_some());
}

#[tokio::test]
async fn test_duplicate_active_plate_is_rejected() {
    let (lifecycle, _clock) = setup(Stores::in_memory(), 3, 2).await;

    let first = lifecycle.create_entry(entry("KL07AB1234")).await.unwrap().vehicle;
    let err = lifecycle.create_entry(entry("kl 07 ab 1234")).await.unwrap_err();
    match err {
        AppError::DuplicateEntry { plate, token } => {
            assert_eq!(plate, "KL07AB1234");
            assert_eq!(token, first.token);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    lifecycle.mark_parked(first.id).await.unwrap();
    assert!(matches!(
        lifecycle.create_entry(entry("KL07AB1234")).await,
        Err(AppError::DuplicateEntry { .. })
    ));
    let zone = lifecycle.zones().list_zones().await.unwrap().remove(0);
    assert_eq!(zone.available_slots, 2);
}

#[tokio::test]
async fn test_plate_reusable_after_close() {
    let (lifecycle, clock) = setup(Stores::in_memory(), 1, 1).await;

    let id = lifecycle.create_entry(entry("KL07AB1234")).await.unwrap().vehicle.id;
    lifecycle.mark_parked(id).await.unwrap();
    lifecycle.send_markout_options(id).await.unwrap();
    lifecycle.request_markout(id, Some(7), MarkOutSource::Whatsapp).await.unwrap();
    clock.advance(Duration::minutes(7));
    lifecycle.assign_retrieval_valet(id).await.unwrap();
    lifecycle.start_retrieval(id).await.unwrap();
    lifecycle.mark_delivered(id).await.unwrap();
    lifecycle.close(id).await.unwrap();

    let again = lifecycle.create_entry(entry("KL07AB1234")).await.unwrap().vehicle;
    assert_ne!(again.id, id);
    assert_eq!(again.state, VehicleState::Parking);
}

#[tokio::test]
async fn test_invalid_transitions_leave_record_unchanged() {
    let (lifecycle, _clock) = setup(Stores::in_memory(), 1, 1).await;
    let id = lifecycle.create_entry(entry("KL07AB1234")).await.unwrap().vehicle.id;
    let before = lifecycle.find_by_id(id).await.unwrap();

    let attempts: Vec<(VehicleState, AppResult<_>)> = vec![
        (VehicleState::WaitingMarkout, lifecycle.send_markout_options(id).await),
        (
            VehicleState::Scheduled,
            lifecycle.request_markout(id, Some(5), MarkOutSource::Operator).await,
        ),
        (VehicleState::RetrievalAssigned, lifecycle.assign_retrieval_valet(id).await),
        (VehicleState::OnTheWay, lifecycle.start_retrieval(id).await),
        (VehicleState::Delivered, lifecycle.mark_delivered(id).await),
        (VehicleState::Closed, lifecycle.close(id).await),
    ];

    for (target, result) in attempts {
        match result {
            Err(AppError::InvalidTransition { from, to }) => {
                assert_eq!(from, VehicleState::Parking);
                assert_eq!(to, target);
            }
            other => panic!("expected invalid transition to {}, got {:?}", target, other.map(|o| o.vehicle.state)),
        }
    }

    assert_eq!(lifecycle.find_by_id(id).await.unwrap(), before);
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    MarkParked,
    SendMarkOutOptions,
    RequestMarkOut,
    AssignRetrievalValet,
    StartRetrieval,
    MarkDelivered,
    Close,
}

impl Operation {
    const ALL: [Operation; 7] = [
        Operation::MarkParked,
        Operation::SendMarkOutOptions,
        Operation::RequestMarkOut,
        Operation::AssignRetrievalValet,
        Operation::StartRetrieval,
        Operation::MarkDelivered,
        Operation::Close,
    ];

    fn target(self) -> VehicleState {
        match self {
            Operation::MarkParked => VehicleState::Parked,
            Operation::SendMarkOutOptions => VehicleState::WaitingMarkout,
            Operation::RequestMarkOut => VehicleState::Scheduled,
            Operation::AssignRetrievalValet => VehicleState::RetrievalAssigned,
            Operation::StartRetrieval => VehicleState::OnTheWay,
            Operation::MarkDelivered => VehicleState::Delivered,
            Operation::Close => VehicleState::Closed,
        }
    }

    fn allowed_from(self) -> &'static [VehicleState] {
        match self {
            Operation::MarkParked => &[VehicleState::Parking],
            Operation::SendMarkOutOptions => &[VehicleState::Parked],
            Operation::RequestMarkOut => &[VehicleState::Parked, VehicleState::WaitingMarkout],
            Operation::AssignRetrievalValet | Operation::StartRetrieval => {
                &[VehicleState::Scheduled, VehicleState::RetrievalAssigned]
            }
            Operation::MarkDelivered => &[VehicleState::OnTheWay],
            Operation::Close => &[VehicleState::Delivered],
        }
    }

    async fn run(self, lifecycle: &VehicleLifecycle, id: Uuid) -> AppResult<VehicleState> {
        let outcome = match self {
            Operation::MarkParked => lifecycle.mark_parked(id).await?,
            Operation::SendMarkOutOptions => lifecycle.send_markout_options(id).await?,
            Operation::RequestMarkOut => lifecycle.request_markout(id, Some(5), MarkOutSource::Operator).await?,
            Operation::AssignRetrievalValet => lifecycle.assign_retrieval_valet(id).await?,
            Operation::StartRetrieval => lifecycle.start_retrieval(id).await?,
            Operation::MarkDelivered => lifecycle.mark_delivered(id).await?,
            Operation::Close => lifecycle.close(id).await?,
        };
        Ok(outcome.vehicle.state)
    }
}

const ALL_STATES: [VehicleState; 8] = [
    VehicleState::Parking,
    VehicleState::Parked,
    VehicleState::WaitingMarkout,
    VehicleState::Scheduled,
    VehicleState::RetrievalAssigned,
    VehicleState::OnTheWay,
    VehicleState::Delivered,
    VehicleState::Closed,
];

/// Lleva un vehículo nuevo hasta `state` por el camino normal
async fn drive_to(state: VehicleState) -> (VehicleLifecycle, Uuid) {
    let (lifecycle, clock) = setup(Stores::in_memory(), 1, 2).await;
    let id = lifecycle.create_entry(entry("KL07AB1234")).await.unwrap().vehicle.id;

    let path = [
        Operation::MarkParked,
        Operation::SendMarkOutOptions,
        Operation::RequestMarkOut,
        Operation::AssignRetrievalValet,
        Operation::StartRetrieval,
        Operation::MarkDelivered,
        Operation::Close,
    ];
    for step in path {
        if lifecycle.find_by_id(id).await.unwrap().state == state {
            break;
        }
        step.run(&lifecycle, id).await.unwrap();
        if matches!(step, Operation::RequestMarkOut) {
            clock.advance(Duration::minutes(5));
        }
    }

    assert_eq!(lifecycle.find_by_id(id).await.unwrap().state, state);
    (lifecycle, id)
}

#[tokio::test]
async fn test_every_state_and_operation_pair() {
    for state in ALL_STATES {
        for operation in Operation::ALL {
            let (lifecycle, id) = drive_to(state).await;
            let before = lifecycle.find_by_id(id).await.unwrap();
            let result = operation.run(&lifecycle, id).await;

            if operation.allowed_from().contains(&state) {
                assert_eq!(
                    result.unwrap(),
                    operation.target(),
                    "{:?} from {}",
                    operation,
                    state
                );
                continue;
            }

            match result {
                Err(AppError::InvalidTransition { from, to }) => {
                    assert_eq!(from, state, "{:?}", operation);
                    assert_eq!(to, operation.target(), "{:?}", operation);
                }
                other => panic!("{:?} from {}: expected invalid transition, got {:?}", operation, state, other),
            }
            assert_eq!(lifecycle.find_by_id(id).await.unwrap(), before, "{:?} from {}", operation, state);
        }
    }
}

#[tokio::test]
async fn test_replace_retrieval_valet_keeps_state() {
    let (lifecycle, clock) = setup(Stores::in_memory(), 1, 2).await;
    let id = lifecycle.create_entry(entry("KL07AB1234")).await.unwrap().vehicle.id;
    lifecycle.mark_parked(id).await.unwrap();
    lifecycle.request_markout(id, None, MarkOutSource::Default).await.unwrap();
    clock.advance(Duration::minutes(10));

    let first = lifecycle.assign_retrieval_valet(id).await.unwrap().vehicle;
    let first_valet = first.retrieval_valet_id.unwrap();
    let before = lifecycle.valets().find(first_valet).await.unwrap();
    assert_eq!(before.status, ValetStatus::Busy);

    let second = lifecycle.assign_retrieval_valet(id).await.unwrap().vehicle;
    assert_eq!(second.state, VehicleState::RetrievalAssigned);
    assert_ne!(second.retrieval_valet_id, Some(first_valet));

    let abandoned = lifecycle.valets().find(first_valet).await.unwrap();
    assert_eq!(abandoned.status, ValetStatus::Free);
    assert_eq!(abandoned.current_task, None);
    assert_eq!(abandoned.today_count, before.today_count - 1);
    assert_eq!(abandoned.total_count, before.total_count - 1);

    // El valet liberado vuelve a la rotación
    let report = lifecycle.valets().availability_report().await.unwrap();
    assert_eq!((report.busy, report.free, report.off_duty), (1, 1, 0));
}

#[tokio::test]
async fn test_reassign_takes_previous_valet_off_duty() {
    let (lifecycle, _clock) = setup(Stores::in_memory(), 1, 2).await;
    let created = lifecycle.create_entry(entry("KL07AB1234")).await.unwrap().vehicle;
    let previous = created.parking_valet_id.unwrap();

    let reassigned = lifecycle.reassign_valet(created.id).await.unwrap().vehicle;
    assert_ne!(reassigned.parking_valet_id, Some(previous));
    assert_eq!(
        lifecycle.valets().find(previous).await.unwrap().status,
        ValetStatus::OffDuty
    );
}

#[tokio::test]
async fn test_concurrent_entries_race_for_last_slot() {
    let (lifecycle, _clock) = setup(Stores::in_memory(), 1, 5).await;
    let lifecycle = Arc::new(lifecycle);

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.create_entry(entry(&format!("KL07AB123{}", i))).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert!(matches!(e, AppError::NoCapacity), "{:?}", e),
        }
    }
    assert_eq!(winners, 1);

    let report = lifecycle.valets().availability_report().await.unwrap();
    assert_eq!(report.busy, 1);
    assert_eq!(report.free, 4);
}

#[tokio::test]
async fn test_arrivals_are_listed_by_day() {
    let (lifecycle, clock) = setup(Stores::in_memory(), 3, 3).await;
    lifecycle.create_entry(entry("KL07AB1234")).await.unwrap();
    clock.advance(Duration::days(1));
    lifecycle.create_entry(entry("KL07AB1235")).await.unwrap();

    let day = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
    let arrivals = lifecycle.list_arrived_on(day).await.unwrap();
    assert_eq!(arrivals.len(), 1);
    assert_eq!(arrivals[0].plate_number, "KL07AB1234");
    assert_eq!(lifecycle.list_by_state(VehicleState::Parking).await.unwrap().len(), 2);

    let token = arrivals[0].token.clone();
    assert_eq!(lifecycle.find_by_token(&token).await.unwrap().id, arrivals[0].id);
    assert!(matches!(
        lifecycle.find_by_token("VLT-000000000").await,
        Err(AppError::NotFound(_))
    ));
}

/// Store de vehículos que rechaza los primeros inserts por colisión de token
struct CollidingVehicles {
    inner: Arc<InMemoryStore>,
    collisions_left: AtomicUsize,
}

#[async_trait]
impl VehicleRepository for CollidingVehicles {
    async fn insert(&self, vehicle: &Vehicle) -> AppResult<()> {
        let left = self.collisions_left.load(Ordering::SeqCst);
        if left > 0 {
            self.collisions_left.store(left - 1, Ordering::SeqCst);
            return Err(AppError::TokenCollision(vehicle.token.clone()));
        }
        VehicleRepository::insert(self.inner.as_ref(), vehicle).await
    }

    async fn update(&self, vehicle: &Vehicle, expected: VehicleState) -> AppResult<()> {
        self.inner.update(vehicle, expected).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        VehicleRepository::find_by_id(self.inner.as_ref(), id).await
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Vehicle>> {
        self.inner.find_by_token(token).await
    }

    async fn find_active_by_plate(&self, plate_number: &str) -> AppResult<Option<Vehicle>> {
        self.inner.find_active_by_plate(plate_number).await
    }

    async fn find_active_by_valet(&self, valet_id: Uuid) -> AppResult<Option<Vehicle>> {
        self.inner.find_active_by_valet(valet_id).await
    }

    async fn list_by_state(&self, state: VehicleState) -> AppResult<Vec<Vehicle>> {
        self.inner.list_by_state(state).await
    }

    async fn list_arrived_on(&self, date: NaiveDate) -> AppResult<Vec<Vehicle>> {
        self.inner.list_arrived_on(date).await
    }
}

fn lifecycle_with_collisions(collisions: usize, clock: &ManualClock) -> VehicleLifecycle {
    let store = Arc::new(InMemoryStore::new());
    let vehicles = Arc::new(CollidingVehicles {
        inner: store.clone(),
        collisions_left: AtomicUsize::new(collisions),
    });
    let clock = Arc::new(clock.clone());
    VehicleLifecycle::new(
        vehicles,
        Arc::new(ZoneAllocator::new(store.clone())),
        Arc::new(ValetDispatcher::new(
            store.clone(),
            clock.clone(),
            chrono::FixedOffset::east_opt(0).unwrap(),
        )),
        Arc::new(MarkOutScheduler::with_defaults(store)),
        clock,
    )
}

#[tokio::test]
async fn test_token_collision_is_retried() {
    let clock = start_clock();
    let lifecycle = lifecycle_with_collisions(2, &clock);
    lifecycle.zones().create_zone("A", "A", None, 1, 1).await.unwrap();
    lifecycle.valets().onboard("V1", "9900000001", None).await.unwrap();

    let vehicle = lifecycle.create_entry(entry("KL07AB1234")).await.unwrap().vehicle;
    assert_eq!(vehicle.state, VehicleState::Parking);
}

#[tokio::test]
async fn test_token_collision_exhausted_compensates() {
    let clock = start_clock();
    let lifecycle = lifecycle_with_collisions(3, &clock);
    lifecycle.zones().create_zone("A", "A", None, 1, 1).await.unwrap();
    let valet = lifecycle.valets().onboard("V1", "9900000001", None).await.unwrap();

    let err = lifecycle.create_entry(entry("KL07AB1234")).await.unwrap_err();
    assert!(matches!(err, AppError::TokenCollision(_)));

    let zone = lifecycle.zones().list_zones().await.unwrap().remove(0);
    assert_eq!(zone.available_slots, 1);
    let valet = lifecycle.valets().find(valet.id).await.unwrap();
    assert_eq!(valet.status, ValetStatus::Free);
    assert_eq!(valet.today_count, 0);
}
