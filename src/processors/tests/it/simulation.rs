use std::time::Duration;

use processors::{SimulationProcessor, Simulator};
use tokio_util::sync::CancellationToken;
use tracker_core::{LatLng, VesselId, VesselStore};

use crate::helper::TestHelper;

#[test]
fn test_seeds_synthetic_fleet_when_feed_is_down() {
    let mut helper = TestHelper::busan();

    let tick = Simulator::seeded(3).run_single(&mut helper.store);

    assert!(tick.seeded);
    assert_eq!(tick.moved + tick.bounced, 10);
    assert_eq!(helper.store.live_vessels().len(), 10);
}

#[test]
fn test_does_not_seed_while_connected() {
    let mut helper = TestHelper::busan();
    helper.store.set_connected(true);

    let tick = Simulator::seeded(3).run_single(&mut helper.store);

    assert!(!tick.seeded);
    assert!(helper.store.live_vessels().is_empty());
}

#[test]
fn test_live_vessels_are_never_moved() {
    let mut helper = TestHelper::busan();
    helper.add_vessel("257000001", 35.0, 129.05, 90., 12.);
    helper.add_vessel("999b0", 35.0, 129.05, 90., 12.);

    let tick = Simulator::seeded(3).run_single(&mut helper.store);

    assert!(!tick.seeded);
    assert_eq!(tick.moved, 1);
    assert_eq!(helper.vessel("257000001").position, LatLng::new(35.0, 129.05));
    assert_eq!(helper.vessel("257000001").fuel, 85.);
}

#[test]
fn test_synthetic_vessel_moves_along_heading_and_burns_fuel() {
    let mut helper = TestHelper::busan();
    helper.add_vessel("999b0", 35.0, 129.05, 90., 10.);

    Simulator::seeded(3).run_single(&mut helper.store);

    let vessel = helper.vessel("999b0");
    assert!((vessel.position.lat - 35.0).abs() < 1e-12);
    assert!((vessel.position.lng - 129.05005).abs() < 1e-12);
    assert!((vessel.fuel - (85. - 0.005)).abs() < 1e-12);
    assert_eq!(vessel.path().len(), 2);
}

#[test]
fn test_leaving_sea_zones_reverses_heading_without_moving() {
    let mut helper = TestHelper::busan();
    helper.add_vessel("999b0", 35.03, 129.01, 0., 14.);

    let tick = Simulator::seeded(3).run_single(&mut helper.store);

    let vessel = helper.vessel("999b0");
    assert_eq!(tick.bounced, 1);
    assert_eq!(vessel.heading, 180.);
    assert_eq!(vessel.position, LatLng::new(35.03, 129.01));
    assert_eq!(vessel.fuel, 85.);
    assert_eq!(vessel.path().len(), 1);
}

#[test]
fn test_fuel_never_drops_below_zero_and_history_stays_bounded() {
    let mut helper = TestHelper::busan();
    helper.add_vessel("999b0", 35.0, 129.05, 90., 0.5);
    helper.store.update(
        "999b0",
        tracker_core::VesselUpdate {
            fuel: Some(0.001),
            ..Default::default()
        },
        Default::default(),
    );

    let mut simulator = Simulator::seeded(9);
    let mut previous = f64::MAX;
    for _ in 0..400 {
        simulator.run_single(&mut helper.store);
        let vessel = helper.vessel("999b0");
        assert!(vessel.fuel >= 0.);
        assert!(vessel.fuel <= previous);
        assert!(vessel.historical_data().len() <= tracker_core::HISTORY_CAPACITY);
        previous = vessel.fuel;
    }

    let vessel = helper.vessel("999b0");
    assert_eq!(vessel.fuel, 0.);
    assert!(!vessel.historical_data().is_empty());
}

#[tokio::test]
async fn test_processor_stops_on_cancellation() {
    let store = VesselStore::seeded(tracker_core::RegionId::Singapore, 5).into_shared();
    let cancellation = CancellationToken::new();

    let processor =
        SimulationProcessor::new(store.clone(), Simulator::seeded(5), Duration::from_millis(5));
    let handle = tokio::spawn(processor.run_continuous(cancellation.clone()));

    tokio::time::sleep(Duration::from_millis(30)).await;
    cancellation.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();

    let store = store.read().await;
    assert_eq!(store.live_vessels().len(), 6);
    assert!(store.live_vessels().keys().all(VesselId::is_synthetic));
}
