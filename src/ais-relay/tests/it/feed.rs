use std::time::Duration;

use ais_relay::{feed::FeedClient, startup::App};
use serde_json::json;
use tracker_core::{RegionId, UpdateOptions, VesselId, VesselUpdate};

use crate::helper::{TEST_API_KEY, UpstreamEvent, position_report, test, wait_until};

static BUSAN_BOUNDS: [[f64; 2]; 2] = [[128.9, 35.0], [129.2, 35.2]];

#[tokio::test]
async fn test_feed_resets_store_and_applies_position_reports() {
    test(|mut helper| async move {
        let store = helper.store();
        store.write().await.update(
            "stale",
            VesselUpdate::test_position(35.1, 129.0),
            UpdateOptions::default(),
        );

        let mut feed = FeedClient::new(helper.upstream.url(), store.clone());
        feed.start(BUSAN_BOUNDS);

        assert_eq!(
            helper.upstream.next_event().await,
            UpstreamEvent::Subscribed {
                connection: 0,
                payload: json!({ "BoundingBoxes": [[[128.9, 35.0], [129.2, 35.2]]] }),
            }
        );
        {
            let store = store.read().await;
            assert!(store.connectivity().connected);
            assert!(!store.connectivity().streaming);
            assert!(store.live_vessels().is_empty());
        }

        helper.upstream.send_text(0, "{broken");
        helper.upstream.send_text(0, r#"{"MessageType":"ShipStaticData"}"#);
        helper.upstream.send_text(
            0,
            r#"{"MetaData":{"MMSI":440111222},"Message":{"PositionReport":{"Latitude":35.1,"Longitude":129.0}}}"#,
        );
        helper
            .upstream
            .send_text(0, &position_report(257123000, " STAALBAS ", 35.1, 129.05));

        let id = VesselId::from("257123000");
        wait_until(&store, |s| s.vessel(&id).is_some()).await;

        let store = store.read().await;
        let vessel = store.vessel(&id).unwrap();
        assert_eq!(vessel.name, "STAALBAS");
        assert_eq!(vessel.speed, 8.5);
        assert_eq!(vessel.heading, 118.);
        assert_eq!(store.live_vessels().len(), 1);
        assert!(store.connectivity().streaming);
    })
    .await;
}

#[tokio::test]
async fn test_binary_frames_are_applied() {
    test(|mut helper| async move {
        let store = helper.store();
        let mut feed = FeedClient::new(helper.upstream.url(), store.clone());
        feed.start(BUSAN_BOUNDS);
        helper.upstream.next_event().await;

        let report = position_report(440111222, "", 35.12, 129.1);
        helper.upstream.send_binary(0, report.into_bytes());

        let id = VesselId::from("440111222");
        wait_until(&store, |s| s.vessel(&id).is_some()).await;
        assert_eq!(store.read().await.vessel(&id).unwrap().name, "Ship 440111222");
    })
    .await;
}

#[tokio::test]
async fn test_stop_while_connecting_closes_socket_once_open() {
    test(|mut helper| async move {
        let store = helper.store();
        store.write().await.update(
            "kept",
            VesselUpdate::test_position(35.1, 129.0),
            UpdateOptions::default(),
        );

        helper.upstream.delay_next(&[Duration::from_millis(300)]);
        let mut feed = FeedClient::new(helper.upstream.url(), store.clone());
        feed.start(BUSAN_BOUNDS);
        tokio::time::sleep(Duration::from_millis(50)).await;
        feed.stop().await;
        assert!(!feed.is_active());

        assert_eq!(
            helper.upstream.next_event().await,
            UpstreamEvent::Closed { connection: 0 }
        );

        let store = store.read().await;
        assert!(!store.connectivity().connected);
        assert!(store.vessel(&VesselId::from("kept")).is_some());
    })
    .await;
}

#[tokio::test]
async fn test_upstream_close_marks_store_disconnected() {
    test(|mut helper| async move {
        let store = helper.store();
        let mut feed = FeedClient::new(helper.upstream.url(), store.clone());
        feed.start(BUSAN_BOUNDS);
        helper.upstream.next_event().await;
        wait_until(&store, |s| s.connectivity().connected).await;

        helper.upstream.close(0);

        wait_until(&store, |s| !s.connectivity().connected).await;
        assert_eq!(
            helper.upstream.next_event().await,
            UpstreamEvent::Closed { connection: 0 }
        );
        helper.upstream.assert_no_event(Duration::from_millis(200)).await;
    })
    .await;
}

#[tokio::test]
async fn test_restart_replaces_running_stream() {
    test(|mut helper| async move {
        let store = helper.store();
        let mut feed = FeedClient::new(helper.upstream.url(), store.clone());
        feed.start(BUSAN_BOUNDS);
        helper.upstream.next_event().await;

        let incheon = RegionId::Incheon.region().bounding_box();
        feed.start(incheon);

        let mut events = vec![
            helper.upstream.next_event().await,
            helper.upstream.next_event().await,
        ];
        events.sort_by_key(|e| matches!(e, UpstreamEvent::Closed { .. }));
        assert_eq!(
            events,
            vec![
                UpstreamEvent::Subscribed {
                    connection: 1,
                    payload: json!({ "BoundingBoxes": [incheon] }),
                },
                UpstreamEvent::Closed { connection: 0 },
            ]
        );
        wait_until(&store, |s| s.connectivity().connected).await;
    })
    .await;
}

#[tokio::test]
async fn test_app_streams_feed_through_relay() {
    test(|mut helper| async move {
        let mut settings = helper.settings();
        settings.tracker.feed = true;

        let app = App::build(&settings).await.unwrap();
        let store = app.store();
        let cancellation = app.cancellation();
        let running = tokio::spawn(app.run_until_cancelled());

        assert_eq!(
            helper.upstream.next_event().await,
            UpstreamEvent::Subscribed {
                connection: 0,
                payload: json!({
                    "APIkey": TEST_API_KEY,
                    "BoundingBoxes": [BUSAN_BOUNDS],
                }),
            }
        );

        helper
            .upstream
            .send_text(0, &position_report(257123000, "STAALBAS", 35.1, 129.05));

        let id = VesselId::from("257123000");
        wait_until(&store, |s| s.vessel(&id).is_some() && s.connectivity().streaming).await;

        cancellation.cancel();
        running.await.unwrap().unwrap();
        assert!(!store.read().await.connectivity().connected);
    })
    .await;
}
