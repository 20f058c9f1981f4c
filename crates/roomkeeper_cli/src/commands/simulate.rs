//! Simulate command implementation.
//!
//! Runs the publisher side, the bridge selected by the configured roles
//! and the collector in one process. Feeds are simulated and the
//! coordination store is held in memory.

use roomkeeper_bridge::{Bridge, BridgeConfig, KvBridge, LocalBridge, MemoryKvStore, Publisher};
use roomkeeper_collector::{
    Collector, CollectorConfig, FeedCommand, FeedEvent, MemoryEventSink, MockFeedConnector,
    SessionState,
};
use roomkeeper_core::{BridgeMode, RoomId, RoomSet, ServiceConfig};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Knobs of a simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    /// Rooms published in addition to the configured ones.
    pub extra_rooms: Vec<u64>,
    /// Gift events delivered to every room.
    pub events_per_room: usize,
    /// Dials that fail before the feed becomes reachable.
    pub fail_dials: usize,
    /// Drop the membership watch once and remove a room while it is down.
    pub break_watch: bool,
}

/// Outcome of a simulation run.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    /// `local` or `distributed`.
    pub bridge_mode: String,
    /// Rooms published at startup.
    pub published_rooms: Vec<u64>,
    /// Rooms with a live session before shutdown.
    pub collector_rooms: Vec<u64>,
    /// Total feed dials, including failed ones.
    pub dials: usize,
    /// Gift batches stored.
    pub gift_batches: usize,
    /// Gifts stored across all batches.
    pub gift_units: i64,
    /// Whether a watch resynchronization was exercised.
    pub resynchronized: bool,
    /// Feed connections still open after shutdown.
    pub open_connections_after_stop: usize,
}

async fn wait_until(
    limit: Duration,
    what: &str,
    mut check: impl FnMut() -> bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = tokio::time::Instant::now();
    while !check() {
        if start.elapsed() > limit {
            return Err(format!("timed out after {:?} waiting for {}", limit, what).into());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

fn gift_event(room_id: RoomId, seq: usize) -> Result<FeedEvent, serde_json::Error> {
    let payload = json!({
        "uid": 10_000 + seq,
        "uname": format!("viewer-{seq}"),
        "giftId": 31036,
        "giftName": "flower",
        "price": 100,
        "num": 1,
        "coin_type": "gold",
        "batch_combo_id": format!("sim:{room_id}"),
        "timestamp": 1_700_000_000 + seq as i64
    });
    Ok(FeedEvent::new(FeedCommand::Gift, serde_json::to_vec(&payload)?))
}

fn ids(rooms: &RoomSet) -> Vec<u64> {
    rooms.iter().map(|room| room.as_u64()).collect()
}

/// Runs one simulation.
pub async fn simulate(
    config: &ServiceConfig,
    options: &SimulateOptions,
) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    let connector = Arc::new(MockFeedConnector::new());
    connector.fail_next(options.fail_dials);
    let sink = Arc::new(MemoryEventSink::new());
    let collector_config = CollectorConfig::from(config);
    let connect_limit = collector_config
        .retry
        .backoff()
        .take(options.fail_dials)
        .sum::<Duration>()
        + Duration::from_secs(5);
    let collector = Arc::new(Collector::new(connector.clone(), sink.clone(), collector_config)?);

    let store = Arc::new(MemoryKvStore::new());
    let mode = config.bridge_mode();
    let (publisher, consumer): (Arc<dyn Bridge>, Arc<dyn Bridge>) = match mode {
        BridgeMode::Local => {
            let bridge: Arc<dyn Bridge> = Arc::new(LocalBridge::new());
            (bridge.clone(), bridge)
        }
        BridgeMode::Distributed => {
            info!(
                "simulating coordination store {:?} in memory",
                config.store_endpoints
            );
            let bridge_config = BridgeConfig::new(config.bridge.key_prefix.clone())
                .with_watch_retry_delay(config.watch_retry_delay());
            let publisher: Arc<dyn Bridge> =
                Arc::new(KvBridge::new(store.clone(), bridge_config.clone()));
            let consumer: Arc<dyn Bridge> = Arc::new(KvBridge::new(store.clone(), bridge_config));
            (publisher, consumer)
        }
    };

    consumer.set_receiver(collector.clone());
    consumer.start()?;

    let mut rooms: RoomSet = config.initial_rooms().into_iter().collect();
    rooms.extend(options.extra_rooms.iter().copied().map(RoomId));
    for room_id in &rooms {
        publisher.add_room(*room_id).await?;
    }
    info!("published {} rooms", rooms.len());

    wait_until(connect_limit, "feed sessions to connect", || {
        rooms
            .iter()
            .all(|room_id| collector.session_state(*room_id) == Some(SessionState::Connected))
    })
    .await?;

    for room_id in &rooms {
        let Some(connection) = connector.latest(*room_id) else {
            continue;
        };
        for seq in 0..options.events_per_room {
            connection.deliver(gift_event(*room_id, seq)?);
        }
    }

    let mut resynchronized = false;
    let mut expected = rooms.clone();
    if options.break_watch {
        match mode {
            BridgeMode::Distributed => {
                let limit = config.watch_retry_delay() + Duration::from_secs(5);
                wait_until(limit, "membership watch", || store.watch_count() > 0).await?;
                store.break_watches();
                if let Some(first) = rooms.iter().next().copied() {
                    publisher.del_room(first).await?;
                    expected.remove(&first);
                }
                wait_until(limit, "membership resynchronization", || {
                    collector.rooms() == expected
                })
                .await?;
                resynchronized = true;
            }
            BridgeMode::Local => warn!("--break-watch has no effect with a local bridge"),
        }
    }

    let collector_rooms = ids(&collector.rooms());
    collector.stop();
    consumer.stop()?;
    // Removed rooms close their feeds in the background.
    if wait_until(Duration::from_secs(5), "feed connections to close", || {
        connector.open_connections() == 0
    })
    .await
    .is_err()
    {
        warn!("{} feed connections still open after stop", connector.open_connections());
    }

    let gifts = sink.gifts();
    Ok(SimulationReport {
        bridge_mode: match mode {
            BridgeMode::Local => "local".into(),
            BridgeMode::Distributed => "distributed".into(),
        },
        published_rooms: ids(&rooms),
        collector_rooms,
        dials: rooms.iter().map(|room_id| connector.dial_count(*room_id)).sum(),
        gift_batches: gifts.len(),
        gift_units: gifts.iter().map(|gift| gift.gift_count).sum(),
        resynchronized,
        open_connections_after_stop: connector.open_connections(),
    })
}

/// Runs the simulate command.
pub fn run(
    config: &ServiceConfig,
    options: &SimulateOptions,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(simulate(config, options))?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!("Simulation ({} bridge)", report.bridge_mode);
            println!();
            println!("Published rooms:   {:?}", report.published_rooms);
            println!("Collector rooms:   {:?}", report.collector_rooms);
            println!("Feed dials:        {}", report.dials);
            println!(
                "Gifts stored:      {} in {} batches",
                report.gift_units, report.gift_batches
            );
            if report.resynchronized {
                println!("Resynchronization: ok");
            }
            println!("Open after stop:   {}", report.open_connections_after_stop);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(rooms: &[u64]) -> SimulateOptions {
        SimulateOptions {
            extra_rooms: rooms.to_vec(),
            events_per_room: 3,
            fail_dials: 0,
            break_watch: false,
        }
    }

    #[tokio::test]
    async fn local_simulation() {
        let config = ServiceConfig::from_json(r#"{ "rooms": [5, 6] }"#).unwrap();
        let report = simulate(&config, &options(&[6, 7])).await.unwrap();

        assert_eq!(report.bridge_mode, "local");
        assert_eq!(report.published_rooms, vec![5, 6, 7]);
        assert_eq!(report.collector_rooms, vec![5, 6, 7]);
        assert_eq!(report.gift_batches, 3);
        assert_eq!(report.gift_units, 9);
        assert_eq!(report.open_connections_after_stop, 0);
    }

    #[tokio::test]
    async fn distributed_simulation_with_resync() {
        let config = ServiceConfig::from_json(
            r#"{
                "service": { "core": false, "collector": true },
                "store_endpoints": ["127.0.0.1:2379"],
                "bridge": { "watch_retry_delay_ms": 20 },
                "collector": { "retry": { "initial_delay_ms": 10, "max_delay_ms": 50 } }
            }"#,
        )
        .unwrap();
        let mut options = options(&[1, 2, 3]);
        options.fail_dials = 2;
        options.break_watch = true;

        let report = simulate(&config, &options).await.unwrap();

        assert_eq!(report.bridge_mode, "distributed");
        assert!(report.resynchronized);
        assert_eq!(report.collector_rooms, vec![2, 3]);
        assert_eq!(report.dials, 5);
        assert_eq!(report.open_connections_after_stop, 0);
    }
}
