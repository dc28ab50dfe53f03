use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::*;
use crate::storage::MemoryStorage;
use crate::store::{LocalStore, SnapshotEvent, Subscription};

fn presence(name: &str, last_seen: i64) -> Presence {
    Presence { user_id: Uuid::new_v4(), username: name.into(), color: "#a3e635".into(), last_seen }
}

async fn next_presence(sub: &mut Subscription<Presence>) -> Vec<Presence> {
    match sub.next().await.expect("open") {
        SnapshotEvent::Snapshot(records) => records,
        SnapshotEvent::Error(e) => panic!("{e}"),
    }
}

#[test]
fn stale_presence_is_not_online() {
    let now = 1_000_000;
    let fresh = presence("zed", now - 29_999);
    let stale = presence("amy", now - 30_000);
    let online = online_users(&[stale, fresh.clone()], now, 30_000);
    assert_eq!(online, vec![fresh]);
}

#[test]
fn online_users_are_sorted_by_name() {
    let now = 10;
    let online = online_users(&[presence("carol", now), presence("bob", now)], now, 30_000);
    let names: Vec<&str> = online.iter().map(|p| p.username.as_str()).collect();
    assert_eq!(names, ["bob", "carol"]);
}

#[test]
fn future_timestamps_count_as_online() {
    let record = presence("skewed", 2_000);
    assert_eq!(online_users(&[record], 1_000, 30_000).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_publishes_immediately_then_on_interval() {
    let store: Arc<dyn DocumentStore> = Arc::new(LocalStore::new(Arc::new(MemoryStorage::new())));
    let mut sub = store.subscribe_presence();
    assert!(next_presence(&mut sub).await.is_empty());

    let user = LocalUser::generate(Some("alice"));
    let heartbeat = Heartbeat::spawn(Arc::clone(&store), user.clone(), Duration::from_secs(15));
    let first = next_presence(&mut sub).await;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].user_id, user.user_id);

    tokio::time::sleep(Duration::from_secs(14)).await;
    assert!(sub.try_next().is_none());

    assert_eq!(next_presence(&mut sub).await.len(), 1);

    heartbeat.stop().await;
    assert!(next_presence(&mut sub).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropped_heartbeat_stops_publishing() {
    let store: Arc<dyn DocumentStore> = Arc::new(LocalStore::new(Arc::new(MemoryStorage::new())));
    let mut sub = store.subscribe_presence();
    next_presence(&mut sub).await;

    let heartbeat = Heartbeat::spawn(Arc::clone(&store), LocalUser::generate(None), Duration::from_secs(15));
    next_presence(&mut sub).await;
    drop(heartbeat);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(sub.try_next().is_none());
}
