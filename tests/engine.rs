//! End-to-end scenarios driving the public engine surface, asserted
//! against the event stream and the injector's snapshot accessors.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::sleep;

use depvisor::{
    BoxError, Config, Deps, EngineBuilder, Event, EventKind, ExitReason, Factory, FactoryId, Host,
    Injector, Item, ItemRef, Msg, Reply, RpcError, StartFn, StateFn, Step, Worker, WorkerHandle,
};

// ---- Test workers -------------------------------------------------------

struct Echo;

fn idle(reply: Reply, _msg: Msg, _state: &mut Echo) -> Step<Echo> {
    reply.send("ok");
    Step::NoChange
}

#[async_trait]
impl Worker for Echo {
    const MODULE: &'static str = "echo";
    type Args = ();

    async fn init(_args: ()) -> Result<(StateFn<Self>, Self), BoxError> {
        Ok((StateFn::new("idle", idle), Echo))
    }
}

struct SleepyInit;

#[async_trait]
impl Worker for SleepyInit {
    const MODULE: &'static str = "sleepy";
    type Args = ();

    async fn init(_args: ()) -> Result<(StateFn<Self>, Self), BoxError> {
        sleep(Duration::from_secs(3600)).await;
        Ok((StateFn::new("idle", |_r, _m, _s| Step::NoChange), SleepyInit))
    }
}

// ---- Helpers ------------------------------------------------------------

fn echo_factory(id: &str, requires: &[&str]) -> Factory {
    Factory::new(
        id,
        requires.iter().copied(),
        StartFn::arc(|host: Host, _deps: Deps| async move { host.spawn::<Echo>(()).await }),
    )
}

type Slot = Arc<Mutex<Option<WorkerHandle>>>;

/// Factory that records the handle of the last worker it started.
fn capturing_factory(id: &str, requires: &[&str], slot: Slot) -> Factory {
    let requires: Vec<String> = requires.iter().map(|s| s.to_string()).collect();
    Factory::new(
        id,
        requires,
        StartFn::arc(move |host: Host, _deps: Deps| {
            let slot = Arc::clone(&slot);
            async move {
                let handle = host.spawn::<Echo>(()).await?;
                *slot.lock().unwrap() = Some(handle.clone());
                Ok(handle)
            }
        }),
    )
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}

fn started_tuples(events: &[Event]) -> Vec<Vec<ItemRef>> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::ChildStarted)
        .map(|e| e.tuple.clone().unwrap())
        .collect()
}

async fn active_len(inj: &Injector) -> usize {
    inj.snapshot().await.unwrap().active.len()
}

async fn wait_active_len(inj: &Injector, expected: usize) {
    for _ in 0..200 {
        if active_len(inj).await == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("active set did not reach {expected} entries");
}

// ---- Scenarios ----------------------------------------------------------

#[tokio::test]
async fn simple_match_starts_worker_when_input_arrives() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    inj.add_factory(echo_factory("a", &["x"])).await.unwrap();
    let item = inj.push_value("x", 7u32).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(
        kinds(&events),
        vec![
            EventKind::FactoryAdded,
            EventKind::ItemPushed,
            EventKind::ChildStarting,
            EventKind::ChildStarted,
        ]
    );
    let starting = &events[2];
    assert_eq!(starting.factory, Some(FactoryId::from("a")));
    assert_eq!(starting.value.as_deref(), Some("[{x, 7}]"));

    let snap = inj.snapshot().await.unwrap();
    assert_eq!(snap.active.len(), 1);
    assert_eq!(snap.active[0].factory, FactoryId::from("a"));
    assert_eq!(snap.active[0].tuple, vec![item.item_ref()]);
}

#[tokio::test]
async fn cartesian_product_starts_every_combination_in_order() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    inj.add_factory(echo_factory("b", &["x", "y"])).await.unwrap();
    let x1 = inj.push_value("x", 1u32).await.unwrap();
    let x2 = inj.push_value("x", 2u32).await.unwrap();
    let y9 = inj.push_value("y", 9u32).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(
        started_tuples(&events),
        vec![
            vec![x1.item_ref(), y9.item_ref()],
            vec![x2.item_ref(), y9.item_ref()],
        ]
    );

    let y10 = inj.push_value("y", 10u32).await.unwrap();
    let events = drain(&mut rx);
    assert_eq!(
        started_tuples(&events),
        vec![
            vec![x1.item_ref(), y10.item_ref()],
            vec![x2.item_ref(), y10.item_ref()],
        ]
    );

    // Pushing never stops a worker.
    assert!(!events.iter().any(|e| e.kind == EventKind::ChildStopped));
    assert_eq!(active_len(&inj).await, 4);
}

#[tokio::test]
async fn withdrawal_cascades_to_every_dependent_entry() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    inj.add_factory(echo_factory("b", &["x", "y"])).await.unwrap();
    let x1 = inj.push_value("x", 1u32).await.unwrap();
    let x2 = inj.push_value("x", 2u32).await.unwrap();
    let y9 = inj.push_value("y", 9u32).await.unwrap();
    let y10 = inj.push_value("y", 10u32).await.unwrap();
    wait_active_len(&inj, 4).await;
    drain(&mut rx);

    x1.withdraw("gone");
    wait_active_len(&inj, 2).await;

    let events = drain(&mut rx);
    assert_eq!(
        kinds(&events),
        vec![
            EventKind::ItemRevoked,
            EventKind::ChildStopping,
            EventKind::ChildStopped,
            EventKind::ChildStopping,
            EventKind::ChildStopped,
        ]
    );
    assert_eq!(events[0].item, Some(x1.item_ref()));

    // Dependents stop in start order, with the revocation reason.
    let stopped: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::ChildStopped)
        .collect();
    assert_eq!(stopped[0].tuple, Some(vec![x1.item_ref(), y9.item_ref()]));
    assert_eq!(stopped[1].tuple, Some(vec![x1.item_ref(), y10.item_ref()]));
    for e in &stopped {
        assert_eq!(e.error.as_deref(), Some("revoked: gone"));
    }

    // No entry still references the withdrawn item, and the survivors are
    // exactly the x2 tuples.
    let snap = inj.snapshot().await.unwrap();
    assert!(snap
        .active
        .iter()
        .all(|e| !e.tuple.contains(&x1.item_ref())));
    assert_eq!(snap.active[0].tuple, vec![x2.item_ref(), y9.item_ref()]);
    assert_eq!(snap.active[1].tuple, vec![x2.item_ref(), y10.item_ref()]);
}

#[tokio::test]
async fn factory_removal_leaves_running_workers_alone() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    inj.add_factory(echo_factory("a", &["x"])).await.unwrap();
    inj.push_value("x", 7u32).await.unwrap();
    let before = inj.snapshot().await.unwrap();
    drain(&mut rx);

    inj.remove_factory("a").await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(kinds(&events), vec![EventKind::FactoryRemoved]);

    let after = inj.snapshot().await.unwrap();
    assert_eq!(after.active, before.active);
    assert!(after.factories.is_empty());

    let err = inj.remove_factory("a").await.unwrap_err();
    assert_eq!(err.as_label(), "not_found");
}

#[tokio::test]
async fn spawn_timeout_logs_stopped_and_stays_out_of_active_set() {
    let cfg = Config {
        spawn_timeout: Duration::from_millis(50),
        ..Config::default()
    };
    let engine = EngineBuilder::new(cfg).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    inj.add_factory(Factory::new(
        "slow",
        ["x"],
        StartFn::arc(|host: Host, _deps: Deps| async move {
            host.spawn::<SleepyInit>(()).await
        }),
    ))
    .await
    .unwrap();
    inj.push_value("x", 1u32).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(
        kinds(&events),
        vec![
            EventKind::FactoryAdded,
            EventKind::ItemPushed,
            EventKind::ChildStarting,
            EventKind::ChildStopped,
        ]
    );
    let stopped = events.last().unwrap();
    assert!(stopped.error.as_deref().unwrap().starts_with("spawn_timeout"));
    assert_eq!(active_len(&inj).await, 0);
}

#[tokio::test]
async fn rpc_to_cascade_stopped_worker_reports_peer_down() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    let slot: Slot = Arc::default();
    inj.add_factory(capturing_factory("a", &["x"], Arc::clone(&slot)))
        .await
        .unwrap();
    let item = inj.push_value("x", 7u32).await.unwrap();
    let handle = slot.lock().unwrap().clone().unwrap();

    item.withdraw("red unplugged");
    let reason = handle.terminated().await;
    assert_eq!(
        reason,
        ExitReason::Revoked {
            reason: "red unplugged".into()
        }
    );

    match handle.rpc("ping", None).await {
        Err(RpcError::PeerDown { reason }) => assert_eq!(
            reason,
            ExitReason::Revoked {
                reason: "red unplugged".into()
            }
        ),
        other => panic!("expected PeerDown, got {other:?}"),
    }

    wait_active_len(&inj, 0).await;
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| e.kind == EventKind::RpcFailed));
}

// ---- Properties and open-question pins ----------------------------------

#[tokio::test]
async fn empty_requires_starts_singleton() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    inj.add_factory(echo_factory("once", &[])).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(
        kinds(&events),
        vec![
            EventKind::FactoryAdded,
            EventKind::ChildStarting,
            EventKind::ChildStarted,
        ]
    );

    let snap = inj.snapshot().await.unwrap();
    assert_eq!(snap.active.len(), 1);
    assert!(snap.active[0].tuple.is_empty());
}

#[tokio::test]
async fn replaying_operations_is_idempotent() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();

    let item = Item::new("x", 7u32);
    inj.add_factory(echo_factory("a", &["x"])).await.unwrap();
    inj.push(item.clone()).await.unwrap();
    let once = inj.snapshot().await.unwrap();

    let mut rx = engine.subscribe();
    let err = inj
        .add_factory(echo_factory("a", &["x"]))
        .await
        .unwrap_err();
    assert_eq!(err.as_label(), "already_added");
    inj.push(item.clone()).await.unwrap();

    let twice = inj.snapshot().await.unwrap();
    assert_eq!(once.active, twice.active);
    assert!(
        drain(&mut rx).is_empty(),
        "replay must not spawn or emit anything"
    );
}

#[tokio::test]
async fn push_withdraw_round_trips_the_item_table() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();

    let item = inj.push_value("x", 7u32).await.unwrap();
    assert_eq!(inj.snapshot().await.unwrap().items.len(), 1);

    item.withdraw("done");
    for _ in 0..200 {
        if inj.snapshot().await.unwrap().items.is_empty() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(inj.snapshot().await.unwrap().items.is_empty());

    // A withdrawn item never reappears.
    inj.push(item.clone()).await.unwrap();
    assert!(inj.snapshot().await.unwrap().items.is_empty());
}

#[tokio::test]
async fn readd_after_remove_is_fresh() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();

    inj.add_factory(echo_factory("a", &["x"])).await.unwrap();
    inj.push_value("x", 1u32).await.unwrap();
    inj.remove_factory("a").await.unwrap();

    let mut rx = engine.subscribe();
    inj.add_factory(echo_factory("a", &["x"])).await.unwrap();

    // The orphan's tuple collides by idempotence: no double spawn.
    let events = drain(&mut rx);
    assert_eq!(kinds(&events), vec![EventKind::FactoryAdded]);
    assert_eq!(active_len(&inj).await, 1);

    // New items match against the re-added factory.
    inj.push_value("x", 2u32).await.unwrap();
    assert_eq!(active_len(&inj).await, 2);
}

#[tokio::test]
async fn identical_scripts_emit_identical_event_streams() {
    async fn script() -> Vec<(EventKind, Option<FactoryId>, Option<String>, Option<String>)> {
        let engine = EngineBuilder::new(Config::default()).build();
        let inj = engine.start();
        let mut rx = engine.subscribe();

        inj.add_factory(echo_factory("b", &["x", "y"])).await.unwrap();
        inj.add_factory(echo_factory("a", &["x"])).await.unwrap();
        inj.push_value("x", 1u32).await.unwrap();
        inj.push_value("x", 2u32).await.unwrap();
        inj.push_value("y", 9u32).await.unwrap();

        drain(&mut rx)
            .into_iter()
            .map(|e| (e.kind, e.factory, e.value, e.error))
            .collect()
    }

    assert_eq!(script().await, script().await);
}

#[tokio::test]
async fn failed_start_recipe_is_not_retried() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    inj.add_factory(Factory::new(
        "broken",
        ["x"],
        StartFn::arc(|_host: Host, _deps: Deps| async move {
            Err::<WorkerHandle, _>(depvisor::SpawnError::InitFailed {
                reason: "recipe refused".into(),
            })
        }),
    ))
    .await
    .unwrap();
    inj.push_value("x", 1u32).await.unwrap();

    let events = drain(&mut rx);
    let stopped = events.last().unwrap();
    assert_eq!(stopped.kind, EventKind::ChildStopped);
    assert!(stopped
        .error
        .as_deref()
        .unwrap()
        .starts_with("spawn_init_failed"));
    assert_eq!(active_len(&inj).await, 0);

    // A later push for the key recomputes matching: the failed tuple never
    // entered the active set, so it is re-attempted alongside the new one.
    inj.push_value("x", 2u32).await.unwrap();
    let events = drain(&mut rx);
    let starting: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::ChildStarting)
        .collect();
    assert_eq!(starting.len(), 2);
    assert_eq!(active_len(&inj).await, 0);
}

#[tokio::test]
async fn owner_death_revokes_its_items() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    let owner = engine.host().spawn::<Echo>(()).await.unwrap();
    let item = Item::owned("cfg", 1u32, &owner);
    inj.push(item.clone()).await.unwrap();
    inj.add_factory(echo_factory("g", &["cfg"])).await.unwrap();
    assert_eq!(active_len(&inj).await, 1);
    drain(&mut rx);

    owner.stop(ExitReason::Normal);
    wait_active_len(&inj, 0).await;

    assert!(item.is_revoked());
    let events = drain(&mut rx);
    let revoked = events
        .iter()
        .find(|e| e.kind == EventKind::ItemRevoked)
        .unwrap();
    assert!(revoked.error.as_deref().unwrap().contains("owner"));
    assert!(events.iter().any(|e| e.kind == EventKind::ChildStopped));
}

#[tokio::test]
async fn worker_may_not_push_a_key_it_depends_on() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();

    let slot: Slot = Arc::default();
    inj.add_factory(capturing_factory("f", &["k1"], Arc::clone(&slot)))
        .await
        .unwrap();
    inj.push_value("k1", 1u32).await.unwrap();
    let worker = slot.lock().unwrap().clone().unwrap();

    let err = inj
        .push(Item::owned("k1", 2u32, &worker))
        .await
        .unwrap_err();
    assert_eq!(err.as_label(), "self_injection");

    // Keys outside the worker's own requires are fine.
    inj.push(Item::owned("other", 3u32, &worker)).await.unwrap();
    assert_eq!(inj.snapshot().await.unwrap().items.len(), 2);
}

#[tokio::test]
async fn crashed_worker_is_not_restarted() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    let slot: Slot = Arc::default();
    inj.add_factory(capturing_factory("a", &["x"], Arc::clone(&slot)))
        .await
        .unwrap();
    inj.push_value("x", 1u32).await.unwrap();
    let worker = slot.lock().unwrap().clone().unwrap();
    drain(&mut rx);

    // Death without item revocation: the entry goes away, nothing respawns.
    worker.stop(ExitReason::Normal);
    wait_active_len(&inj, 0).await;

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| e.kind == EventKind::ChildStopped));
    assert!(!events.iter().any(|e| e.kind == EventKind::ChildStarting));
    // The item is still present; only a new push/add re-matches.
    assert_eq!(inj.snapshot().await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn graceful_shutdown_stops_the_population() {
    let engine = EngineBuilder::new(Config::default()).build();
    let inj = engine.start();
    let mut rx = engine.subscribe();

    let slot: Slot = Arc::default();
    inj.add_factory(capturing_factory("a", &["x"], Arc::clone(&slot)))
        .await
        .unwrap();
    inj.push_value("x", 7u32).await.unwrap();
    let worker = slot.lock().unwrap().clone().unwrap();
    drain(&mut rx);

    engine.shutdown().await.unwrap();

    assert_eq!(worker.terminated().await, ExitReason::Canceled);
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| e.kind == EventKind::ShutdownRequested));
    assert!(events.iter().any(|e| e.kind == EventKind::ChildStopped));

    let err = inj.push_value("x", 8u32).await.unwrap_err();
    assert_eq!(err.as_label(), "not_running");
}
