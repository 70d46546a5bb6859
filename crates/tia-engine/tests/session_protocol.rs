use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tia_analysis::ManifestAnalyzer;
use tia_engine::{
    AgentInfo, BaselinePolicy, Controller, DispatchOutcome, EngineConfig, MemorySender,
    RetryPolicy, SessionEvent,
};
use tia_test_utils::{
    add_unit, agent, finished, initialized, init, load_build, probe_part, record, session,
    started, test_record,
};
use tokio::task::JoinSet;

fn engine(config: EngineConfig) -> (Controller, Arc<MemorySender>) {
    let sender = Arc::new(MemorySender::new());
    let controller = Controller::new(
        sender.clone(),
        Arc::new(ManifestAnalyzer::new()),
        config,
    )
    .unwrap();
    (controller, sender)
}

async fn run(
    controller: &Controller,
    info: &AgentInfo,
    events: Vec<SessionEvent>,
) -> Vec<DispatchOutcome> {
    let mut outcomes = Vec::with_capacity(events.len());
    for event in events {
        outcomes.push(controller.process_event(info, event).await.unwrap());
    }
    outcomes
}

fn coverage_of(sender: &MemorySender, destination: &str) -> Vec<Option<f64>> {
    sender
        .deliveries_to(destination)
        .iter()
        .map(|d| d.json().unwrap()["coverage"].as_f64())
        .collect()
}

#[tokio::test]
async fn test_end_to_end_two_builds() {
    let (controller, sender) = engine(EngineConfig::default());
    let info = agent("petclinic", "1.0");

    run(
        &controller,
        &info,
        load_build("1.0", &[("com/acme/X", &["a", "b"]), ("com/acme/Y", &["c"])]),
    )
    .await;
    let outcomes = run(
        &controller,
        &info,
        session(
            "s1",
            vec![
                test_record("com/acme/X", &[true, false], "T1"),
                test_record("com/acme/Y", &[false], "T2"),
                record("com/acme/X", &[false, true]),
            ],
        ),
    )
    .await;

    assert!(outcomes.iter().all(|o| o.applied));
    let report = outcomes.last().unwrap().report.as_ref().unwrap();
    assert_eq!(report.coverage_block.classes_count, 2);

    let coverage = sender.deliveries_to("/coverage");
    assert_eq!(coverage.len(), 1);
    let block = coverage[0].json().unwrap();
    assert_eq!(block["classesCount"], 2);
    assert_eq!(block["methodsCount"], 3);
    assert_eq!(block["uncoveredMethodsCount"], 1);
    let ratio = block["coverage"].as_f64().unwrap();
    assert!((ratio - 4.0 / 6.0).abs() < 1e-9);
    assert!(sender.deliveries_to("/new-methods").is_empty());

    let info = agent("petclinic", "1.1");
    run(
        &controller,
        &info,
        load_build("1.1", &[("com/acme/X", &["a", "b", "m"]), ("com/acme/Y", &["c"])]),
    )
    .await;
    run(
        &controller,
        &info,
        session("s2", vec![record("com/acme/X", &[false, false, true])]),
    )
    .await;

    let new_methods = sender.deliveries_to("/new-methods");
    assert_eq!(new_methods.len(), 1);
    let listed = new_methods[0].json().unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "m");
    assert_eq!(listed[0]["ownerClass"], "com/acme/X");

    let new_block = sender.deliveries_to("/coverage-new");
    assert_eq!(new_block.len(), 1);
    assert_eq!(new_block[0].json().unwrap()["methodsCovered"], 1);
}

#[tokio::test]
async fn test_attribution_does_not_cross_tests() {
    let (controller, _sender) = engine(EngineConfig::default());
    let info = agent("a", "1.0");
    run(&controller, &info, load_build("1.0", &[("p/X", &["m", "n"])])).await;

    let outcomes = run(
        &controller,
        &info,
        session(
            "s1",
            vec![
                test_record("p/X", &[true, false], "T1"),
                test_record("p/X", &[false, true], "T2"),
            ],
        ),
    )
    .await;

    let report = outcomes.last().unwrap().report.as_ref().unwrap();
    let tests_of = |method: &str| {
        report
            .associated_tests
            .iter()
            .find(|a| a.method_name.as_deref() == Some(method))
            .map(|a| a.tests.clone())
    };
    assert_eq!(tests_of("m"), Some(vec!["T1".to_string()]));
    assert_eq!(tests_of("n"), Some(vec!["T2".to_string()]));
    assert_eq!(report.test_usages.len(), 2);
}

#[tokio::test]
async fn test_trend_follows_scope_growth() {
    let (controller, sender) = engine(EngineConfig::default());
    let info = agent("a", "1.0");
    run(&controller, &info, load_build("1.0", &[("p/X", &["m", "n"])])).await;

    run(&controller, &info, session("s1", vec![record("p/X", &[true, false])])).await;
    run(&controller, &info, session("s2", vec![record("p/X", &[true, true])])).await;

    let arrows: Vec<_> = sender
        .deliveries_to("/coverage")
        .iter()
        .map(|d| d.json().unwrap()["arrow"].clone())
        .collect();
    assert_eq!(arrows, vec![serde_json::Value::Null, serde_json::json!("INCREASE")]);
}

#[tokio::test]
async fn test_events_in_wrong_state_are_ignored() {
    let (controller, sender) = engine(EngineConfig::default());
    let info = agent("a", "1.0");

    let outcomes = run(
        &controller,
        &info,
        vec![
            started("s1"),
            probe_part(vec![record("p/X", &[true])]),
            finished("s1"),
            add_unit("p/X", &["m"]),
            initialized(0),
        ],
    )
    .await;

    assert!(outcomes.iter().all(|o| *o == DispatchOutcome::ignored()));
    assert!(sender.deliveries().is_empty());
}

#[tokio::test]
async fn test_partial_ingestion_is_not_reported() {
    let (controller, sender) = engine(EngineConfig::default());
    let info = agent("a", "1.0");

    let outcomes = run(
        &controller,
        &info,
        vec![init("1.0"), add_unit("p/X", &["m"]), initialized(2), started("s1")],
    )
    .await;
    assert!(!outcomes[2].applied);
    assert!(!outcomes[3].applied);

    let outcomes = run(&controller, &info, vec![add_unit("p/Y", &["n"]), initialized(2)]).await;
    assert!(outcomes.iter().all(|o| o.applied));
    assert!(sender.deliveries_to("/coverage").is_empty());
}

#[tokio::test]
async fn test_cancelled_session_is_not_reported() {
    let (controller, sender) = engine(EngineConfig::default());
    let info = agent("a", "1.0");
    run(&controller, &info, load_build("1.0", &[("p/X", &["m"])])).await;

    let outcomes = run(
        &controller,
        &info,
        vec![
            started("s1"),
            probe_part(vec![record("p/X", &[true])]),
            SessionEvent::SessionCancelled {
                session_id: "s1".into(),
            },
            finished("s1"),
        ],
    )
    .await;

    assert!(outcomes[2].applied);
    assert!(!outcomes[3].applied);
    assert!(sender.deliveries_to("/coverage").is_empty());
    let states: Vec<_> = sender
        .deliveries_to("/collection-state")
        .iter()
        .map(|d| d.json().unwrap()["state"].as_bool().unwrap())
        .collect();
    assert_eq!(states, vec![true, false]);
}

#[tokio::test]
async fn test_unchanged_rebuild_emits_baseline() {
    let (controller, sender) = engine(EngineConfig::default());
    let info = agent("a", "1.0");
    let build = || load_build("1.0", &[("p/X", &["m"]), ("p/Y", &["n"])]);

    let first = run(&controller, &info, build()).await;
    assert!(first.last().unwrap().report.is_none());
    assert!(sender.deliveries_to("/coverage").is_empty());

    let again = run(&controller, &info, build()).await;
    let report = again.last().unwrap().report.as_ref().unwrap();
    assert_eq!(report.coverage_block.classes_count, 2);
    assert_eq!(coverage_of(&sender, "/coverage"), vec![Some(0.0)]);
}

#[tokio::test]
async fn test_baseline_policy_never() {
    let (controller, sender) =
        engine(EngineConfig::default().with_baseline_policy(BaselinePolicy::Never));
    let info = agent("a", "1.0");
    let build = || load_build("1.0", &[("p/X", &["m"])]);

    run(&controller, &info, build()).await;
    let again = run(&controller, &info, build()).await;

    assert!(again.last().unwrap().applied);
    assert!(again.last().unwrap().report.is_none());
    assert!(sender.deliveries_to("/coverage").is_empty());
}

#[tokio::test]
async fn test_baseline_policy_always() {
    let (controller, sender) =
        engine(EngineConfig::default().with_baseline_policy(BaselinePolicy::Always));
    let info = agent("a", "1.0");

    run(&controller, &info, load_build("1.0", &[("p/X", &["m"])])).await;

    assert_eq!(coverage_of(&sender, "/coverage"), vec![Some(0.0)]);
}

#[tokio::test]
async fn test_delivery_is_retried() {
    let (controller, sender) = engine(
        EngineConfig::default().with_delivery_retry(RetryPolicy::new(3, 0)),
    );
    let info = agent("a", "1.0");
    run(&controller, &info, load_build("1.0", &[("p/X", &["m"])])).await;

    sender.fail_next_sends(2);
    run(&controller, &info, session("s1", vec![record("p/X", &[true])])).await;

    assert_eq!(coverage_of(&sender, "/coverage"), vec![Some(1.0)]);
    assert_eq!(sender.deliveries_to("/collection-state").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_is_abandoned() {
    let (controller, sender) =
        engine(EngineConfig::default().with_idle_timeout(Duration::from_secs(5)));
    let info = agent("a", "1.0");
    run(&controller, &info, load_build("1.0", &[("p/X", &["m"])])).await;
    run(&controller, &info, vec![started("s1"), probe_part(vec![record("p/X", &[true])])]).await;

    tokio::time::sleep(Duration::from_secs(6)).await;

    let outcome = controller.process_event(&info, finished("s1")).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::ignored());
    let states: Vec<_> = sender
        .deliveries_to("/collection-state")
        .iter()
        .map(|d| d.json().unwrap()["state"].as_bool().unwrap())
        .collect();
    assert_eq!(states, vec![true, false]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_events_share_one_worker() {
    let (controller, _sender) = engine(EngineConfig::default());
    let controller = Arc::new(controller);
    let mut tasks = JoinSet::new();

    for _ in 0..16 {
        let controller = Arc::clone(&controller);
        tasks.spawn(async move {
            controller
                .process_event(&agent("fresh", "1.0"), init("1.0"))
                .await
                .unwrap()
        });
    }
    while let Some(outcome) = tasks.join_next().await {
        assert!(outcome.unwrap().applied);
    }

    assert_eq!(controller.registry().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_agents_are_independent() {
    let (controller, sender) = engine(EngineConfig::default());
    let controller = Arc::new(controller);
    let mut tasks = JoinSet::new();

    for (id, hits) in [("a", vec![true, false]), ("b", vec![true, true])] {
        let controller = Arc::clone(&controller);
        tasks.spawn(async move {
            let info = agent(id, "1.0");
            run(&controller, &info, load_build("1.0", &[("p/X", &["m", "n"])])).await;
            run(&controller, &info, session("s1", vec![record("p/X", &hits)])).await;
        });
    }
    while let Some(done) = tasks.join_next().await {
        done.unwrap();
    }

    let mut per_agent: Vec<_> = sender
        .deliveries_to("/coverage")
        .iter()
        .map(|d| (d.agent_id.to_string(), d.json().unwrap()["coverage"].as_f64()))
        .collect();
    per_agent.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        per_agent,
        vec![("a".to_string(), Some(0.5)), ("b".to_string(), Some(1.0))]
    );
}

#[tokio::test]
async fn test_raw_protocol_messages() {
    let (controller, sender) = engine(EngineConfig::default());
    let info = agent("a", "1.0");
    let class_bytes = serde_json::json!({
        "type": "CLASS_BYTES",
        "data": { "className": "p/X", "bytes": tia_test_utils::unit(&["m"]) }
    });

    let messages = [
        r#"{"type":"INIT","data":{"buildVersion":"1.0","message":"","classesCount":1}}"#.to_string(),
        class_bytes.to_string(),
        r#"{"type":"INITIALIZED","data":""}"#.to_string(),
        r#"{"type":"SESSION_STARTED","data":"s1"}"#.to_string(),
        r#"{"type":"COVERAGE_DATA_PART","data":[{"id":1,"className":"p/X","probes":[true]}]}"#
            .to_string(),
        r#"{"type":"SESSION_FINISHED","data":"s1"}"#.to_string(),
    ];
    for message in &messages {
        let outcome = controller.process_raw(&info, message).await.unwrap();
        assert!(outcome.applied, "not applied: {message}");
    }

    assert_eq!(coverage_of(&sender, "/coverage"), vec![Some(1.0)]);
}
