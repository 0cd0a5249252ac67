//! Registry integration tests
//!
//! Exercise the service end to end against a registry file in a scratch
//! directory and verify what lands on disk.

use std::time::Duration;

use pretty_assertions::assert_eq;
use sdn_orchestrators::{
    codec, field_map, targets_of_type, OrchestratorType, RegistryError, UpdateRequest,
};
use sdn_orchestrators_test::{
    fixtures::{afc_fixtures, psm_fixtures, OrchestratorFixture, SAMPLE_REGISTRY},
    RegistryTestEnv, RegistryVerifier,
};

/// Records written through the service read back with identical fields
#[tokio::test]
async fn test_round_trip_through_file() {
    let env = RegistryTestEnv::new().unwrap();
    let service = env.service();

    psm_fixtures::psm_with_reservations("psm1")
        .create(&service)
        .await
        .unwrap();
    afc_fixtures::afc_with_token("afc1")
        .create(&service)
        .await
        .unwrap();

    let first = service.snapshot().await.unwrap();
    let reparsed = codec::parse(codec::write(&first).as_bytes(), env.parse_mode()).unwrap();
    for id in ["psm1", "afc1"] {
        assert_eq!(reparsed.get(id), first.get(id));
    }

    let verifier = RegistryVerifier::new(&env);
    verifier
        .assert_field("psm1", "reserved_vlans", "1,4000-4010")
        .unwrap();
    verifier.assert_field("afc1", "verify_ssl", "1").unwrap();
    verifier.assert_field("psm1", "verify_ssl", "0").unwrap();
}

/// Hand-written files load, and the service keeps their order
#[tokio::test]
async fn test_existing_file_is_loaded() {
    let env = RegistryTestEnv::with_content(SAMPLE_REGISTRY).unwrap();
    let service = env.service();

    let summaries = service.list().await.unwrap();
    let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["fabric-east", "psm-main"]);

    let record = service.get("psm-main").await.unwrap();
    assert_eq!(record.get_text("description").as_deref(), Some("Primary PSM cluster"));
    assert_eq!(record.get_bool("verify_ssl"), Some(false));

    afc_fixtures::afc("afc-new").create(&service).await.unwrap();
    RegistryVerifier::new(&env)
        .assert_order(&["psm-main", "fabric-east", "afc-new"])
        .unwrap();
}

/// Ids are unique across both types
#[tokio::test]
async fn test_id_unique_across_types() {
    let env = RegistryTestEnv::new().unwrap();
    let service = env.service();

    psm_fixtures::psm("lab").create(&service).await.unwrap();
    let before = env.read_raw().unwrap();

    let err = afc_fixtures::afc("lab").create(&service).await.unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyExists { ref id } if id == "lab"));
    assert_eq!(env.read_raw().unwrap(), before);
}

/// Order values grow past deleted entries
#[tokio::test]
async fn test_order_assignment_after_delete() {
    let env = RegistryTestEnv::new().unwrap();
    let service = env.service();

    for id in ["a", "b", "c"] {
        psm_fixtures::psm(id).create(&service).await.unwrap();
    }
    service.delete("b", None).await.unwrap();
    psm_fixtures::psm("d").create(&service).await.unwrap();

    let registry = service.snapshot().await.unwrap();
    assert_eq!(registry.order_of("b"), None);
    let c = registry.order_of("c").unwrap();
    let d = registry.order_of("d").unwrap();
    assert!(d > c, "d={d} must follow c={c}");

    let verifier = RegistryVerifier::new(&env);
    verifier.assert_order(&["a", "c", "d"]).unwrap();
    verifier.assert_absent("b").unwrap();
}

/// Defaults follow the record's type
#[tokio::test]
async fn test_type_defaults() {
    let env = RegistryTestEnv::new().unwrap();
    let service = env.service();

    psm_fixtures::psm("p").create(&service).await.unwrap();
    afc_fixtures::afc_with_token("f").create(&service).await.unwrap();

    let verifier = RegistryVerifier::new(&env);
    verifier.assert_field("p", "verify_ssl", "0").unwrap();
    verifier.assert_field("p", "poll_interval_seconds", "60").unwrap();
    verifier.assert_field("p", "request_timeout", "10").unwrap();
    verifier.assert_field("f", "verify_ssl", "1").unwrap();
    verifier.assert_field("f", "poll_interval_seconds", "120").unwrap();
    verifier.assert_field("f", "request_timeout", "30").unwrap();
    verifier.assert_field("f", "port", "443").unwrap();
    verifier.assert_field("f", "enabled", "1").unwrap();
}

/// AFC needs a password or a token; PSM needs a password
#[tokio::test]
async fn test_credential_rules() {
    let env = RegistryTestEnv::new().unwrap();
    let service = env.service();

    let err = afc_fixtures::afc_without_credentials("f1")
        .create(&service)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::MissingCredential { .. }));

    afc_fixtures::afc_with_token("f2").create(&service).await.unwrap();

    let err = psm_fixtures::psm_without_password("p1")
        .create(&service)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "missing_credential");

    let summaries = service.list().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, "f2");
}

/// Deleting a field and setting it in the same request keeps the new value
#[tokio::test]
async fn test_partial_update() {
    let env = RegistryTestEnv::new().unwrap();
    let service = env.service();
    psm_fixtures::psm("p1")
        .with_field("description", "lab")
        .create(&service)
        .await
        .unwrap();

    service
        .update("p1", UpdateRequest::new().delete("description"))
        .await
        .unwrap();
    let verifier = RegistryVerifier::new(&env);
    verifier.assert_no_field("p1", "description").unwrap();
    verifier.assert_field("p1", "host", "p1.psm.lab").unwrap();
    verifier.assert_field("p1", "port", "443").unwrap();

    service
        .update(
            "p1",
            UpdateRequest::new()
                .delete("description")
                .set("description", "x")
                .set("port", 8443i64),
        )
        .await
        .unwrap();
    verifier.assert_field("p1", "description", "x").unwrap();
    verifier.assert_field("p1", "port", "8443").unwrap();
}

/// Updates are validated against the record's type
#[tokio::test]
async fn test_update_validation() {
    let env = RegistryTestEnv::new().unwrap();
    let service = env.service();
    psm_fixtures::psm("p1").create(&service).await.unwrap();
    let before = env.read_raw().unwrap();

    let err = service
        .update("p1", UpdateRequest::new().set("fabric_name", "dc1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_field");

    let err = service
        .update("p1", UpdateRequest::new().set("poll_interval_seconds", 5i64))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_field");

    let err = service
        .update("missing", UpdateRequest::new().set("description", "x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");

    assert_eq!(env.read_raw().unwrap(), before);
}

/// Two writers racing on the same id: exactly one wins
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_create_same_id() {
    let env = RegistryTestEnv::new().unwrap();
    let first = env.service();
    let second = env.service();

    let a = tokio::spawn(async move { psm_fixtures::psm("X").create(&first).await });
    let b = tokio::spawn(async move { afc_fixtures::afc("X").create(&second).await });
    let results = [a.await.unwrap(), b.await.unwrap()];

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let dup = results
        .iter()
        .filter(|r| matches!(r, Err(RegistryError::AlreadyExists { .. })))
        .count();
    assert_eq!((ok, dup), (1, 1));
    assert_eq!(env.service().list().await.unwrap().len(), 1);
}

/// Writers with distinct ids never lose each other's records
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_all_persist() {
    let env = RegistryTestEnv::new().unwrap();

    let mut handles = Vec::new();
    for n in 0..8 {
        let service = env.service();
        handles.push(tokio::spawn(async move {
            psm_fixtures::psm(&format!("p{n}")).create(&service).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let registry = env.service().snapshot().await.unwrap();
    assert_eq!(registry.len(), 8);
    let mut orders: Vec<u64> = (0..8)
        .map(|n| registry.order_of(&format!("p{n}")).unwrap())
        .collect();
    orders.sort_unstable();
    orders.dedup();
    assert_eq!(orders.len(), 8);
}

/// Listing is sorted by id whatever the creation order
#[tokio::test]
async fn test_listing_sorted_by_id() {
    let env = RegistryTestEnv::new().unwrap();
    let service = env.service();
    for id in ["b", "a", "c"] {
        afc_fixtures::afc(id).create(&service).await.unwrap();
    }

    let summaries = service.list().await.unwrap();
    let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(summaries.iter().all(|s| s.kind == OrchestratorType::Afc));
}

/// Strict parsing rejects a garbage line; lenient parsing skips it
#[tokio::test]
async fn test_strict_and_lenient_parsing() {
    let content = format!("{}this is not a header\n", SAMPLE_REGISTRY);

    let lenient = RegistryTestEnv::with_content(&content).unwrap();
    assert_eq!(lenient.service().list().await.unwrap().len(), 2);

    let strict = RegistryTestEnv::with_content(&content).unwrap().strict();
    let err = strict.service().list().await.unwrap_err();
    assert!(matches!(err, RegistryError::Malformed { .. }));

    // Mutations refuse to rewrite a file they cannot fully read.
    let err = psm_fixtures::psm("p9")
        .create(&strict.service())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "malformed");
    assert_eq!(strict.read_raw().unwrap(), content);
}

/// Sections of a type this build does not know survive unrelated writes
#[tokio::test]
async fn test_foreign_section_survives_create() {
    let env = RegistryTestEnv::with_content("nsx: n1\n\thost nsx.lab\n").unwrap();
    let service = env.service();

    psm_fixtures::psm("p1").create(&service).await.unwrap();
    let raw = env.read_raw().unwrap();
    assert!(raw.starts_with("nsx: n1\n\thost nsx.lab\n\n"), "{raw}");
    assert!(raw.contains("psm: p1\n"));

    // The foreign id stays taken.
    let err = psm_fixtures::psm("n1").create(&service).await.unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyExists { .. }));

    service.delete("p1", None).await.unwrap();
    assert_eq!(env.read_raw().unwrap(), "nsx: n1\n\thost nsx.lab\n\n");
    assert!(service.list().await.unwrap().is_empty());
}

/// Records still carrying the legacy `fabric_names` key stay editable
#[tokio::test]
async fn test_legacy_fabric_names_update() {
    let env = RegistryTestEnv::with_content(
        "afc: a1\n\thost afc.lab\n\tfabric_names east,west\n\tapi_token t\n",
    )
    .unwrap();
    let service = env.service();

    service
        .update("a1", UpdateRequest::new().set("description", "x"))
        .await
        .unwrap();

    let verifier = RegistryVerifier::new(&env);
    verifier.assert_field("a1", "fabric_name", "east,west").unwrap();
    verifier.assert_no_field("a1", "fabric_names").unwrap();
    verifier.assert_field("a1", "description", "x").unwrap();

    let registry = service.snapshot().await.unwrap();
    let targets = targets_of_type(&registry, OrchestratorType::Afc);
    assert_eq!(targets[0].fabric_names, vec!["east", "west"]);
}

/// A held gate makes writers time out without touching the file
#[tokio::test]
async fn test_lock_timeout_leaves_file_untouched() {
    let env = RegistryTestEnv::new().unwrap();
    psm_fixtures::psm("p1").create(&env.service()).await.unwrap();
    let before = env.read_raw().unwrap();

    let guard = env.hold_lock().await.unwrap();
    let service = env.service_with_timeout(Duration::from_millis(150));
    let err = service.delete("p1", None).await.unwrap_err();
    assert!(matches!(err, RegistryError::LockTimeout { .. }));
    assert!(err.is_retryable());

    // Readers are never gated.
    assert!(service.get("p1").await.is_ok());
    drop(guard);

    assert_eq!(env.read_raw().unwrap(), before);
    service.delete("p1", None).await.unwrap();
    RegistryVerifier::new(&env).assert_absent("p1").unwrap();
}

/// Consumers see typed targets with defaults applied
#[tokio::test]
async fn test_consumer_targets() {
    let env = RegistryTestEnv::with_content(SAMPLE_REGISTRY).unwrap();
    let registry = env.service().snapshot().await.unwrap();

    let targets = targets_of_type(&registry, OrchestratorType::Afc);
    assert_eq!(targets.len(), 1);
    let target = &targets[0];
    assert_eq!(target.id, "fabric-east");
    assert_eq!(target.fabric_names, vec!["east"]);
    assert!(target.is_vlan_reserved(105));
    assert!(!target.is_vlan_reserved(111));
    assert_eq!(target.poll_interval, Duration::from_secs(120));
    assert!(!target.dry_run());
}

/// Fixtures render the same text the codec writes for plain values
#[test]
fn test_fixture_section_parses() {
    let fixture = OrchestratorFixture::new("p1", "psm")
        .with_field("host", "h")
        .with_field("user", "u");
    let registry =
        codec::parse(fixture.to_section().as_bytes(), sdn_orchestrators::ParseMode::Strict)
            .unwrap();
    let record = registry.get("p1").unwrap();
    assert_eq!(
        record.fields,
        field_map! { "host" => "h", "user" => "u" }
    );
}
