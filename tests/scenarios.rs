//! Scenario tests
//!
//! Exercises the six worked scenarios against the public API: binary-index
//! range queries, unique-key rejection, chained pipelines, eqJoin, TTL
//! expiry, and transactional rollback.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use lokidb::collection::{CollectionOptions, TtlOptions};
use lokidb::document::Meta;
use lokidb::index::RangeOp;
use lokidb::{Collection, Query};
use serde_json::json;

// =============================================================================
// Scenario 1: BinaryIndex range query
// =============================================================================

#[test]
fn scenario_binary_index_range_query_returns_matching_names() {
    let mut coll = Collection::new(
        "people",
        CollectionOptions { indices: vec!["age".to_string()], ..Default::default() },
    );
    coll.insert(json!({"name": "a", "age": 30})).unwrap();
    coll.insert(json!({"name": "b", "age": 25})).unwrap();
    coll.insert(json!({"name": "c", "age": 40})).unwrap();

    let rs = coll.chain().find(&json!({"age": {"$gt": 28}})).unwrap();
    let names: HashSet<String> = rs.data().iter().map(|d| d["name"].as_str().unwrap().to_string()).collect();
    assert_eq!(names, HashSet::from(["a".to_string(), "c".to_string()]));
}

// =============================================================================
// Scenario 2: UniqueIndex duplicate rejection
// =============================================================================

#[test]
fn scenario_duplicate_unique_key_is_rejected_and_count_stays_one() {
    let mut coll = Collection::new(
        "people",
        CollectionOptions { unique: vec!["name".to_string()], ..Default::default() },
    );
    coll.insert(json!({"name": "a"})).unwrap();
    let err = coll.insert(json!({"name": "a"})).unwrap_err();
    assert_eq!(err.code(), "LOKI_DUPLICATE_KEY");
    assert_eq!(coll.len(), 1);
}

// =============================================================================
// Scenario 3: chained find/simplesort/limit
// =============================================================================

#[test]
fn scenario_chained_find_simplesort_limit_returns_two_sorted_fr_docs() {
    let mut coll = Collection::new("people", CollectionOptions::default());
    coll.insert(json!({"name": "a", "country": "fr", "age": 30})).unwrap();
    coll.insert(json!({"name": "b", "country": "fr", "age": 25})).unwrap();
    coll.insert(json!({"name": "c", "country": "us", "age": 40})).unwrap();
    coll.insert(json!({"name": "d", "country": "fr", "age": 50})).unwrap();
    coll.insert(json!({"name": "e", "country": "de", "age": 20})).unwrap();

    let rs = coll
        .chain()
        .find(&json!({"country": "fr"}))
        .unwrap()
        .simplesort("age", false)
        .limit(2);

    let docs = rs.data();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d["country"] == json!("fr")));
    let ages: Vec<i64> = docs.iter().map(|d| d["age"].as_i64().unwrap()).collect();
    let mut sorted = ages.clone();
    sorted.sort();
    assert_eq!(ages, sorted);
    assert_eq!(ages, vec![25, 30]);
}

// =============================================================================
// Scenario 4: eqJoin
// =============================================================================

#[test]
fn scenario_eq_join_produces_one_row_per_order_with_matching_product() {
    let mut orders = Collection::new("orders", CollectionOptions::default());
    orders.insert(json!({"prodId": "p1", "qty": 2})).unwrap();
    orders.insert(json!({"prodId": "p2", "qty": 1})).unwrap();
    orders.insert(json!({"prodId": "p1", "qty": 5})).unwrap();

    let mut products = Collection::new("products", CollectionOptions::default());
    products.insert(json!({"productId": "p1", "label": "Widget"})).unwrap();
    products.insert(json!({"productId": "p2", "label": "Gadget"})).unwrap();

    let joined = orders.chain().eq_join(&products, "prodId", "productId").unwrap();
    assert_eq!(joined.count(), orders.len());
    for doc in joined.data() {
        assert!(doc.get("qty").is_some());
        assert!(doc.get("right_label").is_some());
    }
}

// =============================================================================
// Scenario 5: TTL expiry
// =============================================================================

#[test]
fn scenario_ttl_daemon_removes_expired_document() {
    let mut coll = Collection::new(
        "sessions",
        CollectionOptions {
            disable_meta: true,
            ttl: TtlOptions { age: Some(Duration::seconds(100)), interval: Duration::seconds(10) },
            ..Default::default()
        },
    );
    let stale = Meta {
        created: Utc::now() - Duration::seconds(200),
        updated: Utc::now() - Duration::seconds(200),
        revision: 0,
        version: 0,
    };
    coll.insert(json!({"name": "stale", "meta": stale})).unwrap();
    assert_eq!(coll.len(), 1);

    coll.ttl_sweep(Utc::now()).unwrap();
    assert_eq!(coll.len(), 0);
}

// =============================================================================
// Scenario 6: transactional rollback
// =============================================================================

#[test]
fn scenario_transaction_rollback_restores_count() {
    let mut coll = Collection::new("people", CollectionOptions::default());
    coll.insert(json!({"name": "a"})).unwrap();
    let count_before = coll.len();

    coll.start_transaction();
    coll.insert(json!({"name": "b"})).unwrap();
    coll.rollback_transaction();

    assert_eq!(coll.len(), count_before);
}

// =============================================================================
// Supporting: indexed range via Collection directly (not through Resultset)
// =============================================================================

#[test]
fn range_positions_resolves_directly_against_collection() {
    let mut coll = Collection::new(
        "people",
        CollectionOptions { indices: vec!["age".to_string()], ..Default::default() },
    );
    coll.insert(json!({"name": "a", "age": 30})).unwrap();
    coll.insert(json!({"name": "b", "age": 25})).unwrap();

    let positions = coll.range_positions("age", &RangeOp::Gte(&json!(30))).unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(coll.data()[positions[0]]["name"], json!("a"));
}

#[test]
fn query_compiles_and_matches_single_document() {
    let query = Query::compile(&json!({"age": {"$between": [20, 35]}})).unwrap();
    assert!(query.matches(&json!({"age": 30})));
    assert!(!query.matches(&json!({"age": 40})));
}
