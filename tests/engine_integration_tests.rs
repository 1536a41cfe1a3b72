use plano_engine::{
    engine::{PlannerEngine, ScanType},
    stores::{DocumentStore, MemoryStore, StoreInitConfig},
    utils::{
        config::EngineConfig,
        error::{PlanoError, StoreError, ValidationError},
    },
};
use serde_json::json;

async fn engine() -> PlannerEngine {
    let engine = PlannerEngine::new(EngineConfig::default());
    let mut store = MemoryStore::new();
    store.connect(StoreInitConfig::new()).await.unwrap();
    engine.register_store("memory", Box::new(store)).await.unwrap();
    engine
}

#[tokio::test]
async fn test_index_creation_flips_plan_from_scan_to_index() {
    let engine = engine().await;
    let spec = json!({"filter": {"title": "1984"}});

    let before = engine.run_query("memory", "books", &spec).await.unwrap();
    assert_eq!(before.plan.scan_type, ScanType::FullScan);
    assert_eq!(before.output.stats.docs_examined, 12);

    engine.create_index("memory", "books", &json!({"title": 1}), false).await.unwrap();

    let after = engine.run_query("memory", "books", &spec).await.unwrap();
    assert_eq!(after.plan.scan_type, ScanType::IndexScan);
    assert_eq!(after.output.stats.docs_examined, 1);

    // Same documents either way
    assert_eq!(before.output.documents, after.output.documents);
}

#[tokio::test]
async fn test_pagination_queries() {
    let engine = engine().await;

    let page1 = engine
        .run_query(
            "memory",
            "books",
            &json!({
                "sort": {"title": 1},
                "limit": 5,
                "projection": {"title": 1, "author": 1, "_id": 0}
            }),
        )
        .await
        .unwrap();
    let page2 = engine
        .run_query(
            "memory",
            "books",
            &json!({
                "sort": {"title": 1},
                "skip": 5,
                "limit": 5,
                "projection": {"title": 1, "author": 1, "_id": 0}
            }),
        )
        .await
        .unwrap();

    assert_eq!(page1.output.row_count(), 5);
    assert_eq!(page2.output.row_count(), 5);

    // Pages are disjoint and ordered
    let first_of_page2 = page2.output.documents[0].get("title").unwrap();
    for doc in &page1.output.documents {
        assert!(doc.get("title").unwrap().as_str() < first_of_page2.as_str());
        assert!(!doc.contains_key("_id"));
        assert_eq!(doc.len(), 2);
    }
}

#[tokio::test]
async fn test_explain_reproduces_index_demonstration() {
    let engine = engine().await;
    engine.create_index("memory", "books", &json!({"title": 1}), false).await.unwrap();

    let report = engine
        .explain_query("memory", "books", &json!({"filter": {"title": "1984"}}))
        .await
        .unwrap();

    assert_eq!(report.plan.scan_type, ScanType::IndexScan);
    assert_eq!(report.comparison.collection_scan.docs_examined, 12);
    assert_eq!(report.comparison.index_scan.unwrap().docs_examined, 1);
    assert_eq!(report.comparison.index_name.as_deref(), Some("title_1"));
}

#[tokio::test]
async fn test_aggregation_average_price_by_genre() {
    let engine = engine().await;

    let results = engine
        .run_aggregation(
            "memory",
            "books",
            &json!([
                {"$group": {
                    "_id": "$genre",
                    "averagePrice": {"$avg": "$price"},
                    "bookCount": {"$sum": 1}
                }},
                {"$sort": {"averagePrice": -1}}
            ]),
        )
        .await
        .unwrap();

    // Fantasy is the most expensive genre in the seed data
    assert_eq!(results[0].get("_id"), Some(&json!("Fantasy")));
    assert_eq!(results[0].get("bookCount"), Some(&json!(3)));

    let genres: Vec<&str> =
        results.iter().filter_map(|doc| doc.get("_id").and_then(|v| v.as_str())).collect();
    assert!(genres.contains(&"Fiction"));
}

#[tokio::test]
async fn test_duplicate_index_surfaces_conflict() {
    let engine = engine().await;
    let keys = json!({"author": 1, "published_year": 1});

    engine.create_index("memory", "books", &keys, false).await.unwrap();
    let result = engine.create_index("memory", "books", &keys, false).await;

    assert!(matches!(
        result.unwrap_err(),
        PlanoError::Store(StoreError::IndexConflict(_))
    ));
}

#[tokio::test]
async fn test_error_taxonomy_end_to_end() {
    let engine = engine().await;

    // Caller fault, fails before any store call
    let validation = engine
        .run_query("memory", "books", &json!({"filter": {"x": {"$near": 1}}}))
        .await;
    assert!(matches!(
        validation.unwrap_err(),
        PlanoError::Validation(ValidationError::UnsupportedOperator(_))
    ));

    // Store fault
    let missing = engine.run_query("memory", "no_such_collection", &json!({})).await;
    assert!(matches!(
        missing.unwrap_err(),
        PlanoError::Store(StoreError::UnknownCollection(_))
    ));

    // Configuration fault
    let bad_store = engine.run_query("nowhere", "books", &json!({})).await;
    assert!(matches!(bad_store.unwrap_err(), PlanoError::Configuration(_)));
}

#[tokio::test]
async fn test_sorted_query_with_index_avoids_memory_sort() {
    let engine = engine().await;
    engine.create_index("memory", "books", &json!({"title": 1}), false).await.unwrap();

    let report = engine
        .run_query(
            "memory",
            "books",
            &json!({"filter": {"title": {"$gte": "A"}}, "sort": {"title": 1}}),
        )
        .await
        .unwrap();

    assert!(report.plan.satisfies_sort);

    // Results are in title order either way
    let titles: Vec<&str> = report
        .output
        .documents
        .iter()
        .filter_map(|doc| doc.get("title").and_then(|v| v.as_str()))
        .collect();
    let mut sorted = titles.clone();
    sorted.sort();
    assert_eq!(titles, sorted);
}
