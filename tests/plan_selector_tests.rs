use plano_engine::{
    engine::{DefaultFilterCompiler, DefaultPlanSelector, FilterCompiler, PlanSelector, ScanType},
    stores::{DocumentStore, MemoryStore, StoreInitConfig},
    utils::types::{IndexDescriptor, IndexField},
};
use serde_json::json;

async fn books_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.connect(StoreInitConfig::new()).await.unwrap();
    store
}

#[tokio::test]
async fn test_fiction_without_indexes_full_scans() {
    let store = books_store().await;
    let compiler = DefaultFilterCompiler::new();
    let selector = DefaultPlanSelector::new();

    let descriptor = compiler.compile(&json!({"filter": {"genre": "Fiction"}})).unwrap();
    let size = store.count("books", &[]).await.unwrap();

    let plan = selector.select_plan("books", &descriptor, &[], size, &store).await.unwrap();

    assert_eq!(plan.scan_type, ScanType::FullScan);
    assert_eq!(plan.estimated_docs_examined, size);
    assert!(plan.chosen_index.is_none());
}

#[tokio::test]
async fn test_orwell_after_1950_uses_compound_index() {
    let store = books_store().await;
    let compiler = DefaultFilterCompiler::new();
    let selector = DefaultPlanSelector::new();

    let compound = IndexDescriptor::new(vec![
        IndexField::ascending("author"),
        IndexField::ascending("published_year"),
    ]);
    let descriptor = compiler
        .compile(&json!({"filter": {
            "author": "George Orwell",
            "published_year": {"$gt": 1940}
        }}))
        .unwrap();

    let plan = selector
        .select_plan("books", &descriptor, std::slice::from_ref(&compound), 12, &store)
        .await
        .unwrap();

    assert_eq!(plan.scan_type, ScanType::IndexScan);
    assert_eq!(plan.chosen_index, Some(compound));
    // Both key fields are constrained, so the estimate counts documents
    // matching the whole prefix: Orwell titles after 1940
    assert_eq!(plan.estimated_docs_examined, 2);
}

#[tokio::test]
async fn test_title_sort_satisfied_by_title_index() {
    let store = books_store().await;
    let compiler = DefaultFilterCompiler::new();
    let selector = DefaultPlanSelector::new();

    let title_index = IndexDescriptor::new(vec![IndexField::ascending("title")]);
    let descriptor = compiler
        .compile(&json!({"filter": {"title": {"$gte": "A"}}, "sort": {"title": 1}}))
        .unwrap();

    let plan = selector
        .select_plan("books", &descriptor, std::slice::from_ref(&title_index), 12, &store)
        .await
        .unwrap();

    assert_eq!(plan.scan_type, ScanType::IndexScan);
    assert!(plan.satisfies_sort);
}

#[tokio::test]
async fn test_full_scan_iff_no_leading_field_intersects() {
    let store = books_store().await;
    let compiler = DefaultFilterCompiler::new();
    let selector = DefaultPlanSelector::new();

    let indexes = vec![
        IndexDescriptor::new(vec![IndexField::ascending("title")]),
        IndexDescriptor::new(vec![
            IndexField::ascending("genre"),
            IndexField::ascending("price"),
        ]),
    ];

    // Predicate field set intersects no leading field
    let miss = compiler.compile(&json!({"filter": {"author": "Harper Lee"}})).unwrap();
    let plan = selector.select_plan("books", &miss, &indexes, 12, &store).await.unwrap();
    assert_eq!(plan.scan_type, ScanType::FullScan);

    // Touching one leading field flips the choice
    let hit = compiler
        .compile(&json!({"filter": {"genre": "Fiction", "author": "Harper Lee"}}))
        .unwrap();
    let plan = selector.select_plan("books", &hit, &indexes, 12, &store).await.unwrap();
    assert_eq!(plan.scan_type, ScanType::IndexScan);
}

#[tokio::test]
async fn test_selection_repeatable_regardless_of_catalog_order() {
    let store = books_store().await;
    let compiler = DefaultFilterCompiler::new();
    let selector = DefaultPlanSelector::new();

    let a = IndexDescriptor::new(vec![IndexField::ascending("author")]);
    let b = IndexDescriptor::new(vec![
        IndexField::ascending("author"),
        IndexField::ascending("published_year"),
    ]);
    let descriptor = compiler
        .compile(&json!({"filter": {
            "author": "J.R.R. Tolkien",
            "published_year": {"$gte": 1937}
        }}))
        .unwrap();

    let forward = selector
        .select_plan("books", &descriptor, &[a.clone(), b.clone()], 12, &store)
        .await
        .unwrap();
    let reversed = selector
        .select_plan("books", &descriptor, &[b.clone(), a.clone()], 12, &store)
        .await
        .unwrap();

    assert_eq!(forward, reversed);
    assert_eq!(forward.chosen_index, Some(b));
}

#[tokio::test]
async fn test_range_only_predicate_still_uses_index() {
    let store = books_store().await;
    let compiler = DefaultFilterCompiler::new();
    let selector = DefaultPlanSelector::new();

    let year_index = IndexDescriptor::new(vec![IndexField::ascending("published_year")]);
    let descriptor = compiler
        .compile(&json!({"filter": {"published_year": {"$gt": 1950}}}))
        .unwrap();

    let plan = selector
        .select_plan("books", &descriptor, std::slice::from_ref(&year_index), 12, &store)
        .await
        .unwrap();

    assert_eq!(plan.scan_type, ScanType::IndexScan);
    // Four seeded books are published after 1950
    assert_eq!(plan.estimated_docs_examined, 4);
}
