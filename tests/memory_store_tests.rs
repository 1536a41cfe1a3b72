use plano_engine::{
    stores::{DocumentStore, MemoryStore, StoreInitConfig},
    utils::types::{Constraint, Document, FieldPredicate, FieldValue, QueryDescriptor, SortField},
};
use serde_json::json;

fn doc(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn eq(field: &str, value: FieldValue) -> FieldPredicate {
    FieldPredicate::new(field, vec![Constraint::Eq(value)])
}

async fn connected() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.connect(StoreInitConfig::new()).await.unwrap();
    store
}

/// The full CRUD narrative: insert a book, reprice it, delete another,
/// verify the counts at each step.
#[tokio::test]
async fn test_crud_sequence() {
    let store = connected().await;
    assert_eq!(store.count("books", &[]).await.unwrap(), 12);

    let inserted = store
        .insert_many(
            "books",
            vec![doc(json!({
                "_id": 13, "title": "Nineteen Minutes", "author": "Jodi Picoult",
                "genre": "Fiction", "published_year": 2007, "price": 11.99, "in_stock": true
            }))],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let mut set = Document::new();
    set.insert("price".to_string(), json!(13.99));
    let updated = store
        .update_one(
            "books",
            &[eq("title", FieldValue::String("The Alchemist".to_string()))],
            set,
        )
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let repriced = store
        .find(
            "books",
            &QueryDescriptor {
                predicate: vec![eq("title", FieldValue::String("The Alchemist".to_string()))],
                sort: Vec::new(),
                projection: None,
                skip: 0,
                limit: None,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(repriced[0].get("price"), Some(&json!(13.99)));

    let deleted = store
        .delete_one("books", &[eq("title", FieldValue::String("Moby Dick".to_string()))])
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(store.count("books", &[]).await.unwrap(), 12);
}

#[tokio::test]
async fn test_custom_collections() {
    let mut store = MemoryStore::empty();
    store.add_collection(
        "authors",
        vec![
            doc(json!({"name": "George Orwell", "born": 1903})),
            doc(json!({"name": "Aldous Huxley", "born": 1894})),
        ],
    );
    store.connect(StoreInitConfig::new()).await.unwrap();

    assert_eq!(store.count("authors", &[]).await.unwrap(), 2);

    let descriptor = QueryDescriptor {
        predicate: vec![FieldPredicate::new(
            "born",
            vec![Constraint::Gte(FieldValue::Integer(1900))],
        )],
        sort: vec![SortField::ascending("name")],
        projection: None,
        skip: 0,
        limit: None,
    };
    let docs = store.find("authors", &descriptor, None).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].get("name"), Some(&json!("George Orwell")));
}

#[test]
fn test_connect_delay_blocking() {
    // Driving the async lifecycle from a sync test
    tokio_test::block_on(async {
        let mut store = MemoryStore::with_delay(5);
        assert!(!store.is_connected());
        store.connect(StoreInitConfig::new()).await.unwrap();
        assert!(store.is_connected());
        store.disconnect().await.unwrap();
        assert!(!store.is_connected());
    });
}

#[tokio::test]
async fn test_in_and_range_queries() {
    let store = connected().await;

    let genres = store
        .count(
            "books",
            &[FieldPredicate::new(
                "genre",
                vec![Constraint::In(vec![
                    FieldValue::String("Fantasy".to_string()),
                    FieldValue::String("Gothic".to_string()),
                ])],
            )],
        )
        .await
        .unwrap();
    assert_eq!(genres, 4);

    let cheap_recent = store
        .count(
            "books",
            &[
                FieldPredicate::new("price", vec![Constraint::Lt(FieldValue::Number(11.0))]),
                FieldPredicate::new(
                    "published_year",
                    vec![Constraint::Gte(FieldValue::Integer(1900))],
                ),
            ],
        )
        .await
        .unwrap();
    assert_eq!(cheap_recent, 3);
}
