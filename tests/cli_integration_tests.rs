use plano_engine::cli::{CliRunner, OutputFormat};
use plano_engine::utils::error::PlanoError;

#[tokio::test]
async fn test_query_command_table_output() {
    let runner = CliRunner::new().await.unwrap();

    let output = runner
        .execute_query(
            "books",
            r#"{"filter": {"author": "George Orwell"}, "sort": {"published_year": 1}}"#,
            None,
            &OutputFormat::Table,
            false,
        )
        .await
        .unwrap();

    assert!(output.contains("FULL_SCAN"));
    assert!(output.contains("Animal Farm"));
    assert!(output.contains("3 documents returned"));
}

#[tokio::test]
async fn test_query_command_json_output() {
    let runner = CliRunner::new().await.unwrap();

    let output = runner
        .execute_query(
            "books",
            r#"{"filter": {"title": "1984"}, "projection": {"title": 1, "_id": 0}}"#,
            None,
            &OutputFormat::Json,
            false,
        )
        .await
        .unwrap();

    assert!(output.contains("\"title\": \"1984\""));
    assert!(!output.contains("author"));
}

#[tokio::test]
async fn test_explain_command_shows_comparison() {
    let runner = CliRunner::new().await.unwrap();
    runner.create_index("books", r#"{"title": 1}"#, false, None).await.unwrap();

    let output = runner
        .explain_query("books", r#"{"filter": {"title": "1984"}}"#, None)
        .await
        .unwrap();

    assert!(output.contains("INDEX_SCAN"));
    assert!(output.contains("Without index"));
    assert!(output.contains("With index title_1"));
}

#[tokio::test]
async fn test_aggregate_command() {
    let runner = CliRunner::new().await.unwrap();

    let output = runner
        .run_aggregation(
            "books",
            r#"[{"$group": {"_id": "$genre", "bookCount": {"$sum": 1}}}, {"$sort": {"bookCount": -1}}]"#,
            None,
            &OutputFormat::Csv,
        )
        .await
        .unwrap();

    let mut lines = output.lines();
    assert_eq!(lines.next(), Some("_id,bookCount"));
    assert_eq!(lines.next(), Some("Fiction,6"));
}

#[tokio::test]
async fn test_indexes_command_empty_catalog() {
    let runner = CliRunner::new().await.unwrap();
    let output = runner.list_indexes("books", None).await.unwrap();
    assert!(output.contains("No indexes defined."));
}

#[tokio::test]
async fn test_stores_command_detailed() {
    let runner = CliRunner::new().await.unwrap();
    let output = runner.list_stores(true).await.unwrap();

    assert!(output.contains("memory"));
    assert!(output.contains("Type: Memory"));
    assert!(output.contains("Connected:"));
}

#[tokio::test]
async fn test_unknown_store_reported() {
    let runner = CliRunner::new().await.unwrap();
    let result = runner
        .execute_query("books", "{}", Some("postgres"), &OutputFormat::Table, false)
        .await;
    assert!(matches!(result.unwrap_err(), PlanoError::Configuration(_)));
}
