//! End-to-end tests for the ingestion pipeline
//!
//! Each test builds a gzip CSV fixture in a temp dir, runs the pipeline
//! against a file-backed SQLite database and inspects the table and the
//! schema document afterwards.

mod common;

use async_trait::async_trait;
use chunkload_ingest::loader::{BatchSink, SqliteLoader};
use chunkload_ingest::pipeline::{Pipeline, PipelineState};
use chunkload_ingest::reader::ChunkReader;
use chunkload_ingest::schema::ColumnType;
use chunkload_ingest::{Batch, LoadError, PipelineError, TransformError};
use common::{generated_csv, Workspace};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

async fn open_db(path: &Path) -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::new().filename(path))
        .await
        .expect("Failed to open result database")
}

async fn row_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM processed_data")
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn table_layout(pool: &SqlitePool) -> Vec<(String, String)> {
    sqlx::query_as("SELECT name, type FROM pragma_table_info('processed_data') ORDER BY cid")
        .fetch_all(pool)
        .await
        .unwrap()
}

/// Sink that delegates to SQLite but rejects one batch index
struct FailingSink {
    inner: SqliteLoader,
    fail_at: usize,
}

#[async_trait]
impl BatchSink for FailingSink {
    async fn write_batch(&mut self, batch: &Batch, index: usize) -> Result<u64, LoadError> {
        if index == self.fail_at {
            return Err(LoadError::MissingTable("rejected by test sink".to_string()));
        }
        self.inner.write_batch(batch, index).await
    }
}

// ============================================================================
// Batching
// ============================================================================

#[tokio::test]
async fn test_batches_split_at_batch_size() {
    let ws = Workspace::new().with_source(&generated_csv(250_000));

    let mut pipeline = Pipeline::new(ws.config(100_000));
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.rows_read, 250_000);
    assert_eq!(summary.rows_loaded, 250_000);
    assert_eq!(summary.rows_dropped, 0);
    assert_eq!(pipeline.state(), &PipelineState::Done);

    let pool = open_db(&ws.db()).await;
    assert_eq!(row_count(&pool).await, 250_000);

    let sizes: Vec<usize> = ChunkReader::open(ws.source(), 100_000)
        .unwrap()
        .map(|batch| batch.unwrap().len())
        .collect();
    assert_eq!(sizes, vec![100_000, 100_000, 50_000]);
}

#[tokio::test]
async fn test_table_layout_matches_schema_document() {
    let ws = Workspace::new().with_source(&generated_csv(100));

    let summary = Pipeline::new(ws.config(40)).run().await.unwrap();

    let schema = summary.schema.expect("schema inferred from first batch");
    assert_eq!(
        schema.column_names(),
        vec!["row_id", "campaign_name", "click_rate", "is_active"]
    );
    assert_eq!(
        schema.columns.iter().map(|(_, ty)| *ty).collect::<Vec<_>>(),
        vec![ColumnType::Integer, ColumnType::Text, ColumnType::Real, ColumnType::Boolean]
    );

    let document = std::fs::read_to_string(ws.schema()).unwrap();
    assert_eq!(document, schema.render());
    assert!(document.starts_with("DROP TABLE IF EXISTS processed_data;"));
    assert!(document.contains("    row_id INTEGER,\n"));
    assert!(document.contains("    is_active BOOLEAN\n);"));

    let pool = open_db(&ws.db()).await;
    let layout = table_layout(&pool).await;
    let expected: Vec<(String, String)> = schema
        .columns
        .iter()
        .map(|(name, ty)| (name.clone(), ty.as_sql().to_string()))
        .collect();
    assert_eq!(layout, expected);
}

// ============================================================================
// Cleaning
// ============================================================================

#[tokio::test]
async fn test_empty_rows_dropped_and_missing_values_blank() {
    let csv = "Name,Score,City\n\
               alice,10,paris\n\
               ,,\n\
               bob,,berlin\n\
               \n\
               carol,7,\n";
    let ws = Workspace::new().with_source(csv);

    let summary = Pipeline::new(ws.config(100)).run().await.unwrap();

    assert_eq!(summary.rows_loaded, 3);
    assert_eq!(summary.rows_dropped, 1);

    let pool = open_db(&ws.db()).await;
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT name, CAST(city AS TEXT) FROM processed_data ORDER BY rowid")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(
        rows,
        vec![
            ("alice".to_string(), "paris".to_string()),
            ("bob".to_string(), "berlin".to_string()),
            ("carol".to_string(), String::new()),
        ]
    );

    let nulls: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM processed_data WHERE name IS NULL OR score IS NULL OR city IS NULL",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(nulls, 0);

    // Score had a blank in the first batch, so it is not purely numeric
    let layout = table_layout(&pool).await;
    assert_eq!(layout[1], ("score".to_string(), "TEXT".to_string()));
}

#[tokio::test]
async fn test_missing_markers_count_as_empty() {
    let ws = Workspace::new().with_source("a,b\nNA,NaN\n1,null\nN/A,x\n");

    let summary = Pipeline::new(ws.config(100)).run().await.unwrap();

    assert_eq!(summary.rows_read, 3);
    assert_eq!(summary.rows_dropped, 1);
    assert_eq!(summary.rows_loaded, 2);

    let pool = open_db(&ws.db()).await;
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT CAST(a AS TEXT), b FROM processed_data ORDER BY rowid")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(
        rows,
        vec![
            ("1".to_string(), String::new()),
            (String::new(), "x".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_unnamed_header_cells_are_named_by_position() {
    let ws = Workspace::new().with_source(",value\n0,a\n1,b\n");

    let summary = Pipeline::new(ws.config(100)).run().await.unwrap();

    let schema = summary.schema.unwrap();
    assert_eq!(schema.column_names(), vec!["unnamed:_0", "value"]);

    let pool = open_db(&ws.db()).await;
    let layout = table_layout(&pool).await;
    assert_eq!(layout[0].0, "unnamed:_0");
}

#[tokio::test]
async fn test_types_fixed_by_first_batch() {
    let mut csv = String::from("id,code\n");
    for i in 0..10 {
        csv.push_str(&format!("{},{}\n", i, i * 100));
    }
    csv.push_str("10,not-a-number\n");
    let ws = Workspace::new().with_source(&csv);

    let summary = Pipeline::new(ws.config(5)).run().await.unwrap();
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.rows_loaded, 11);

    let pool = open_db(&ws.db()).await;
    let layout = table_layout(&pool).await;
    assert_eq!(layout[1], ("code".to_string(), "INTEGER".to_string()));

    let stored: String = sqlx::query_scalar("SELECT CAST(code AS TEXT) FROM processed_data WHERE id = 10")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, "not-a-number");

    let document = std::fs::read_to_string(ws.schema()).unwrap();
    assert!(document.contains("    code INTEGER\n"));
}

#[tokio::test]
async fn test_colliding_headers_fail_before_loading() {
    let ws = Workspace::new().with_source("Campaign Name,campaign_name\na,b\n");

    let mut pipeline = Pipeline::new(ws.config(100));
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Transform {
            batch: 0,
            last_committed: None,
            source: TransformError::DuplicateColumn { .. },
        }
    ));
    assert_eq!(pipeline.state(), &PipelineState::Failed { last_committed: None });
    assert!(!ws.schema().exists());
}

// ============================================================================
// Runs
// ============================================================================

#[tokio::test]
async fn test_rerun_replaces_previous_contents() {
    let ws = Workspace::new().with_source(&generated_csv(1_500));

    Pipeline::new(ws.config(1_000)).run().await.unwrap();
    let pool = open_db(&ws.db()).await;
    let first: Vec<(i64, String)> =
        sqlx::query_as("SELECT row_id, campaign_name FROM processed_data ORDER BY rowid")
            .fetch_all(&pool)
            .await
            .unwrap();
    pool.close().await;
    let first_schema = std::fs::read_to_string(ws.schema()).unwrap();

    Pipeline::new(ws.config(1_000)).run().await.unwrap();
    let pool = open_db(&ws.db()).await;
    let second: Vec<(i64, String)> =
        sqlx::query_as("SELECT row_id, campaign_name FROM processed_data ORDER BY rowid")
            .fetch_all(&pool)
            .await
            .unwrap();

    assert_eq!(first.len(), 1_500);
    assert_eq!(first, second);
    assert_eq!(first_schema, std::fs::read_to_string(ws.schema()).unwrap());
}

#[tokio::test]
async fn test_failed_batch_keeps_earlier_batches() {
    let ws = Workspace::new().with_source(&generated_csv(250));

    let loader = SqliteLoader::connect(ws.db(), "processed_data").await.unwrap();
    let mut sink = FailingSink { inner: loader, fail_at: 2 };

    let mut pipeline = Pipeline::new(ws.config(100));
    let err = pipeline.run_with_sink(&mut sink).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Load {
            batch: 2,
            last_committed: Some(1),
            ..
        }
    ));
    assert_eq!(err.last_committed(), Some(1));
    assert_eq!(
        pipeline.state(),
        &PipelineState::Failed { last_committed: Some(1) }
    );

    assert_eq!(sink.inner.row_count().await.unwrap(), 200);
    let max_id: i64 = sqlx::query_scalar("SELECT MAX(row_id) FROM processed_data")
        .fetch_one(sink.inner.pool())
        .await
        .unwrap();
    assert_eq!(max_id, 199);
}

#[tokio::test]
async fn test_pipeline_runs_only_once() {
    let ws = Workspace::new().with_source(&generated_csv(10));

    let mut pipeline = Pipeline::new(ws.config(100));
    pipeline.run().await.unwrap();

    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(pipeline.state(), &PipelineState::Done);
}

#[tokio::test]
async fn test_header_only_source_loads_nothing() {
    let ws = Workspace::new().with_source("a,b,c\n");

    let summary = Pipeline::new(ws.config(100)).run().await.unwrap();

    assert_eq!(summary.batches, 0);
    assert_eq!(summary.rows_loaded, 0);
    assert!(summary.schema.is_none());
    assert!(!ws.schema().exists());
}

#[tokio::test]
async fn test_missing_source_is_read_error() {
    let ws = Workspace::new();

    let mut pipeline = Pipeline::new(ws.config(100));
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Read {
            batch: 0,
            last_committed: None,
            ..
        }
    ));
    assert_eq!(pipeline.state(), &PipelineState::Failed { last_committed: None });
    assert!(!ws.db().exists());
}

#[tokio::test]
async fn test_schema_write_failure_aborts_run() {
    let ws = Workspace::new().with_source(&generated_csv(10));
    let mut config = ws.config(100);
    config.schema_path = ws.dir.path().to_path_buf();

    let mut pipeline = Pipeline::new(config);
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Schema(_)));
    assert_eq!(pipeline.state(), &PipelineState::Failed { last_committed: None });

    let pool = open_db(&ws.db()).await;
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'processed_data'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tables, 0);
}
