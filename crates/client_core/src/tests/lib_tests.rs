use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use shared::domain::CampaignId;
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

use super::*;

type Captured<T> = Arc<Mutex<Option<oneshot::Sender<T>>>>;

fn capture<T>() -> (Captured<T>, oneshot::Receiver<T>) {
    let (tx, rx) = oneshot::channel();
    (Arc::new(Mutex::new(Some(tx))), rx)
}

async fn send_captured<T>(slot: &Captured<T>, value: T) {
    if let Some(tx) = slot.lock().await.take() {
        let _ = tx.send(value);
    }
}

async fn spawn_backend(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn fetch_campaign_parses_backend_payload() {
    let app = Router::new().route(
        "/campaigns/:id",
        get(|Path(id): Path<i64>| async move {
            Json(json!({
                "id": id,
                "name": "Ruins of Thal",
                "description": "A crumbling dwarven hold.",
                "created_at": "2024-05-04T19:30:00"
            }))
        }),
    );
    let backend = HttpBackend::new(spawn_backend(app).await);

    let campaign = backend.fetch_campaign(CampaignId(42)).await.unwrap();
    assert_eq!(campaign.id, CampaignId(42));
    assert_eq!(campaign.name, "Ruins of Thal");
    assert_eq!(
        campaign.description.as_deref(),
        Some("A crumbling dwarven hold.")
    );
}

#[tokio::test]
async fn missing_campaign_maps_to_not_found_with_backend_detail() {
    let app = Router::new().route(
        "/campaigns/:id",
        get(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"detail": "Campaign not found"})),
            )
        }),
    );
    let backend = HttpBackend::new(spawn_backend(app).await);

    let err = backend.fetch_campaign(CampaignId(9000)).await.unwrap_err();
    assert_eq!(err, BackendError::NotFound("Campaign not found".to_string()));
}

#[tokio::test]
async fn unreadable_error_body_falls_back_to_the_status_line() {
    let app = Router::new().route(
        "/campaigns/",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let backend = HttpBackend::new(spawn_backend(app).await);

    let err = backend.list_campaigns().await.unwrap_err();
    match err {
        BackendError::Backend { message, .. } => {
            assert!(message.contains("500"), "unexpected message: {message}")
        }
        other => panic!("expected Backend, got {other:?}"),
    }
}

#[tokio::test]
async fn append_narration_sends_content_as_query_parameter() {
    let (slot, rx) = capture::<HashMap<String, String>>();
    let app = Router::new()
        .route(
            "/campaigns/:id/narration_logs/",
            post(
                |State(slot): State<Captured<HashMap<String, String>>>,
                 Path(id): Path<i64>,
                 Query(params): Query<HashMap<String, String>>| async move {
                    send_captured(&slot, params).await;
                    Json(json!({
                        "id": 501,
                        "campaign_id": id,
                        "content": "The gates creak open.",
                        "created_at": "2024-05-04T21:00:00"
                    }))
                },
            ),
        )
        .with_state(slot);
    let backend = HttpBackend::new(spawn_backend(app).await);

    let entry = backend
        .append_narration_log(CampaignId(42), "The gates creak open.")
        .await
        .unwrap();
    assert_eq!(entry.id.0, 501);
    assert_eq!(entry.campaign_id, CampaignId(42));

    let params = rx.await.unwrap();
    assert_eq!(
        params.get("content").map(String::as_str),
        Some("The gates creak open.")
    );
}

#[tokio::test]
async fn create_campaign_sends_name_and_optional_description() {
    let (slot, rx) = capture::<HashMap<String, String>>();
    let app = Router::new()
        .route(
            "/campaigns/",
            post(
                |State(slot): State<Captured<HashMap<String, String>>>,
                 Query(params): Query<HashMap<String, String>>| async move {
                    send_captured(&slot, params).await;
                    Json(json!({
                        "id": 7,
                        "name": "Salt Marsh",
                        "created_at": "2024-05-04T19:30:00"
                    }))
                },
            ),
        )
        .with_state(slot);
    let backend = HttpBackend::new(spawn_backend(app).await);

    let campaign = backend
        .create_campaign("Salt Marsh", Some("Coastal intrigue"))
        .await
        .unwrap();
    assert_eq!(campaign.id.0, 7);
    assert!(campaign.description.is_none());

    let params = rx.await.unwrap();
    assert_eq!(params.get("name").map(String::as_str), Some("Salt Marsh"));
    assert_eq!(
        params.get("description").map(String::as_str),
        Some("Coastal intrigue")
    );
}

struct SeenAssistQuery {
    prompt: String,
    campaign_id: Option<String>,
}

#[tokio::test]
async fn assistant_soft_errors_come_back_as_payload_not_fault() {
    let (slot, rx) = capture::<SeenAssistQuery>();
    let app = Router::new()
        .route(
            "/llm/query/",
            post(
                |State(slot): State<Captured<SeenAssistQuery>>,
                 Query(params): Query<HashMap<String, String>>,
                 Json(body): Json<serde_json::Value>| async move {
                    send_captured(
                        &slot,
                        SeenAssistQuery {
                            prompt: body["prompt"].as_str().unwrap_or_default().to_string(),
                            campaign_id: params.get("campaign_id").cloned(),
                        },
                    )
                    .await;
                    Json(json!({
                        "error": "Ollama is not running",
                        "fallback_response": "The road ahead is quiet."
                    }))
                },
            ),
        )
        .with_state(slot);
    let backend = HttpBackend::new(spawn_backend(app).await);

    let reply = backend
        .query_assistant("Describe the road.", Some(CampaignId(42)))
        .await
        .unwrap();
    assert_eq!(reply.error.as_deref(), Some("Ollama is not running"));
    assert_eq!(
        reply.fallback_response.as_deref(),
        Some("The road ahead is quiet.")
    );
    assert!(reply.response.is_none());

    let seen = rx.await.unwrap();
    assert_eq!(seen.prompt, "Describe the road.");
    assert_eq!(seen.campaign_id.as_deref(), Some("42"));
}

#[tokio::test]
async fn retrieve_parses_the_nested_result_matrix() {
    let app = Router::new().route(
        "/retrieve/",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            Json(json!({
                "query": params.get("query").cloned().unwrap_or_default(),
                "results": {
                    "documents": [["A ghoul is a foul undead.", "Ghasts lead ghoul packs."]],
                    "metadatas": [[{"filename": "monster-manual.pdf"}, {}]],
                    "distances": [[0.12, 0.37]]
                }
            }))
        }),
    );
    let backend = HttpBackend::new(spawn_backend(app).await);

    let response = backend.search_documents("ghouls").await.unwrap();
    assert_eq!(response.query, "ghouls");
    assert_eq!(response.results.documents[0].len(), 2);
    assert_eq!(
        response.results.metadatas[0][0].filename.as_deref(),
        Some("monster-manual.pdf")
    );
    assert!(response.results.metadatas[0][1].filename.is_none());
}

#[tokio::test]
async fn sourcebook_listing_accepts_backend_formatted_dates() {
    let app = Router::new().route(
        "/sourcebooks/",
        get(|| async {
            Json(json!([{
                "filename": "monster-manual.pdf",
                "size": 1048576,
                "created_at": "2026-08-23 12:34:56.789012",
                "processed": true
            }]))
        }),
    );
    let backend = HttpBackend::new(spawn_backend(app).await);

    let books = backend.list_sourcebooks().await.unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].filename, "monster-manual.pdf");
    assert_eq!(books[0].size, 1_048_576);
    assert!(books[0].processed);
}

#[tokio::test]
async fn delete_sourcebook_percent_encodes_the_filename() {
    let (slot, rx) = capture::<String>();
    let app = Router::new()
        .route(
            "/sourcebooks/:filename",
            delete(
                |State(slot): State<Captured<String>>, Path(filename): Path<String>| async move {
                    send_captured(&slot, filename).await;
                    Json(json!({"message": "deleted"}))
                },
            ),
        )
        .with_state(slot);
    let backend = HttpBackend::new(spawn_backend(app).await);

    backend
        .delete_sourcebook("Monster Manual.pdf")
        .await
        .unwrap();

    // axum decodes the path segment, so a space must have survived the
    // round trip as %20 rather than truncating the route match.
    assert_eq!(rx.await.unwrap(), "Monster Manual.pdf");
}

#[tokio::test]
async fn upload_sends_a_multipart_file_part() {
    let (slot, rx) = capture::<(String, String, usize)>();
    let app = Router::new()
        .route(
            "/sourcebooks/upload/",
            post(
                |State(slot): State<Captured<(String, String, usize)>>,
                 mut multipart: Multipart| async move {
                    let field = multipart.next_field().await.unwrap().unwrap();
                    let name = field.name().unwrap_or_default().to_string();
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.unwrap();
                    send_captured(&slot, (name, filename, bytes.len())).await;
                    Json(json!({
                        "filename": "player-handbook.pdf",
                        "size": 4,
                        "created_at": "2026-08-23 12:00:00",
                        "processed": true
                    }))
                },
            ),
        )
        .with_state(slot);
    let backend = HttpBackend::new(spawn_backend(app).await);

    let book = backend
        .upload_sourcebook(SourcebookUpload {
            filename: "player-handbook.pdf".to_string(),
            mime_type: Some("application/pdf".to_string()),
            bytes: b"%PDF".to_vec(),
        })
        .await
        .unwrap();
    assert_eq!(book.filename, "player-handbook.pdf");

    let (name, filename, len) = rx.await.unwrap();
    assert_eq!(name, "file");
    assert_eq!(filename, "player-handbook.pdf");
    assert_eq!(len, 4);
}

#[test]
fn campaign_name_validation_rules() {
    assert!(validate_campaign_name("Ruins of Thal").is_ok());
    assert!(validate_campaign_name("").is_err());
    assert!(validate_campaign_name("   ").is_err());
    assert!(validate_campaign_name(&"x".repeat(255)).is_ok());
    assert!(validate_campaign_name(&"x".repeat(256)).is_err());
}
