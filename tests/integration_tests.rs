use mediahub::models::{ChangeKind, Collection, MediaItem, MediaType, NewUpload};
use mediahub::services::reconcile::{CollectionView, Reconciliation};
use mediahub::services::storage::FileStore;
use mediahub::services::{import, media, search, text};
use mediahub::Database;
use std::path::PathBuf;

const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
const MAX_UPLOAD: usize = 1024 * 1024;

fn create_test_db() -> Database {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let id: u32 = rng.gen();
    let name = format!("test_db_{}", id);

    let db = Database::open_memory(&name).expect("Failed to create test database");
    db.migrate().expect("Failed to run migrations");
    db
}

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mediahub_test_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn create_file_db() -> (Database, PathBuf) {
    let dir = temp_dir();
    let path = dir.join("mediahub.db");
    let db = Database::open(path.to_str().expect("Temp path is not UTF-8"))
        .expect("Failed to open file database");
    db.migrate().expect("Failed to run migrations");
    (db, dir)
}

fn create_test_store() -> FileStore {
    let store = FileStore::new(temp_dir(), "");
    store.ensure_dirs().expect("Failed to create upload dirs");
    store
}

fn upload(name: &str, mime_type: &str, data: &[u8]) -> NewUpload {
    NewUpload {
        original_name: name.to_string(),
        custom_name: None,
        mime_type: mime_type.to_string(),
        data: data.to_vec(),
        source_url: None,
    }
}

mod media_integration_tests {
    use super::*;

    #[test]
    fn test_uploads_land_in_their_collections() {
        let db = create_test_db();
        let store = create_test_store();

        let gif = media::upload_media(&db, &store, MAX_UPLOAD, upload("dance.gif", "image/gif", GIF))
            .expect("Failed to upload gif");
        let png = media::upload_media(
            &db,
            &store,
            MAX_UPLOAD,
            upload("photo.png", "application/octet-stream", PNG),
        )
        .expect("Failed to upload png");
        let clip = media::upload_media(&db, &store, MAX_UPLOAD, upload("bruh.mp3", "audio/mpeg", b"ID3\x03"))
            .expect("Failed to upload soundbite");

        assert_eq!(gif.media_type, MediaType::Gifs);
        assert_eq!(png.media_type, MediaType::Images);
        assert_eq!(png.mime_type, "image/png");
        assert_eq!(clip.media_type, MediaType::Soundbites);

        // Each collection numbers independently.
        assert_eq!(gif.display_order, 0);
        assert_eq!(png.display_order, 0);
        assert_eq!(clip.display_order, 0);

        let library = media::list_library(&db).expect("Failed to list library");
        assert_eq!(library.len(), 3);
        assert_eq!(library.gifs[0].id, gif.id);
        assert_eq!(library.images[0].id, png.id);
        assert_eq!(library.soundbites[0].id, clip.id);

        let stored = store
            .resolve(png.storage_path.as_deref().unwrap())
            .expect("Failed to resolve stored file");
        assert_eq!(std::fs::read(stored).unwrap(), PNG);

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_custom_name_overrides_filename() {
        let db = create_test_db();
        let store = create_test_store();

        let mut request = upload("IMG_2041.gif", "image/gif", GIF);
        request.custom_name = Some("  cat jump ".to_string());
        let item = media::upload_media(&db, &store, MAX_UPLOAD, request).unwrap();

        assert_eq!(item.name, "cat jump");
        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_reorder_moves_before_target() {
        let db = create_test_db();
        let store = create_test_store();

        let ids: Vec<String> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| {
                media::upload_media(&db, &store, MAX_UPLOAD, upload(&format!("{}.gif", name), "image/gif", GIF))
                    .unwrap()
                    .id
            })
            .collect();

        // Dragging the first item onto the end slot.
        let order = media::reorder_media(&db, MediaType::Gifs, 0, 4).unwrap();
        assert_eq!(order, vec![ids[1].clone(), ids[2].clone(), ids[3].clone(), ids[0].clone()]);

        // Dragging the last item in front of the first.
        let order = media::reorder_media(&db, MediaType::Gifs, 3, 0).unwrap();
        assert_eq!(order, vec![ids[0].clone(), ids[1].clone(), ids[2].clone(), ids[3].clone()]);

        let listed = media::list_media(&db, MediaType::Gifs).unwrap();
        let orders: Vec<i64> = listed.iter().map(|m| m.display_order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_reorder_rejects_out_of_range() {
        let db = create_test_db();
        let store = create_test_store();
        media::upload_media(&db, &store, MAX_UPLOAD, upload("a.gif", "image/gif", GIF)).unwrap();

        assert!(media::reorder_media(&db, MediaType::Gifs, 1, 0).is_err());
        assert!(media::reorder_media(&db, MediaType::Gifs, 0, 2).is_err());
        assert!(media::reorder_media(&db, MediaType::Images, 0, 0).is_err());

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_delete_then_upload_appends_after_survivors() {
        let db = create_test_db();
        let store = create_test_store();

        let first = media::upload_media(&db, &store, MAX_UPLOAD, upload("1.gif", "image/gif", GIF)).unwrap();
        media::upload_media(&db, &store, MAX_UPLOAD, upload("2.gif", "image/gif", GIF)).unwrap();
        media::delete_media(&db, &store, MediaType::Gifs, &first.id).unwrap();

        let third = media::upload_media(&db, &store, MAX_UPLOAD, upload("3.gif", "image/gif", GIF)).unwrap();
        assert_eq!(third.display_order, 1);
        assert!(!media::media_exists(&db, &first.id).unwrap());

        let _ = std::fs::remove_dir_all(store.root());
    }
}

mod text_integration_tests {
    use super::*;
    use mediahub::models::TextPatch;

    #[test]
    fn test_text_lifecycle() {
        let db = create_test_db();

        let note = text::create_text(&db, "Note", "first draft").expect("Failed to create text");
        let todo = text::create_text(&db, "Todo", "").expect("Failed to create text");

        let renamed = text::rename_text(&db, &note.id, "Notes").unwrap();
        assert_eq!(renamed.content, "first draft");

        let edited = text::update_text(
            &db,
            &todo.id,
            TextPatch {
                name: None,
                content: Some("ship it".to_string()),
            },
        )
        .unwrap();
        assert_eq!(edited.name, "Todo");

        let order = text::reorder_text(&db, 1, 0).unwrap();
        assert_eq!(order, vec![todo.id.clone(), note.id.clone()]);

        text::delete_text(&db, &todo.id).unwrap();
        let items = text::list_text(&db).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Notes");
        assert_eq!(items[0].display_order, 0);
    }
}

mod search_integration_tests {
    use super::*;

    #[test]
    fn test_search_matches_names_and_text_content() {
        let db = create_test_db();
        let store = create_test_store();

        let mut request = upload("x.gif", "image/gif", GIF);
        request.custom_name = Some("Happy Dance".to_string());
        media::upload_media(&db, &store, MAX_UPLOAD, request).unwrap();
        media::upload_media(&db, &store, MAX_UPLOAD, upload("sad.png", "image/png", PNG)).unwrap();
        text::create_text(&db, "Lyrics", "dance like nobody is watching").unwrap();
        text::create_text(&db, "Shopping", "bread").unwrap();

        let results = search::search(&db, "DANCE").unwrap();
        assert_eq!(results.media.gifs.len(), 1);
        assert!(results.media.images.is_empty());
        assert_eq!(results.text.len(), 1);
        assert_eq!(results.text[0].name, "Lyrics");

        let everything = search::search(&db, "").unwrap();
        assert_eq!(everything.media.len(), 2);
        assert_eq!(everything.text.len(), 2);

        let _ = std::fs::remove_dir_all(store.root());
    }
}

mod import_integration_tests {
    use super::*;

    #[test]
    fn test_import_appends_after_existing_items() {
        let db = create_test_db();
        let store = create_test_store();
        let existing = media::upload_media(&db, &store, MAX_UPLOAD, upload("mine.gif", "image/gif", GIF)).unwrap();

        let library = import::parse_legacy(
            r#"{"gifs": [{"id": "old-1", "name": "legacy", "url": "https://cdn.example/f/old.gif", "size": 99}]}"#,
        )
        .unwrap();
        let report = import::import_legacy(&db, library).unwrap();
        assert_eq!(report.imported, 1);

        let gifs = media::list_media(&db, MediaType::Gifs).unwrap();
        assert_eq!(gifs[0].id, existing.id);
        assert_eq!(gifs[1].id, "old-1");
        assert_eq!(gifs[1].display_order, 1);
        assert_eq!(gifs[1].url, "https://cdn.example/f/old.gif");

        // Imported rows have no local file, so deleting them only drops the row.
        media::delete_media(&db, &store, MediaType::Gifs, "old-1").unwrap();
        assert_eq!(media::list_media(&db, MediaType::Gifs).unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(store.root());
    }
}

mod reconcile_integration_tests {
    use super::*;
    use mediahub::models::ChangeEvent;

    #[test]
    fn test_optimistic_reorder_matches_server_order() {
        let db = create_test_db();
        let store = create_test_store();
        for name in ["a", "b", "c"] {
            media::upload_media(&db, &store, MAX_UPLOAD, upload(&format!("{}.gif", name), "image/gif", GIF))
                .unwrap();
        }

        let collection = Collection::Media(MediaType::Gifs);
        let mut view: CollectionView<MediaItem> =
            CollectionView::new(collection, media::list_media(&db, MediaType::Gifs).unwrap());

        let pending = view.begin_reorder(2, 0).expect("Move should not be a no-op");
        let order = media::reorder_media(
            &db,
            MediaType::Gifs,
            pending.request.source_index,
            pending.request.target_index,
        )
        .unwrap();

        let local: Vec<String> = view.ids().into_iter().map(String::from).collect();
        assert_eq!(local, order);

        // The echo of our own reorder changes nothing.
        let echo = ChangeEvent::reordered(collection, order);
        assert_eq!(echo.kind, ChangeKind::Reorder);
        assert_eq!(view.apply(&echo), Reconciliation::Ignored);

        let _ = std::fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_remote_rename_patches_in_place() {
        let db = create_test_db();
        let store = create_test_store();
        let item = media::upload_media(&db, &store, MAX_UPLOAD, upload("a.gif", "image/gif", GIF)).unwrap();

        let mut view: CollectionView<MediaItem> = CollectionView::new(
            Collection::Media(MediaType::Gifs),
            media::list_media(&db, MediaType::Gifs).unwrap(),
        );

        let renamed = media::rename_media(&db, MediaType::Gifs, &item.id, "renamed").unwrap();
        let event = ChangeEvent::media_updated(&renamed, renamed.display_order);

        assert_eq!(view.apply(&event), Reconciliation::Applied);
        assert_eq!(view.items()[0].name, "renamed");

        let deleted = ChangeEvent::deleted(Collection::Media(MediaType::Gifs), &item.id);
        assert_eq!(view.apply(&deleted), Reconciliation::Refetch);

        let _ = std::fs::remove_dir_all(store.root());
    }
}

mod http_integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use mediahub::models::ChangeEvent;
    use mediahub::web::{self, AppState};
    use mediahub::Config;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "mediahub-test-boundary";

    /// Application state over `db` with uploads in a fresh temp dir.
    /// `extra` is appended to the config file.
    fn build_state(db: Database, extra: &str) -> AppState {
        let upload_dir = temp_dir();
        let config: Config = toml::from_str(&format!(
            r#"
[database]
path = ":memory:"

[storage]
upload_dir = "{}"

[uploads]
max_upload_size = "1MB"
{}
"#,
            upload_dir.display(),
            extra
        ))
        .expect("Failed to parse test config");

        AppState::new(config, db).expect("Failed to build state")
    }

    fn test_state() -> Arc<AppState> {
        Arc::new(build_state(create_test_db(), ""))
    }

    fn test_app() -> (Arc<AppState>, Router) {
        let state = test_state();
        (state.clone(), web::router(state))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn multipart_upload(filename: &str, content_type: &str, data: &[u8], name: Option<&str>) -> Request<Body> {
        let mut body = Vec::new();
        if let Some(name) = name {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{}\r\n",
                    BOUNDARY, name
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, app) = test_app();
        let (status, json) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_upload_list_and_serve_file() {
        let (state, app) = test_app();

        let (status, json) = send(&app, multipart_upload("dance.gif", "image/gif", GIF, Some("Dance"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["item"]["type"], "gifs");
        assert_eq!(json["item"]["name"], "Dance");

        let (status, library) = send(&app, get("/api/media")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(library["gifs"].as_array().unwrap().len(), 1);
        assert!(library["images"].as_array().unwrap().is_empty());

        let url = json["item"]["url"].as_str().unwrap().to_string();
        let response = app.clone().oneshot(get(&url)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], GIF);

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_type() {
        let (state, app) = test_app();
        let (status, json) = send(&app, multipart_upload("notes.pdf", "application/pdf", b"%PDF-1.4", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "Unsupported file type. Only audio, GIF, or image files are allowed"
        );
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_file() {
        let (state, app) = test_app();
        let big = vec![0u8; 2 * 1024 * 1024];
        let (status, json) = send(&app, multipart_upload("big.gif", "image/gif", &big, None)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(json["error"].is_string());
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_invalid_media_type() {
        let (state, app) = test_app();
        let (status, json) = send(&app, get("/api/media/videos")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid media type");
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_unknown_api_route() {
        let (state, app) = test_app();
        let (status, json) = send(&app, get("/api/nothing/here")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "API route not found");
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_reorder_validates_body() {
        let (state, app) = test_app();
        send(&app, multipart_upload("a.gif", "image/gif", GIF, None)).await;

        let (status, _) = send(
            &app,
            json_request(Method::PATCH, "/api/media/gifs/reorder", serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(
            &app,
            json_request(
                Method::PATCH,
                "/api/media/gifs/reorder",
                serde_json::json!({"sourceIndex": -1, "targetIndex": 0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid index");

        let (status, _) = send(
            &app,
            json_request(
                Method::PATCH,
                "/api/media/gifs/reorder",
                serde_json::json!({"sourceIndex": 0, "targetIndex": 5}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_mutations_publish_changes() {
        let (state, app) = test_app();
        let mut events = state.broadcaster.subscribe();

        let (_, created) = send(&app, multipart_upload("a.gif", "image/gif", GIF, None)).await;
        let id = created["item"]["id"].as_str().unwrap().to_string();
        send(&app, multipart_upload("b.gif", "image/gif", GIF, None)).await;

        let inserted = events.recv().await.unwrap();
        assert_eq!(inserted.kind, ChangeKind::Insert);
        assert_eq!(inserted.id.as_deref(), Some(id.as_str()));
        events.recv().await.unwrap();

        let (status, json) = send(
            &app,
            json_request(
                Method::PATCH,
                "/api/media/gifs/reorder",
                serde_json::json!({"sourceIndex": 0, "targetIndex": 2}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["order"][1], id.as_str());

        let reordered = events.recv().await.unwrap();
        assert_eq!(reordered.kind, ChangeKind::Reorder);
        assert_eq!(reordered.order.as_ref().unwrap()[1], id);

        let (status, json) = send(
            &app,
            json_request(
                Method::PATCH,
                &format!("/api/media/gifs/{}/rename", id),
                serde_json::json!({"name": "renamed"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["item"]["name"], "renamed");
        assert_eq!(events.recv().await.unwrap().kind, ChangeKind::Update);

        let request = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/media/gifs/{}", id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let deleted = events.recv().await.unwrap();
        assert_eq!(deleted.kind, ChangeKind::Delete);
        assert_eq!(deleted.collection(), Some(Collection::Media(MediaType::Gifs)));

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_rename_missing_item() {
        let (state, app) = test_app();
        let (status, json) = send(
            &app,
            json_request(
                Method::PATCH,
                "/api/media/images/does-not-exist/rename",
                serde_json::json!({"name": "x"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Media not found");
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_text_routes() {
        let (state, app) = test_app();

        let (status, first) = send(
            &app,
            json_request(Method::POST, "/api/text", serde_json::json!({"name": "One", "content": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, second) = send(
            &app,
            json_request(Method::POST, "/api/text", serde_json::json!({"name": "Two"})),
        )
        .await;
        assert_eq!(second["item"]["display_order"], 1);
        assert_eq!(second["item"]["content"], "");

        let (status, json) = send(
            &app,
            json_request(
                Method::PATCH,
                "/api/text/reorder",
                serde_json::json!({"sourceIndex": 1, "targetIndex": 0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["order"][0], second["item"]["id"]);

        let first_id = first["item"]["id"].as_str().unwrap();
        let (status, json) = send(
            &app,
            json_request(
                Method::PATCH,
                &format!("/api/text/{}", first_id),
                serde_json::json!({"content": "updated"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["item"]["content"], "updated");
        assert_eq!(json["item"]["name"], "One");

        let (status, list) = send(&app, get("/api/text")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[1]["id"], first_id);

        let (status, json) = send(
            &app,
            json_request(Method::POST, "/api/text", serde_json::json!({"name": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Name is required");

        let (status, _) = send(&app, get("/api/text/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_search_route() {
        let (state, app) = test_app();
        send(
            &app,
            json_request(Method::POST, "/api/text", serde_json::json!({"name": "Recipes", "content": "pancakes"})),
        )
        .await;

        let (status, json) = send(&app, get("/api/search?q=pancake")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["text"].as_array().unwrap().len(), 1);
        assert!(json["media"]["gifs"].as_array().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let (state, app) = test_app();
        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        let _ = std::fs::remove_dir_all(state.store.root());
    }

    async fn spawn_server(state: Arc<AppState>) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = web::router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    type ClientSocket = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn next_frame(ws: &mut ClientSocket) -> serde_json::Value {
        use futures::StreamExt;
        use tokio_tungstenite::tungstenite::Message;

        loop {
            let message = tokio::time::timeout(std::time::Duration::from_secs(5), ws.next())
                .await
                .expect("Timed out waiting for a frame")
                .expect("Socket closed")
                .expect("Socket error");
            if let Message::Text(text) = message {
                return serde_json::from_str(&text).expect("Frame is not JSON");
            }
        }
    }

    #[tokio::test]
    async fn test_websocket_snapshot_then_changes() {
        let state = test_state();
        let addr = spawn_server(state.clone()).await;
        let app = web::router(state.clone());

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .expect("Failed to connect websocket");

        let snapshot = next_frame(&mut ws).await;
        assert_eq!(snapshot["event"], "snapshot");
        assert!(snapshot["text"].as_array().unwrap().is_empty());
        assert!(snapshot["media"]["gifs"].as_array().unwrap().is_empty());

        send(
            &app,
            json_request(Method::POST, "/api/text", serde_json::json!({"name": "Hello"})),
        )
        .await;

        let change = next_frame(&mut ws).await;
        assert_eq!(change["event"], "change");
        assert_eq!(change["change"]["table"], "text_items");
        assert_eq!(change["change"]["kind"], "insert");
        assert_eq!(change["change"]["record"]["name"], "Hello");

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_websocket_resync_after_lag() {
        let state = Arc::new(build_state(create_test_db(), "[realtime]\nchannel_capacity = 2\n"));
        let addr = spawn_server(state.clone()).await;

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .expect("Failed to connect websocket");
        assert_eq!(next_frame(&mut ws).await["event"], "snapshot");

        // Nothing yields between sends, so the socket task falls behind.
        for i in 0..5 {
            state
                .broadcaster
                .publish(ChangeEvent::deleted(Collection::Text, &format!("t{}", i)));
        }

        let resync = next_frame(&mut ws).await;
        assert_eq!(resync["event"], "resync");
        assert_eq!(resync["missed"], 3);

        let change = next_frame(&mut ws).await;
        assert_eq!(change["event"], "change");
        assert_eq!(change["change"]["id"], "t3");

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_event_stream_resync_after_lag() {
        use futures::StreamExt;

        let state = Arc::new(build_state(create_test_db(), "[realtime]\nchannel_capacity = 2\n"));
        let app = web::router(state.clone());

        let response = app.oneshot(get("/api/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        for i in 0..5 {
            state
                .broadcaster
                .publish(ChangeEvent::deleted(Collection::Text, &format!("t{}", i)));
        }

        let mut body = response.into_body().into_data_stream();
        let mut buffer = String::new();
        while !buffer.contains("\n\n") {
            let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), body.next())
                .await
                .expect("Timed out waiting for an event")
                .expect("Stream ended")
                .expect("Stream error");
            buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        }

        let first = buffer.split("\n\n").next().unwrap();
        assert!(first.contains("event: resync"));
        assert!(first.contains("\"missed\":3"));

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_client_build_served_with_index_fallback() {
        let client_dir = temp_dir();
        std::fs::write(client_dir.join("index.html"), "<html>mediahub client</html>").unwrap();
        std::fs::write(client_dir.join("app.js"), "console.log('hi');").unwrap();

        let state = Arc::new(build_state(
            create_test_db(),
            &format!("[server]\nclient_dir = \"{}\"\n", client_dir.display()),
        ));
        let app = web::router(state.clone());

        for path in ["/", "/boards/42"] {
            let response = app.clone().oneshot(get(path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "path {}", path);
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert!(String::from_utf8_lossy(&bytes).contains("mediahub client"));
        }

        let response = app.clone().oneshot(get("/app.js")).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"console.log('hi');");

        // API paths never fall through to the client.
        let (status, json) = send(&app, get("/api/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "API route not found");

        let _ = std::fs::remove_dir_all(state.store.root());
        let _ = std::fs::remove_dir_all(client_dir);
    }

    #[cfg(feature = "remote-upload")]
    #[tokio::test]
    async fn test_upload_from_url_route() {
        let origin = Router::new()
            .route("/tiny.gif", axum::routing::get(|| async { ([(header::CONTENT_TYPE, "image/gif")], GIF) }))
            .route(
                "/huge.gif",
                axum::routing::get(|| async { ([(header::CONTENT_TYPE, "image/gif")], vec![0u8; 2 * 1024 * 1024]) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin_addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, origin).await.unwrap();
        });

        let mut state = build_state(create_test_db(), "");
        state.http = reqwest::Client::builder().no_proxy().build().unwrap();
        let state = Arc::new(state);
        let app = web::router(state.clone());

        let url = format!("http://{}/tiny.gif", origin_addr);
        let (status, json) = send(
            &app,
            json_request(Method::POST, "/api/upload-url", serde_json::json!({"url": url, "name": "Tiny"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["item"]["type"], "gifs");
        assert_eq!(json["item"]["name"], "Tiny");
        assert_eq!(json["item"]["source_url"], url.as_str());

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/upload-url",
                serde_json::json!({"url": format!("http://{}/huge.gif", origin_addr)}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let (status, json) = send(
            &app,
            json_request(
                Method::POST,
                "/api/upload-url",
                serde_json::json!({"url": format!("http://{}/gone.gif", origin_addr)}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().starts_with("Failed to fetch URL"));

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reorders_broadcast_in_commit_order() {
        let (db, db_dir) = create_file_db();
        let state = Arc::new(build_state(db, ""));
        let mut expected: Vec<String> = (0..5)
            .map(|i| text::create_text(&state.db, &format!("note {}", i), "").unwrap().id)
            .collect();

        let mut events = state.broadcaster.subscribe();
        let app = web::router(state.clone());

        let requests: Vec<_> = (0..16)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move {
                    send(
                        &app,
                        json_request(
                            Method::PATCH,
                            "/api/text/reorder",
                            serde_json::json!({"sourceIndex": 0, "targetIndex": 5}),
                        ),
                    )
                    .await
                    .0
                })
            })
            .collect();
        for request in requests {
            assert_eq!(request.await.unwrap(), StatusCode::OK);
        }

        // Every request moves the head to the tail, so each broadcast order
        // must follow from the one before it.
        for _ in 0..16 {
            let event = events.recv().await.unwrap();
            expected.rotate_left(1);
            assert_eq!(event.order.as_deref(), Some(expected.as_slice()));
        }

        let stored: Vec<String> = text::list_text(&state.db).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(stored, expected);

        let _ = std::fs::remove_dir_all(state.store.root());
        let _ = std::fs::remove_dir_all(db_dir);
    }
}

mod concurrency_integration_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_concurrent_reorders_on_file_database() {
        let (db, dir) = create_file_db();
        let store = FileStore::new(dir.join("uploads"), "");
        store.ensure_dirs().unwrap();
        for i in 0..5 {
            media::upload_media(&db, &store, MAX_UPLOAD, upload(&format!("{}.gif", i), "image/gif", GIF)).unwrap();
        }

        let failures = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        if let Err(e) = media::reorder_media(&db, MediaType::Gifs, 0, 5) {
                            eprintln!("reorder failed: {}", e);
                            failures.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(failures.load(Ordering::SeqCst), 0);
        let orders: Vec<i64> = media::list_media(&db, MediaType::Gifs)
            .unwrap()
            .iter()
            .map(|m| m.display_order)
            .collect();
        assert_eq!(orders, vec![0, 1, 2, 3, 4]);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_concurrent_writes_on_file_database() {
        let (db, dir) = create_file_db();
        let store = FileStore::new(dir.join("uploads"), "");
        store.ensure_dirs().unwrap();

        let failures = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let (db, store, failures) = (&db, &store, &failures);
                scope.spawn(move || {
                    for i in 0..10 {
                        let name = format!("{}-{}.gif", worker, i);
                        let uploaded = media::upload_media(db, store, MAX_UPLOAD, upload(&name, "image/gif", GIF));
                        let created = text::create_text(db, &name, "");
                        for err in [uploaded.err(), created.err()].into_iter().flatten() {
                            eprintln!("write failed: {}", err);
                            failures.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(failures.load(Ordering::SeqCst), 0);

        let gifs = media::list_media(&db, MediaType::Gifs).unwrap();
        let orders: Vec<i64> = gifs.iter().map(|m| m.display_order).collect();
        assert_eq!(orders, (0..80).collect::<Vec<i64>>());

        let notes = text::list_text(&db).unwrap();
        let orders: Vec<i64> = notes.iter().map(|t| t.display_order).collect();
        assert_eq!(orders, (0..80).collect::<Vec<i64>>());

        // Deleting from the middle closes the gap under the same lock.
        media::delete_media(&db, &store, MediaType::Gifs, &gifs[10].id).unwrap();
        let orders: Vec<i64> = media::list_media(&db, MediaType::Gifs)
            .unwrap()
            .iter()
            .map(|m| m.display_order)
            .collect();
        assert_eq!(orders, (0..79).collect::<Vec<i64>>());

        let _ = std::fs::remove_dir_all(dir);
    }
}
