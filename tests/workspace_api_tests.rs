//! Integration tests for the workspace, playback, asset, and export API.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Write;
use std::sync::Arc;
use svgastudio::config::Config;
use svgastudio::state::SharedState;
use tower::ServiceExt;
use zip::write::SimpleFileOptions;

async fn spawn_app() -> (Arc<svgastudio::api::AppState>, Router) {
    let db_path =
        std::env::temp_dir().join(format!("svgastudio-ws-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.server.secure_cookies = false;
    config.export.frame_settle_ms = 0;

    let shared = Arc::new(
        SharedState::new(config)
            .await
            .expect("failed to create shared state"),
    );
    let state = svgastudio::api::create_app_state(shared, None).await;
    let router = svgastudio::api::router(state.clone()).await;
    (state, router)
}

async fn admin_cookie(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/signup")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "name": "Admin",
                        "email": "admin@example.com",
                        "password": "password1",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

fn png(color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(8, 8, Rgba(color));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Builds a 1.x container: movie.spec plus one PNG per layer key.
fn container(frames: u32, keys: &[&str]) -> Vec<u8> {
    let spec = serde_json::json!({
        "movie": {
            "viewBox": { "width": 8.0, "height": 8.0 },
            "fps": 20,
            "frames": frames,
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buf);
        let options = SimpleFileOptions::default();

        writer.start_file("movie.spec", options).unwrap();
        writer.write_all(spec.to_string().as_bytes()).unwrap();

        for (i, key) in keys.iter().enumerate() {
            writer.start_file(format!("{key}.png"), options).unwrap();
            writer
                .write_all(&png([(i as u8 + 1) * 40, 0, 0, 255]))
                .unwrap();
        }
        writer.finish().unwrap();
    }
    buf.into_inner()
}

/// Like [`container`], but with a custom frame rate and arbitrary entries.
fn container_with(frames: u32, fps: u32, entries: &[(&str, &[u8])]) -> Vec<u8> {
    let spec = serde_json::json!({
        "movie": {
            "viewBox": { "width": 8.0, "height": 8.0 },
            "fps": fps,
            "frames": frames,
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buf);
        let options = SimpleFileOptions::default();

        writer.start_file("movie.spec", options).unwrap();
        writer.write_all(spec.to_string().as_bytes()).unwrap();

        for (name, bytes) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }
    buf.into_inner()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    cookie: &str,
    body: Body,
    content_type: Option<&str>,
) -> axum::http::Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie);
    if let Some(content_type) = content_type {
        builder = builder.header("Content-Type", content_type);
    }
    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

async fn json_of(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn upload(app: &Router, cookie: &str, name: &str, bytes: Vec<u8>) -> serde_json::Value {
    let response = send(
        app,
        "POST",
        &format!("/api/workspaces?name={name}"),
        cookie,
        Body::from(bytes),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json_of(response).await
}

fn zip_entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

#[tokio::test]
async fn upload_requires_a_session() {
    let (_, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/workspaces?name=demo.svga")
                .body(Body::from(container(4, &["img_0"])))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upload_creates_a_workspace_with_metadata() {
    let (state, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let body = upload(&app, &cookie, "demo.svga", container(4, &["img_0", "img_1"])).await;

    assert_eq!(body["data"]["metadata"]["file_name"], "demo.svga");
    assert_eq!(body["data"]["metadata"]["width"], serde_json::json!(8));
    assert_eq!(body["data"]["metadata"]["height"], serde_json::json!(8));
    assert_eq!(body["data"]["metadata"]["fps"], serde_json::json!(20));
    assert_eq!(body["data"]["metadata"]["frames"], serde_json::json!(4));
    assert_eq!(body["data"]["is_playing"], serde_json::json!(false));
    assert_eq!(body["data"]["current_frame"], serde_json::json!(0));

    assert_eq!(state.shared.workspaces.count().await, 1);
}

#[tokio::test]
async fn upload_rejects_garbage_and_version_two_files() {
    let (_, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let response = send(
        &app,
        "POST",
        "/api/workspaces?name=bad.svga",
        &cookie,
        Body::from(&b"not an animation"[..]),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // zlib magic marks a 2.x container.
    let response = send(
        &app,
        "POST",
        "/api/workspaces?name=v2.svga",
        &cookie,
        Body::from(vec![0x78, 0x9C, 0x01, 0x02, 0x03]),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_of(response).await;
    assert!(
        body["error"].as_str().unwrap().contains("2.x"),
        "expected version message, got {body}"
    );
}

#[tokio::test]
async fn playback_controls_round_trip() {
    let (_, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let body = upload(&app, &cookie, "demo.svga", container(10, &["img_0"])).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        "POST",
        &format!("/api/workspaces/{id}/playback/play"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    let body = json_of(response).await;
    assert_eq!(body["data"]["is_playing"], serde_json::json!(true));

    let response = send(
        &app,
        "POST",
        &format!("/api/workspaces/{id}/playback/pause"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    let body = json_of(response).await;
    assert_eq!(body["data"]["is_playing"], serde_json::json!(false));

    let response = send(
        &app,
        "POST",
        &format!("/api/workspaces/{id}/playback/seek"),
        &cookie,
        Body::from(serde_json::json!({ "frame": 7 }).to_string()),
        Some("application/json"),
    )
    .await;
    let body = json_of(response).await;
    assert_eq!(body["data"]["current_frame"], serde_json::json!(7));

    let response = send(
        &app,
        "GET",
        &format!("/api/workspaces/{id}/playback"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    let body = json_of(response).await;
    assert_eq!(body["data"]["current_frame"], serde_json::json!(7));
    assert_eq!(body["data"]["total_frames"], serde_json::json!(10));
}

#[tokio::test]
async fn assets_can_be_listed_fetched_and_replaced() {
    let (_, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let body = upload(&app, &cookie, "demo.svga", container(4, &["img_0", "img_1"])).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        "GET",
        &format!("/api/workspaces/{id}/assets"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    let body = json_of(response).await;
    let assets = body["data"].as_array().unwrap();
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0]["key"], "img_0");
    assert_eq!(assets[0]["modified"], serde_json::json!(false));

    let response = send(
        &app,
        "GET",
        &format!("/api/workspaces/{id}/assets/img_0"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    let body = json_of(response).await;
    let data_uri = body["data"]["data_uri"].as_str().unwrap().to_string();
    assert!(data_uri.starts_with("data:image/png;base64,"));

    // Replace img_1 with the img_0 payload.
    let response = send(
        &app,
        "PUT",
        &format!("/api/workspaces/{id}/assets/img_1"),
        &cookie,
        Body::from(serde_json::json!({ "data_uri": data_uri }).to_string()),
        Some("application/json"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["data"]["modified"], serde_json::json!(true));

    // Unknown keys are never created by replacement.
    let uri = "data:image/png;base64,aaaa";
    let response = send(
        &app,
        "PUT",
        &format!("/api/workspaces/{id}/assets/img_9"),
        &cookie,
        Body::from(serde_json::json!({ "data_uri": uri }).to_string()),
        Some("application/json"),
    )
    .await;
    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn frame_stream_handles_very_high_frame_rates() {
    let (_, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let layer = png([255, 0, 0, 255]);
    let body = upload(
        &app,
        &cookie,
        "fast.svga",
        container_with(4, 2000, &[("img_0.png", &layer)]),
    )
    .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // fps above 1000 clamps the sample period instead of panicking.
    let response = send(
        &app,
        "GET",
        &format!("/api/workspaces/{id}/frames"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn audio_entries_are_not_layers_and_do_not_break_exports() {
    let (_, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let layer = png([255, 0, 0, 255]);
    let body = upload(
        &app,
        &cookie,
        "sound.svga",
        container_with(
            2,
            20,
            &[("img_0.png", &layer), ("bgm.mp3", b"ID3\x04not-an-image")],
        ),
    )
    .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // The audio track is not listed as an asset.
    let response = send(
        &app,
        "GET",
        &format!("/api/workspaces/{id}/assets"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    let body = json_of(response).await;
    let assets = body["data"].as_array().unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0]["key"], "img_0");

    // And the layer dump covers the image layer alone.
    let response = send(
        &app,
        "POST",
        &format!("/api/workspaces/{id}/export/layers"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(zip_entry_names(&bytes), vec!["img_0.png"]);
}

#[tokio::test]
async fn layer_export_covers_every_layer_and_reflects_replacements() {
    let (_, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let body = upload(&app, &cookie, "demo.svga", container(4, &["img_0", "img_1"])).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        "POST",
        &format!("/api/workspaces/{id}/export/layers"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/zip"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("demo_assets.zip"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(zip_entry_names(&bytes), vec!["img_0.png", "img_1.png"]);

    // Swap one layer; the next dump carries the replacement bytes.
    let replacement = png([0, 255, 0, 255]);
    let data_uri = svgastudio::animation::EncodedImage::sniff(replacement.clone())
        .unwrap()
        .to_data_uri();
    let response = send(
        &app,
        "PUT",
        &format!("/api/workspaces/{id}/assets/img_1"),
        &cookie,
        Body::from(serde_json::json!({ "data_uri": data_uri }).to_string()),
        Some("application/json"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        "POST",
        &format!("/api/workspaces/{id}/export/layers"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(&bytes[..])).unwrap();
    let mut entry = archive.by_name("img_1.png").unwrap();
    let mut entry_bytes = Vec::new();
    std::io::Read::read_to_end(&mut entry, &mut entry_bytes).unwrap();
    assert_eq!(entry_bytes, replacement);
}

#[tokio::test]
async fn layer_export_without_layers_is_no_content() {
    let (_, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let body = upload(&app, &cookie, "bare.svga", container(2, &[])).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        "POST",
        &format!("/api/workspaces/{id}/export/layers"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn frame_export_delivers_one_entry_per_frame() {
    let (_, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let body = upload(&app, &cookie, "demo.svga", container(3, &["img_0"])).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        "POST",
        &format!("/api/workspaces/{id}/export/frames"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("demo_frames.zip"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        zip_entry_names(&bytes),
        vec!["frame_0000.png", "frame_0001.png", "frame_0002.png"]
    );
}

#[tokio::test]
async fn movie_export_produces_a_gif() {
    let (_, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let body = upload(&app, &cookie, "demo.svga", container(2, &["img_0"])).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        "POST",
        &format!("/api/workspaces/{id}/export/movie"),
        &cookie,
        Body::from(serde_json::json!({ "format": "gif" }).to_string()),
        Some("application/json"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/gif"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..6], b"GIF89a");
}

#[tokio::test]
async fn movie_export_falls_back_to_frames_for_webp() {
    let (_, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let body = upload(&app, &cookie, "demo.svga", container(2, &["img_0"])).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        "POST",
        &format!("/api/workspaces/{id}/export/movie"),
        &cookie,
        Body::from(serde_json::json!({ "format": "webp" }).to_string()),
        Some("application/json"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/zip"
    );
}

#[tokio::test]
async fn closing_a_workspace_discards_it() {
    let (state, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let body = upload(&app, &cookie, "demo.svga", container(4, &["img_0"])).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        "DELETE",
        &format!("/api/workspaces/{id}"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.shared.workspaces.count().await, 0);

    let response = send(
        &app,
        "GET",
        &format!("/api/workspaces/{id}"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        "DELETE",
        &format!("/api/workspaces/{id}"),
        &cookie,
        Body::empty(),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uploads_are_recorded_on_the_event_bus() {
    let (state, app) = spawn_app().await;
    let cookie = admin_cookie(&app).await;

    let mut rx = state.shared.event_bus.subscribe();

    upload(&app, &cookie, "demo.svga", container(4, &["img_0"])).await;

    let mut saw_processed = false;
    while let Ok(event) = rx.try_recv() {
        if let svgastudio::domain::events::NotificationEvent::FileProcessed {
            file_name,
            user_email,
            frames,
            ..
        } = event
        {
            assert_eq!(file_name, "demo.svga");
            assert_eq!(user_email, "admin@example.com");
            assert_eq!(frames, 4);
            saw_processed = true;
        }
    }
    assert!(saw_processed);
}
