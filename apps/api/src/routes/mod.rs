pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::generation::handlers as generation;
use crate::settings::handlers as settings;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Provider settings
        .route(
            "/api/v1/settings",
            get(settings::handle_get_settings).put(settings::handle_update_settings),
        )
        .route(
            "/api/v1/providers/status",
            get(settings::handle_provider_status),
        )
        // Résumé API
        .route(
            "/api/v1/resumes/upload",
            post(generation::handle_upload_resume),
        )
        .route(
            "/api/v1/resumes/customize",
            post(generation::handle_customize_resume),
        )
        .route(
            "/api/v1/resumes/:filename",
            get(generation::handle_download_resume),
        )
        // Cover-letter API
        .route(
            "/api/v1/cover-letters/generate",
            post(generation::handle_generate_cover_letter),
        )
        .route(
            "/api/v1/cover-letters/:filename",
            get(generation::handle_download_cover_letter),
        )
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        routing::post,
        Json,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::document::extract;
    use crate::test_support::{docx_with_body, resume_docx, spawn_backend, test_state};

    const BOUNDARY: &str = "tailor-test-boundary";

    /// Builds a multipart body from text fields and an optional `resume` file.
    fn multipart_body(fields: &[(&str, &str)], resume: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = resume {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"resume\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn app_with_provider(reply: &'static str) -> (Router, tempfile::TempDir) {
        let backend = Router::new().route(
            "/api/generate",
            post(move || async move { Json(json!({ "response": reply })) }),
        );
        let base = spawn_backend(backend).await;
        let dir = tempfile::tempdir().unwrap();
        (build_router(test_state(&base, dir.path())), dir)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = app_with_provider("").await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["service"], "tailor-api");
    }

    #[tokio::test]
    async fn test_settings_read_and_rejected_update() {
        let (app, _dir) = app_with_provider("").await;

        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/settings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["providerId"], "local");
        assert_eq!(body["credentialPresent"], false);

        let update = json!({ "providerId": "openai", "modelName": "gpt-9" });
        let response = app
            .oneshot(
                Request::put("/api/v1/settings")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(update.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_status_rejects_unknown_provider() {
        let (app, _dir) = app_with_provider("").await;
        let response = app
            .oneshot(
                Request::get("/api/v1/providers/status?provider=gemini")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_docx() {
        let (app, _dir) = app_with_provider("").await;
        let body = multipart_body(&[], Some(("cv.pdf", &b"%PDF-1.7"[..])));
        let response = app
            .oneshot(multipart_request("/api/v1/resumes/upload", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(
            json_body(response).await["error"]["code"],
            "DOCUMENT_FORMAT_ERROR"
        );
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let (app, _dir) = app_with_provider("").await;
        let response = app
            .oneshot(
                Request::get("/api/v1/cover-letters/nothing.docx")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_customize_then_download() {
        let (app, _dir) = app_with_provider("Emphasize Go services.").await;
        let resume = resume_docx(&["Jane Doe", "Go engineer", "Skills: Go"]);
        let body = multipart_body(
            &[("job_description", "Backend engineer, Go, distributed systems")],
            Some(("cv.docx", resume.as_slice())),
        );

        let response = app
            .clone()
            .oneshot(multipart_request("/api/v1/resumes/customize", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let outcome = json_body(response).await;
        assert_eq!(outcome["providerUsed"], "local");
        assert_eq!(outcome["previewText"], "Emphasize Go services.");
        assert!(outcome["artifact"]["sourcePath"].is_string());

        let generated = outcome["generatedPath"].as_str().unwrap();
        let file_name = std::path::Path::new(generated)
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        let response = app
            .oneshot(
                Request::get(format!("/api/v1/resumes/{file_name}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            crate::document::docx::MIME_TYPE
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let paragraphs = extract(&bytes).unwrap();
        assert_eq!(paragraphs.last().map(String::as_str), Some("Emphasize Go services."));
    }

    #[tokio::test]
    async fn test_cover_letter_route_requires_company() {
        let (app, _dir) = app_with_provider("Body.").await;
        let body = multipart_body(
            &[("job_description", "Keep fleets healthy"), ("position", "SRE")],
            None,
        );
        let response = app
            .oneshot(multipart_request("/api/v1/cover-letters/generate", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn stored_resumes(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_dir(dir.join("resumes"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_rejected_customize_stores_nothing() {
        let (app, dir) = app_with_provider("unused").await;
        let resume = resume_docx(&["Jane Doe", "Go engineer"]);

        let body = multipart_body(
            &[("job_description", " ")],
            Some(("cv.docx", resume.as_slice())),
        );
        let response = app
            .clone()
            .oneshot(multipart_request("/api/v1/resumes/customize", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let broken = docx_with_body("<w:p><w:r></w:p>");
        let body = multipart_body(
            &[("job_description", "Backend engineer")],
            Some(("bad.docx", broken.as_slice())),
        );
        let response = app
            .oneshot(multipart_request("/api/v1/resumes/customize", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        assert!(stored_resumes(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_cover_letter_stores_nothing() {
        let (app, dir) = app_with_provider("Body.").await;
        let resume = resume_docx(&["Jane Doe"]);
        let body = multipart_body(
            &[("job_description", "Keep fleets healthy"), ("position", "SRE")],
            Some(("cv.docx", resume.as_slice())),
        );
        let response = app
            .oneshot(multipart_request("/api/v1/cover-letters/generate", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(stored_resumes(dir.path()).is_empty());
    }
}
