//! Shared helpers for unit tests: in-process fake provider backends and
//! tiny `.docx` fixtures.

use std::io::{Cursor, Write};

use axum::Router;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Serves `router` on an ephemeral localhost port and returns its base URL.
pub async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test backend");
    });
    format!("http://{addr}")
}

/// Builds a minimal Word package whose body is `body_xml`, wrapped with
/// Word's usual section properties so append tests see a realistic layout.
pub fn docx_with_body(body_xml: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body_xml}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in [
        ("[Content_Types].xml", crate::document::docx::CONTENT_TYPES_XML),
        ("_rels/.rels", crate::document::docx::PACKAGE_RELS_XML),
        ("word/styles.xml", "<w:styles xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"/>"),
        ("word/document.xml", document.as_str()),
    ] {
        zip.start_file(name, options).expect("start zip entry");
        zip.write_all(content.as_bytes()).expect("write zip entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

/// A résumé fixture with one `<w:p>` per entry of `paragraphs`.
pub fn resume_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| {
            format!(
                "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
                quick_xml::escape::escape(*p)
            )
        })
        .collect();
    docx_with_body(&body)
}

/// A registry whose active provider is the local backend at `base`, with a
/// short retry backoff and no settings file.
pub fn local_registry(base: &str) -> crate::settings::ProviderRegistry {
    use crate::config::ProviderTimeouts;
    use crate::llm_client::ProviderId;
    use crate::settings::registry::EnvFallbacks;
    use crate::settings::{ProviderRegistry, ProviderSettings};

    ProviderRegistry::new(
        ProviderSettings::default(),
        EnvFallbacks::default().with_endpoint(ProviderId::Local, base),
        None,
        reqwest::Client::new(),
        ProviderTimeouts {
            retry_backoff: std::time::Duration::from_millis(10),
            ..ProviderTimeouts::default()
        },
    )
}

/// Application state over a temporary store and the local backend at `base`.
pub fn test_state(base: &str, storage_dir: &std::path::Path) -> crate::state::AppState {
    use std::sync::Arc;

    use crate::config::{Config, ProviderTimeouts};
    use crate::llm_client::ProviderId;

    let config = Config {
        port: 0,
        rust_log: "info".to_string(),
        storage_dir: storage_dir.to_path_buf(),
        settings_path: storage_dir.join("settings.json"),
        ollama_url: base.to_string(),
        openai_base_url: ProviderId::OpenAi.default_endpoint().to_string(),
        anthropic_base_url: ProviderId::Anthropic.default_endpoint().to_string(),
        openai_api_key: None,
        anthropic_api_key: None,
        timeouts: ProviderTimeouts::default(),
        max_upload_bytes: 1024 * 1024,
    };

    crate::state::AppState {
        registry: Arc::new(local_registry(base)),
        store: crate::storage::ArtifactStore::open(storage_dir).expect("open test store"),
        config: Arc::new(config),
    }
}
