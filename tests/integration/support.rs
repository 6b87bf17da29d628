//! Shared fixtures: a seeded in-memory catalog and a canned-response HTTP server

use catalog_cache::source::{DocumentDraft, InMemoryCatalogSource, NodeDraft};
use catalog_cache::CatalogCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Catalog used across tests:
///
/// ```text
/// 1 Obra civil
///   2 Estructuras
///     4 Vigas (documents)
///     5 Columnas (documents)
///   3 Instalaciones
///     6 Eléctricas (documents)
/// 7 Acabados (documents)
/// ```
pub fn seeded_source() -> Arc<InMemoryCatalogSource> {
    let source = Arc::new(InMemoryCatalogSource::default());
    source.seed(None, NodeDraft::named("Obra civil")).unwrap();
    source.seed(Some(1), NodeDraft::named("Estructuras")).unwrap();
    source.seed(Some(1), NodeDraft::named("Instalaciones")).unwrap();
    source
        .seed(Some(2), NodeDraft::named("Vigas").document_bearing())
        .unwrap();
    source
        .seed(Some(2), NodeDraft::named("Columnas").document_bearing())
        .unwrap();
    source
        .seed(Some(3), NodeDraft::named("Eléctricas").document_bearing())
        .unwrap();
    source
        .seed(None, NodeDraft::named("Acabados").document_bearing())
        .unwrap();
    source.seed_document(4, upload(1, "vigas.pdf")).unwrap();
    source
}

/// Cache over [`seeded_source`] with the root level loaded and call counts reset
pub async fn loaded_cache() -> (CatalogCache, Arc<InMemoryCatalogSource>) {
    let source = seeded_source();
    let cache = CatalogCache::new(source.clone());
    cache.load_roots().await.unwrap();
    source.reset_calls();
    (cache, source)
}

pub fn upload(document_type_id: i64, name: &str) -> DocumentDraft {
    DocumentDraft {
        document_type_id,
        name: name.to_string(),
        content_type: Some("application/pdf".to_string()),
        content: None,
    }
}

type Routes = HashMap<(String, String), (u16, String)>;

/// Minimal HTTP/1.1 server answering each request from a fixed route table
pub struct FakeCatalogServer {
    pub base_url: String,
    routes: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeCatalogServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let routes: Arc<Mutex<Routes>> = Arc::default();
        let requests: Arc<Mutex<Vec<String>>> = Arc::default();

        let (accept_routes, accept_requests) = (routes.clone(), requests.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = accept_routes.clone();
                let requests = accept_requests.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, routes, requests).await;
                });
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{}/api", port),
            routes,
            requests,
        }
    }

    /// Answer `method path` with `status` and a JSON body
    pub fn route(&self, method: &str, path: &str, status: u16, body: serde_json::Value) {
        self.routes.lock().insert(
            (method.to_string(), format!("/api{}", path)),
            (status, body.to_string()),
        );
    }

    /// Request heads received so far, one string per request
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

async fn serve(
    mut stream: TcpStream,
    routes: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buffer.len() < head_end + content_length {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    requests.lock().push(head.clone());

    let (status, body) = routes
        .lock()
        .get(&(method, path))
        .cloned()
        .unwrap_or((404, r#"{"message":"no route"}"#.to_string()));
    let response = format!(
        "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
