//! The cache driven over HTTP against a canned-response server

use super::support::FakeCatalogServer;
use catalog_cache::config::{CatalogConfig, SourceConfig};
use catalog_cache::source::NodeDraft;
use catalog_cache::{CatalogCache, CatalogError, ExpandOutcome, RefreshOutcome};
use serde_json::json;

fn config(server: &FakeCatalogServer) -> CatalogConfig {
    CatalogConfig {
        source: SourceConfig {
            base_url: server.base_url.clone(),
            api_token: Some("s3cret".to_string()),
            ..SourceConfig::default()
        },
        ..CatalogConfig::default()
    }
}

async fn catalog_server() -> FakeCatalogServer {
    let server = FakeCatalogServer::start().await;
    server.route(
        "GET",
        "/nodes/roots",
        200,
        json!([
            {"id": 1, "level": 0, "order": 1, "name": "Obra civil", "childCount": 2},
            {"id": 9, "level": 0, "order": 2, "name": "Acabados", "allowsLeafDocuments": true}
        ]),
    );
    server.route(
        "GET",
        "/nodes/1/children",
        200,
        json!([
            {"id": 2, "parentId": 1, "level": 1, "order": 1, "name": "Estructuras", "childCount": 3},
            {"id": 3, "parentId": 1, "level": 1, "order": 2, "name": "Vigas", "allowsLeafDocuments": true, "documentCount": 1}
        ]),
    );
    server
}

#[tokio::test]
async fn connect_loads_roots_and_expand_fetches_children() {
    let server = catalog_server().await;
    let cache = CatalogCache::connect(&config(&server)).await.unwrap();

    let roots: Vec<_> = cache.get_tree().iter().map(|r| r.id()).collect();
    assert_eq!(roots, vec![1, 9]);

    assert_eq!(cache.expand(1).await.unwrap(), ExpandOutcome::Loaded(2));
    let child = cache.get(3).unwrap();
    assert_eq!(child.record.name, "Vigas");
    assert!(child.record.allows_leaf_documents);
    cache.check_invariants().unwrap();

    let requests = server.requests();
    assert!(requests[0].starts_with("GET /api/nodes/roots "));
    assert!(requests[1].starts_with("GET /api/nodes/1/children "));
    assert!(requests
        .iter()
        .all(|head| head.to_ascii_lowercase().contains("authorization: bearer s3cret")));
}

#[tokio::test]
async fn document_availability_is_decoded() {
    let server = catalog_server().await;
    server.route(
        "GET",
        "/nodes/9/documents/availability",
        200,
        json!([
            {"documentTypeId": 1, "documentTypeName": "Ficha técnica", "available": true,
             "documentId": 40, "documentName": "acabados.pdf", "updatedAt": "2024-03-01T10:00:00Z"},
            {"documentTypeId": 2, "documentTypeName": "Anexo", "available": false}
        ]),
    );
    let cache = CatalogCache::connect(&config(&server)).await.unwrap();

    cache.refresh_document_availability(9).await.unwrap();
    let slots = cache.get(9).unwrap().document_availability.unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].document_id, Some(40));
    assert!(slots[0].updated_at.is_some());
    assert!(!slots[1].available);
}

#[tokio::test]
async fn missing_node_is_removed_on_refresh() {
    let server = catalog_server().await;
    let cache = CatalogCache::connect(&config(&server)).await.unwrap();
    cache.expand(1).await.unwrap();
    server.route("GET", "/nodes/3", 404, json!({"message": "not found"}));

    let outcome = cache.refresh_node(3).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Removed(vec![3]));
    assert_eq!(cache.get(1).unwrap().children, Some(vec![2]));
}

#[tokio::test]
async fn server_errors_leave_node_collapsed() {
    let server = catalog_server().await;
    let cache = CatalogCache::connect(&config(&server)).await.unwrap();
    cache.expand(1).await.unwrap();
    server.route("GET", "/nodes/2/children", 503, json!({"message": "maintenance"}));

    let err = cache.expand(2).await.unwrap_err();
    assert!(err.is_retryable());
    let node = cache.get(2).unwrap();
    assert!(!node.is_expanded && !node.is_loading);
}

#[tokio::test]
async fn validation_errors_surface_as_conflicts() {
    let server = catalog_server().await;
    server.route(
        "POST",
        "/nodes",
        422,
        json!({"message": "name must be unique among siblings"}),
    );
    let cache = CatalogCache::connect(&config(&server)).await.unwrap();
    let revision = cache.revision();

    let err = cache
        .create_node(None, NodeDraft::named("Obra civil"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CatalogError::Conflict("name must be unique among siblings".to_string())
    );
    assert_eq!(cache.revision(), revision);
}

#[tokio::test]
async fn unaddressed_not_found_is_not_a_node_removal() {
    let server = catalog_server().await;
    let cache = CatalogCache::connect(&config(&server)).await.unwrap();

    let err = cache
        .create_node(None, NodeDraft::named("Instalaciones"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CatalogError::Remote {
            status: 404,
            message: "no route".to_string()
        }
    );

    let empty = FakeCatalogServer::start().await;
    let err = CatalogCache::connect(&config(&empty)).await.err().unwrap();
    assert!(matches!(err, CatalogError::Remote { status: 404, .. }));
}

#[tokio::test]
async fn invalid_base_url_is_rejected_before_connecting() {
    let config = CatalogConfig {
        source: SourceConfig {
            base_url: "catalog.internal".to_string(),
            ..SourceConfig::default()
        },
        ..CatalogConfig::default()
    };
    let err = CatalogCache::connect(&config).await.err().unwrap();
    assert!(matches!(err, CatalogError::ConfigError(_)));
}
