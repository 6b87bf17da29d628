//! Writes followed by targeted refreshes, and refreshes after out-of-band changes

use super::support::{loaded_cache, upload};
use catalog_cache::source::memory::Operation;
use catalog_cache::source::{DocumentUpdate, NodeDraft, NodeUpdate};
use catalog_cache::{CatalogError, RefreshOutcome, RefreshScope};

#[tokio::test]
async fn deleting_a_child_refreshes_its_parent() {
    let (cache, _source) = loaded_cache().await;
    cache.expand_path(&[1, 2]).await.unwrap();

    cache.delete_node(2).await.unwrap();

    assert_eq!(cache.get(1).unwrap().children, Some(vec![3]));
    for gone in [2, 4, 5] {
        assert!(cache.get(gone).is_none(), "node {} should be gone", gone);
    }
    assert_eq!(cache.get(1).unwrap().record.child_count, 1);
    cache.check_invariants().unwrap();
}

#[tokio::test]
async fn created_child_appears_without_disturbing_siblings() {
    let (cache, _source) = loaded_cache().await;
    cache.expand_path(&[1, 2]).await.unwrap();

    let created = cache
        .create_node(Some(1), NodeDraft::named("Cimentación"))
        .await
        .unwrap();

    let parent = cache.get(1).unwrap();
    assert_eq!(parent.children, Some(vec![2, 3, created.id]));
    assert!(parent.is_expanded);
    // Expansion state below surviving siblings is kept
    let structures = cache.get(2).unwrap();
    assert!(structures.is_expanded);
    assert_eq!(structures.children, Some(vec![4, 5]));
    cache.check_invariants().unwrap();
}

#[tokio::test]
async fn new_root_reconciles_root_level_only() {
    let (cache, source) = loaded_cache().await;
    cache.expand(1).await.unwrap();
    source.reset_calls();

    let created = cache
        .create_node(None, NodeDraft::named("Urbanización"))
        .await
        .unwrap();

    let roots: Vec<_> = cache.get_tree().iter().map(|r| r.id()).collect();
    assert_eq!(roots, vec![1, 7, created.id]);
    assert!(cache.get(1).unwrap().is_expanded);
    assert_eq!(source.calls(Operation::Roots), 1);
    assert_eq!(source.calls(Operation::Children), 0);
}

#[tokio::test]
async fn rename_is_reflected_after_one_refresh() {
    let (cache, source) = loaded_cache().await;
    cache.expand(1).await.unwrap();
    source.reset_calls();

    let update = NodeUpdate {
        name: Some("Estructura metálica".to_string()),
        ..NodeUpdate::default()
    };
    cache.update_node(2, update).await.unwrap();

    assert_eq!(cache.get(2).unwrap().record.name, "Estructura metálica");
    assert_eq!(source.calls(Operation::UpdateNode), 1);
    assert_eq!(source.calls(Operation::Node), 1);
}

#[tokio::test]
async fn rejected_write_leaves_cache_untouched() {
    let (cache, source) = loaded_cache().await;
    cache.expand(1).await.unwrap();
    let revision = cache.revision();
    let tree = cache.get_tree();

    source.fail_next(
        Operation::DeleteNode,
        CatalogError::Conflict("node has documents".to_string()),
    );
    let err = cache.delete_node(3).await.unwrap_err();
    assert_eq!(err, CatalogError::Conflict("node has documents".to_string()));
    assert_eq!(cache.revision(), revision);
    assert_eq!(cache.get_tree(), tree);
}

#[tokio::test]
async fn document_lifecycle_updates_only_availability() {
    let (cache, source) = loaded_cache().await;
    cache.expand_path(&[1, 2]).await.unwrap();
    cache.refresh_document_availability(5).await.unwrap();
    let structures_before = cache.get(2).unwrap();
    source.reset_calls();

    let document = cache.create_document(5, upload(1, "columnas.pdf")).await.unwrap();
    let slots = cache.get(5).unwrap().document_availability.unwrap();
    assert!(slots[0].available);
    assert_eq!(slots[0].document_id, Some(document.id));
    assert!(!slots[1].available);

    // Filled slots reject a second upload before reaching the source
    let err = cache
        .create_document(5, upload(1, "otra.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Conflict(_)));

    cache
        .update_document(
            5,
            document.id,
            DocumentUpdate {
                name: Some("columnas-v2.pdf".to_string()),
                content: None,
            },
        )
        .await
        .unwrap();
    let slots = cache.get(5).unwrap().document_availability.unwrap();
    assert_eq!(slots[0].document_name.as_deref(), Some("columnas-v2.pdf"));

    cache.delete_document(5, document.id).await.unwrap();
    let slots = cache.get(5).unwrap().document_availability.unwrap();
    assert!(slots.iter().all(|slot| !slot.available));

    assert_eq!(source.calls(Operation::CreateDocument), 1);
    assert_eq!(source.calls(Operation::DocumentAvailability), 3);
    assert_eq!(source.calls(Operation::Node), 0);
    assert_eq!(source.calls(Operation::Children), 0);
    assert_eq!(cache.get(2).unwrap(), structures_before);
}

#[tokio::test]
async fn refresh_of_node_deleted_elsewhere_removes_it() {
    let (cache, source) = loaded_cache().await;
    cache.expand_path(&[1, 2]).await.unwrap();
    source.remove_out_of_band(2).unwrap();

    let outcome = cache.refresh_node(2).await.unwrap();
    match outcome {
        RefreshOutcome::Removed(mut ids) => {
            ids.sort_unstable();
            assert_eq!(ids, vec![2, 4, 5]);
        }
        other => panic!("expected removal, got {:?}", other),
    }
    assert_eq!(cache.get(1).unwrap().children, Some(vec![3]));
    cache.check_invariants().unwrap();
}

#[tokio::test]
async fn refresh_of_uncached_node_reloads_from_roots() {
    let (cache, source) = loaded_cache().await;
    cache.expand(1).await.unwrap();

    let outcome = cache.refresh(RefreshScope::Node(99)).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Reloaded(2));
    assert_eq!(source.calls(Operation::Roots), 1);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn root_refresh_keeps_expansion_of_surviving_roots() {
    let (cache, source) = loaded_cache().await;
    cache.expand(1).await.unwrap();
    source.remove_out_of_band(7).unwrap();

    let outcome = cache.refresh(RefreshScope::Roots).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::RootsReconciled(1));
    assert!(cache.get(7).is_none());
    let root = cache.get(1).unwrap();
    assert!(root.is_expanded);
    assert_eq!(root.children, Some(vec![2, 3]));
}
