//! Lazy expansion through the public facade

use super::support::{loaded_cache, seeded_source};
use catalog_cache::source::memory::Operation;
use catalog_cache::{CatalogCache, CatalogError, ExpandOutcome};
use futures::future::join_all;

#[tokio::test]
async fn cold_start_loads_only_roots() {
    let source = seeded_source();
    let cache = CatalogCache::new(source.clone());
    assert!(cache.is_empty());

    let roots = cache.load_roots().await.unwrap();
    let ids: Vec<_> = roots.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![1, 7]);
    assert!(roots.iter().all(|r| r.children.is_none() && !r.is_expanded));
    assert_eq!(cache.len(), 2);
    assert_eq!(source.total_calls(), 1);
}

#[tokio::test]
async fn expansion_reveals_one_level_at_a_time() {
    let (cache, source) = loaded_cache().await;

    assert_eq!(cache.expand(1).await.unwrap(), ExpandOutcome::Loaded(2));
    let tree = cache.get_tree();
    assert_eq!(tree[0].child_ids(), Some(vec![2, 3]));
    let structures = tree[0].find(2).unwrap();
    assert!(structures.children.is_none());
    assert!(structures.record.has_children());
    assert_eq!(structures.record.level, 1);

    assert_eq!(cache.expand(1).await.unwrap(), ExpandOutcome::AlreadyExpanded);
    assert_eq!(source.calls(Operation::Children), 1);
    cache.check_invariants().unwrap();
}

#[tokio::test]
async fn collapse_and_reexpand_reuse_cached_children() {
    let (cache, source) = loaded_cache().await;
    cache.expand_path(&[1, 2]).await.unwrap();

    cache.collapse(1).unwrap();
    let collapsed = cache.get(1).unwrap();
    assert!(!collapsed.is_expanded);
    assert_eq!(collapsed.children, Some(vec![2, 3]));
    // Grandchildren stay cached and expanded underneath
    assert!(cache.get(2).unwrap().is_expanded);

    assert_eq!(cache.toggle(1).await.unwrap(), Some(ExpandOutcome::Cached));
    assert_eq!(source.calls(Operation::Children), 2);
}

#[tokio::test]
async fn document_bearing_nodes_never_fetch_children() {
    let (cache, source) = loaded_cache().await;
    assert_eq!(cache.expand(7).await.unwrap(), ExpandOutcome::NothingToLoad);
    assert_eq!(source.total_calls(), 0);
}

#[tokio::test]
async fn expand_to_depth_loads_every_level() {
    let (cache, source) = loaded_cache().await;
    let fetches = cache.expand_to_depth(3).await.unwrap();

    // 1, then 2 and 3; the leaves report no children
    assert_eq!(fetches, 3);
    assert_eq!(source.calls(Operation::Children), 3);
    assert_eq!(cache.len(), 7);
    assert_eq!(cache.subtree(3).unwrap().child_ids(), Some(vec![6]));
    cache.check_invariants().unwrap();
}

#[tokio::test]
async fn concurrent_expands_of_one_node_fetch_once() {
    let (cache, source) = loaded_cache().await;
    let outcomes = join_all((0..4).map(|_| cache.expand(1))).await;

    let loaded = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(ExpandOutcome::Loaded(_))))
        .count();
    assert_eq!(loaded, 1);
    assert!(outcomes.iter().all(|o| o.is_ok()));
    assert_eq!(source.calls(Operation::Children), 1);
}

#[tokio::test]
async fn failed_expansion_surfaces_error_and_can_be_retried() {
    let (cache, source) = loaded_cache().await;
    source.fail_next(
        Operation::Children,
        CatalogError::RemoteUnavailable("connection reset".to_string()),
    );

    let err = cache.expand(1).await.unwrap_err();
    assert!(err.is_retryable());
    let node = cache.get(1).unwrap();
    assert!(!node.is_expanded && !node.is_loading);
    assert_eq!(node.children, None);

    assert_eq!(cache.expand(1).await.unwrap(), ExpandOutcome::Loaded(2));
}

#[tokio::test]
async fn unknown_nodes_are_reported() {
    let (cache, _source) = loaded_cache().await;
    assert_eq!(
        cache.expand(42).await.unwrap_err(),
        CatalogError::NodeNotFound(42)
    );
    assert!(cache.collapse(42).unwrap_err().is_not_found());
}

#[tokio::test]
async fn subscribers_see_each_change() {
    let (cache, _source) = loaded_cache().await;
    let mut changes = cache.subscribe();
    let before = *changes.borrow_and_update();

    cache.expand(1).await.unwrap();
    assert!(changes.has_changed().unwrap());
    let after = *changes.borrow_and_update();
    assert!(after > before);
    assert_eq!(after, cache.revision());

    // A no-op expansion does not publish
    cache.expand(1).await.unwrap();
    assert!(!changes.has_changed().unwrap());
}
