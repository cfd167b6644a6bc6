//! Integration Tests for Read-Only Tree Traversal
//!
//! Builds small forests through the mutator and checks that every
//! traversal primitive derives the same structure from the nested set.

#[cfg(test)]
mod tree_query_tests {
    use crate::db::{DatabaseService, TreeEpochs, TreeStore, TursoStore};
    use crate::models::{NewNode, TreeNode};
    use crate::services::{Position, TraversalMemo, TreeMutator, TreeQuery};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Helper to create test services
    async fn create_test_services() -> (TreeQuery, TreeMutator, Arc<dyn TreeStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
        let store: Arc<dyn TreeStore> = Arc::new(TursoStore::new(db));
        let epochs = Arc::new(TreeEpochs::new());
        let mutator = TreeMutator::new(store.clone(), epochs);
        let query = TreeQuery::new(store.clone());

        (query, mutator, store, temp_dir)
    }

    /// R -> (A -> (A1, A2), B) in region-1, plus a second root S
    async fn build_fixture(mutator: &TreeMutator) -> Vec<TreeNode> {
        let r = mutator
            .add_root("region-1", NewNode::page("R"))
            .await
            .unwrap();
        let a = mutator.add_child(&r.id, NewNode::page("A")).await.unwrap();
        let a1 = mutator.add_child(&a.id, NewNode::page("A1")).await.unwrap();
        let a2 = mutator.add_child(&a.id, NewNode::page("A2")).await.unwrap();
        let b = mutator.add_child(&r.id, NewNode::page("B")).await.unwrap();
        let s = mutator
            .add_root("region-1", NewNode::page("S"))
            .await
            .unwrap();
        vec![r, a, a1, a2, b, s]
    }

    async fn fresh(store: &Arc<dyn TreeStore>, node: &TreeNode) -> TreeNode {
        store.get_node(&node.id).await.unwrap().unwrap()
    }

    fn titles(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.title.as_str()).collect()
    }

    #[tokio::test]
    async fn ancestors_are_ordered_root_to_parent() {
        let (query, mutator, store, _temp) = create_test_services().await;
        let nodes = build_fixture(&mutator).await;
        let a1 = fresh(&store, &nodes[2]).await;

        let ancestors = query.get_ancestors(&a1, false).await.unwrap();
        assert_eq!(titles(&ancestors), vec!["R", "A"]);

        let with_self = query.get_ancestors(&a1, true).await.unwrap();
        assert_eq!(titles(&with_self), vec!["R", "A", "A1"]);

        let root = fresh(&store, &nodes[0]).await;
        assert!(query.get_ancestors(&root, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn parent_is_derived_from_intervals() {
        let (query, mutator, store, _temp) = create_test_services().await;
        let nodes = build_fixture(&mutator).await;
        let root = fresh(&store, &nodes[0]).await;
        let a1 = fresh(&store, &nodes[2]).await;

        let mut memo = TraversalMemo::new();
        let parent = query.get_parent(&a1, &mut memo, false).await.unwrap();
        assert_eq!(parent.unwrap().title, "A");

        let none = query.get_parent(&root, &mut memo, false).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn parent_memo_is_scoped_to_one_pass() {
        let (query, mutator, store, _temp) = create_test_services().await;
        let nodes = build_fixture(&mutator).await;
        let a = fresh(&store, &nodes[1]).await;
        let b = &nodes[4];

        let mut memo = TraversalMemo::new();
        let before = query.get_parent(&a, &mut memo, false).await.unwrap();
        assert_eq!(before.unwrap().title, "R");

        mutator
            .move_node(&a.id, &b.id, Position::LastChild)
            .await
            .unwrap();
        let a = fresh(&store, &a).await;

        // A memo held across a structural change serves the stale parent
        // unless the caller forces an update.
        let stale = query.get_parent(&a, &mut memo, false).await.unwrap();
        assert_eq!(stale.unwrap().title, "R");

        let updated = query.get_parent(&a, &mut memo, true).await.unwrap();
        assert_eq!(updated.unwrap().title, "B");
    }

    #[tokio::test]
    async fn descendants_come_back_in_pre_order() {
        let (query, mutator, store, _temp) = create_test_services().await;
        let nodes = build_fixture(&mutator).await;
        let root = fresh(&store, &nodes[0]).await;

        let descendants = query.get_descendants(&root, false).await.unwrap();
        assert_eq!(titles(&descendants), vec!["A", "A1", "A2", "B"]);

        let with_self = query.get_descendants(&root, true).await.unwrap();
        assert_eq!(titles(&with_self), vec!["R", "A", "A1", "A2", "B"]);
    }

    #[tokio::test]
    async fn leaf_descendants_do_not_touch_the_store() {
        let (query, mutator, store, _temp) = create_test_services().await;
        let nodes = build_fixture(&mutator).await;
        let b = fresh(&store, &nodes[4]).await;

        assert!(b.is_leaf());
        let empty = query.get_descendants(&b, false).await.unwrap();
        assert!(empty.is_empty());
        let only_self = query.get_descendants(&b, true).await.unwrap();
        assert_eq!(titles(&only_self), vec!["B"]);
    }

    #[tokio::test]
    async fn max_depth_bounds_the_subtree() {
        let (query, mutator, store, _temp) = create_test_services().await;
        let nodes = build_fixture(&mutator).await;
        let root = fresh(&store, &nodes[0]).await;

        let one_level = query
            .get_descendants_max_depth(&root, false, 1)
            .await
            .unwrap();
        assert_eq!(titles(&one_level), vec!["A", "B"]);

        let children = query.get_children(&root).await.unwrap();
        assert_eq!(titles(&children), vec!["A", "B"]);

        let a = fresh(&store, &nodes[1]).await;
        let grandchildren = query.get_children(&a).await.unwrap();
        assert_eq!(titles(&grandchildren), vec!["A1", "A2"]);
    }

    #[tokio::test]
    async fn region_siblings_of_a_root_are_the_forest() {
        let (query, mutator, store, _temp) = create_test_services().await;
        let nodes = build_fixture(&mutator).await;
        let root = fresh(&store, &nodes[0]).await;
        let s = fresh(&store, &nodes[5]).await;

        let siblings = query.get_region_siblings(&root).await.unwrap();
        assert_eq!(titles(&siblings), vec!["R", "S"]);

        let next = query.get_next_region_sibling(&root).await.unwrap();
        assert_eq!(next.unwrap().title, "S");
        let prev = query.get_prev_region_sibling(&root).await.unwrap();
        assert!(prev.is_none());

        let prev_of_s = query.get_prev_region_sibling(&s).await.unwrap();
        assert_eq!(prev_of_s.unwrap().title, "R");
        let next_of_s = query.get_next_region_sibling(&s).await.unwrap();
        assert!(next_of_s.is_none());
    }

    #[tokio::test]
    async fn region_siblings_of_interior_nodes_are_their_parents_children() {
        let (query, mutator, store, _temp) = create_test_services().await;
        let nodes = build_fixture(&mutator).await;
        let a1 = fresh(&store, &nodes[2]).await;

        let siblings = query.get_region_siblings(&a1).await.unwrap();
        assert_eq!(titles(&siblings), vec!["A1", "A2"]);

        let next = query.get_next_region_sibling(&a1).await.unwrap();
        assert_eq!(next.unwrap().title, "A2");
    }
}
