//! Integration Tests for Structural Tree Mutations
//!
//! Exercises insertion and relocation through the real store and verifies
//! the nested-set numbering stays well-formed after every operation.

#[cfg(test)]
mod tree_mutator_tests {
    use crate::db::{DatabaseService, TreeEpochs, TreeStore, TursoStore};
    use crate::models::{NewNode, TreeNode};
    use crate::services::{Position, TreeMutator, TreeQuery, TreeServiceError};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Helper to create test services
    async fn create_test_services() -> (
        TreeMutator,
        TreeQuery,
        Arc<dyn TreeStore>,
        Arc<TreeEpochs>,
        TempDir,
    ) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
        let store: Arc<dyn TreeStore> = Arc::new(TursoStore::new(db));
        let epochs = Arc::new(TreeEpochs::new());
        let mutator = TreeMutator::new(store.clone(), epochs.clone());
        let query = TreeQuery::new(store.clone());

        (mutator, query, store, epochs, temp_dir)
    }

    /// Assert one stored tree is a well-formed nested set: boundaries cover
    /// 1..=2n exactly once, intervals nest properly, and depth and parent
    /// pointers agree with the intervals.
    async fn assert_valid_tree(store: &Arc<dyn TreeStore>, tree_id: i64) {
        let nodes = store.get_tree(tree_id).await.unwrap();
        assert!(!nodes.is_empty(), "tree {tree_id} has no rows");

        let n = nodes.len() as i64;
        let mut bounds: Vec<i64> = nodes.iter().flat_map(|m| [m.lft, m.rgt]).collect();
        bounds.sort_unstable();
        assert_eq!(
            bounds,
            (1..=2 * n).collect::<Vec<_>>(),
            "tree {tree_id} boundaries must cover 1..=2n exactly once"
        );

        let mut stack: Vec<&TreeNode> = Vec::new();
        for node in &nodes {
            while let Some(top) = stack.last() {
                if top.rgt < node.lft {
                    stack.pop();
                } else {
                    break;
                }
            }
            match stack.last() {
                Some(parent) => {
                    assert!(node.lft > parent.lft && node.rgt < parent.rgt);
                    assert_eq!(node.depth, parent.depth + 1, "depth of {}", node.id);
                    assert_eq!(node.parent_id.as_deref(), Some(parent.id.as_str()));
                }
                None => {
                    assert_eq!(node.lft, 1, "root of tree {tree_id} must start at 1");
                    assert_eq!(node.depth, 1);
                    assert!(node.parent_id.is_none());
                }
            }
            stack.push(node);
        }
    }

    fn titles(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.title.as_str()).collect()
    }

    #[tokio::test]
    async fn add_root_creates_standalone_leaf_trees() {
        let (mutator, _query, store, _epochs, _temp) = create_test_services().await;

        let first = mutator
            .add_root("region-1", NewNode::page("First"))
            .await
            .unwrap();
        let second = mutator
            .add_root("region-1", NewNode::page("Second"))
            .await
            .unwrap();

        assert_eq!((first.lft, first.rgt, first.depth), (1, 2, 1));
        assert_eq!((second.lft, second.rgt, second.depth), (1, 2, 1));
        assert_ne!(first.tree_id, second.tree_id);
        assert!(first.parent_id.is_none());
        assert_eq!(first.region_id, "region-1");

        let roots = store.get_region_roots("region-1").await.unwrap();
        assert_eq!(titles(&roots), vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn add_child_appends_rightmost() {
        let (mutator, query, store, _epochs, _temp) = create_test_services().await;

        let root = mutator
            .add_root("region-1", NewNode::page("Root"))
            .await
            .unwrap();
        let a = mutator.add_child(&root.id, NewNode::page("A")).await.unwrap();
        let b = mutator.add_child(&root.id, NewNode::page("B")).await.unwrap();

        assert_eq!(a.depth, 2);
        assert_eq!(a.parent_id.as_deref(), Some(root.id.as_str()));
        assert!(b.lft > a.rgt, "new child must land right of its siblings");

        let root = store.get_node(&root.id).await.unwrap().unwrap();
        assert_eq!((root.lft, root.rgt), (1, 6));

        let children = query.get_children(&root).await.unwrap();
        assert_eq!(titles(&children), vec!["A", "B"]);
        assert_valid_tree(&store, root.tree_id).await;
    }

    #[tokio::test]
    async fn add_child_nests_to_arbitrary_depth() {
        let (mutator, _query, store, _epochs, _temp) = create_test_services().await;

        let root = mutator
            .add_root("region-1", NewNode::language_tree("Root"))
            .await
            .unwrap();
        let child = mutator
            .add_child(&root.id, NewNode::page("Child"))
            .await
            .unwrap();
        let grandchild = mutator
            .add_child(&child.id, NewNode::page("Grandchild"))
            .await
            .unwrap();

        assert_eq!(grandchild.depth, 3);
        assert_eq!(grandchild.parent_id.as_deref(), Some(child.id.as_str()));
        assert_valid_tree(&store, root.tree_id).await;
    }

    #[tokio::test]
    async fn add_sibling_honors_all_positions() {
        let (mutator, query, store, _epochs, _temp) = create_test_services().await;

        let root = mutator
            .add_root("region-1", NewNode::page("Root"))
            .await
            .unwrap();
        let a = mutator.add_child(&root.id, NewNode::page("A")).await.unwrap();
        mutator.add_child(&root.id, NewNode::page("B")).await.unwrap();

        mutator
            .add_sibling(&a.id, Position::Right, NewNode::page("AfterA"))
            .await
            .unwrap();
        let a = store.get_node(&a.id).await.unwrap().unwrap();
        mutator
            .add_sibling(&a.id, Position::Left, NewNode::page("BeforeA"))
            .await
            .unwrap();
        let a = store.get_node(&a.id).await.unwrap().unwrap();
        mutator
            .add_sibling(&a.id, Position::FirstChild, NewNode::page("Leftmost"))
            .await
            .unwrap();
        let a = store.get_node(&a.id).await.unwrap().unwrap();
        mutator
            .add_sibling(&a.id, Position::LastChild, NewNode::page("Rightmost"))
            .await
            .unwrap();

        let root = store.get_node(&root.id).await.unwrap().unwrap();
        let children = query.get_children(&root).await.unwrap();
        assert_eq!(
            titles(&children),
            vec!["Leftmost", "BeforeA", "A", "AfterA", "B", "Rightmost"]
        );
        assert_valid_tree(&store, root.tree_id).await;
    }

    #[tokio::test]
    async fn add_sibling_of_root_starts_a_new_tree() {
        let (mutator, _query, store, _epochs, _temp) = create_test_services().await;

        let root = mutator
            .add_root("region-1", NewNode::page("Root"))
            .await
            .unwrap();
        let sibling = mutator
            .add_sibling(&root.id, Position::Left, NewNode::page("Sibling"))
            .await
            .unwrap();

        // Root siblings are whole trees; the new one joins the region's
        // forest at the end regardless of the requested side.
        assert_ne!(sibling.tree_id, root.tree_id);
        assert_eq!((sibling.lft, sibling.rgt, sibling.depth), (1, 2, 1));

        let roots = store.get_region_roots("region-1").await.unwrap();
        assert_eq!(titles(&roots), vec!["Root", "Sibling"]);
    }

    #[tokio::test]
    async fn move_node_reparents_within_a_tree() {
        let (mutator, query, store, _epochs, _temp) = create_test_services().await;

        let root = mutator
            .add_root("region-1", NewNode::page("Root"))
            .await
            .unwrap();
        let a = mutator.add_child(&root.id, NewNode::page("A")).await.unwrap();
        let b = mutator.add_child(&root.id, NewNode::page("B")).await.unwrap();

        let moved = mutator
            .move_node(&a.id, &b.id, Position::LastChild)
            .await
            .unwrap();

        assert_eq!(moved.depth, 3);
        assert_eq!(moved.parent_id.as_deref(), Some(b.id.as_str()));

        let b = store.get_node(&b.id).await.unwrap().unwrap();
        assert!(moved.is_descendant_of(&b));
        let children = query.get_children(&b).await.unwrap();
        assert_eq!(titles(&children), vec!["A"]);
        assert_valid_tree(&store, root.tree_id).await;
    }

    #[tokio::test]
    async fn move_node_carries_the_whole_subtree() {
        let (mutator, query, store, _epochs, _temp) = create_test_services().await;

        let root = mutator
            .add_root("region-1", NewNode::page("Root"))
            .await
            .unwrap();
        let a = mutator.add_child(&root.id, NewNode::page("A")).await.unwrap();
        mutator.add_child(&a.id, NewNode::page("A1")).await.unwrap();
        mutator.add_child(&a.id, NewNode::page("A2")).await.unwrap();
        let b = mutator.add_child(&root.id, NewNode::page("B")).await.unwrap();

        let moved = mutator
            .move_node(&a.id, &b.id, Position::LastChild)
            .await
            .unwrap();

        let descendants = query.get_descendants(&moved, false).await.unwrap();
        assert_eq!(titles(&descendants), vec!["A1", "A2"]);
        assert!(descendants.iter().all(|d| d.depth == moved.depth + 1));
        assert_valid_tree(&store, root.tree_id).await;
    }

    #[tokio::test]
    async fn move_node_between_trees_in_one_region() {
        let (mutator, _query, store, _epochs, _temp) = create_test_services().await;

        let first = mutator
            .add_root("region-1", NewNode::page("First"))
            .await
            .unwrap();
        let a = mutator
            .add_child(&first.id, NewNode::page("A"))
            .await
            .unwrap();
        let second = mutator
            .add_root("region-1", NewNode::page("Second"))
            .await
            .unwrap();

        let moved = mutator
            .move_node(&a.id, &second.id, Position::LastChild)
            .await
            .unwrap();

        assert_eq!(moved.tree_id, second.tree_id);
        assert_eq!(moved.parent_id.as_deref(), Some(second.id.as_str()));
        assert_valid_tree(&store, first.tree_id).await;
        assert_valid_tree(&store, second.tree_id).await;

        let first = store.get_node(&first.id).await.unwrap().unwrap();
        assert!(first.is_leaf());
    }

    #[tokio::test]
    async fn move_into_another_region_requires_root_position() {
        let (mutator, _query, _store, _epochs, _temp) = create_test_services().await;

        let home = mutator
            .add_root("region-1", NewNode::page("Home"))
            .await
            .unwrap();
        let a = mutator
            .add_child(&home.id, NewNode::page("A"))
            .await
            .unwrap();
        let away = mutator
            .add_root("region-2", NewNode::page("Away"))
            .await
            .unwrap();

        let result = mutator
            .move_node(&a.id, &away.id, Position::LastChild)
            .await;
        assert!(matches!(
            result,
            Err(TreeServiceError::InvalidPosition { .. })
        ));
    }

    #[tokio::test]
    async fn move_across_regions_as_new_root_rewrites_the_subtree() {
        let (mutator, query, store, _epochs, _temp) = create_test_services().await;

        let home = mutator
            .add_root("region-1", NewNode::page("Home"))
            .await
            .unwrap();
        let a = mutator
            .add_child(&home.id, NewNode::page("A"))
            .await
            .unwrap();
        mutator.add_child(&a.id, NewNode::page("A1")).await.unwrap();
        let away = mutator
            .add_root("region-2", NewNode::page("Away"))
            .await
            .unwrap();

        let moved = mutator
            .move_node(&a.id, &away.id, Position::Right)
            .await
            .unwrap();

        assert!(moved.is_root());
        assert_eq!(moved.region_id, "region-2");
        assert_ne!(moved.tree_id, home.tree_id);
        assert_ne!(moved.tree_id, away.tree_id);

        let descendants = query.get_descendants(&moved, false).await.unwrap();
        assert_eq!(titles(&descendants), vec!["A1"]);
        assert!(descendants.iter().all(|d| d.region_id == "region-2"));

        assert_valid_tree(&store, home.tree_id).await;
        assert_valid_tree(&store, moved.tree_id).await;
    }

    #[tokio::test]
    async fn move_rejects_degenerate_targets() {
        let (mutator, _query, _store, _epochs, _temp) = create_test_services().await;

        let root = mutator
            .add_root("region-1", NewNode::page("Root"))
            .await
            .unwrap();
        let a = mutator.add_child(&root.id, NewNode::page("A")).await.unwrap();
        let a1 = mutator.add_child(&a.id, NewNode::page("A1")).await.unwrap();

        let self_move = mutator.move_node(&a.id, &a.id, Position::Right).await;
        assert!(matches!(
            self_move,
            Err(TreeServiceError::InvalidPosition { .. })
        ));

        let into_own_subtree = mutator
            .move_node(&a.id, &a1.id, Position::LastChild)
            .await;
        assert!(matches!(
            into_own_subtree,
            Err(TreeServiceError::InvalidPosition { .. })
        ));

        let missing = mutator
            .move_node("no-such-node", &a.id, Position::LastChild)
            .await;
        assert!(matches!(missing, Err(TreeServiceError::NodeNotFound { .. })));
    }

    #[tokio::test]
    async fn save_heals_a_stale_parent_pointer() {
        let (mutator, _query, store, _epochs, _temp) = create_test_services().await;

        let root = mutator
            .add_root("region-1", NewNode::page("Root"))
            .await
            .unwrap();
        let a = mutator.add_child(&root.id, NewNode::page("A")).await.unwrap();

        let mut tampered = a.clone();
        tampered.parent_id = Some("bogus-parent".to_string());
        tampered.title = "A renamed".to_string();

        let saved = mutator.save(tampered).await.unwrap();
        assert_eq!(saved.title, "A renamed");
        assert_eq!(saved.parent_id.as_deref(), Some(root.id.as_str()));

        let stored = store.get_node(&a.id).await.unwrap().unwrap();
        assert_eq!(stored.parent_id.as_deref(), Some(root.id.as_str()));
    }

    #[tokio::test]
    async fn structural_writes_bump_tree_epochs() {
        let (mutator, _query, _store, epochs, _temp) = create_test_services().await;

        let root = mutator
            .add_root("region-1", NewNode::page("Root"))
            .await
            .unwrap();
        let after_root = epochs.current(root.tree_id);
        assert!(after_root >= 2, "add_root must bump before and after");

        mutator.add_child(&root.id, NewNode::page("A")).await.unwrap();
        assert_eq!(epochs.current(root.tree_id), after_root + 2);
    }
}
