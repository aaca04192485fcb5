use nodetree_core::db::open_db_in_memory;
use nodetree_core::{
    InvalidOperation, Missing, Node, NodeStore, SqliteNodeStore, TreeService, TreeServiceError,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn root_of(service: &TreeService<SqliteNodeStore<'_>>) -> Node {
    service.get_tree().unwrap().root().clone()
}

fn child_ids(service: &TreeService<SqliteNodeStore<'_>>, parent_id: i64) -> Vec<i64> {
    service
        .get_tree()
        .unwrap()
        .children_of(parent_id)
        .into_iter()
        .map(|node| node.id)
        .collect()
}

fn node_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM nodes;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn get_tree_without_root_returns_not_found() {
    let conn = setup();
    conn.execute("DELETE FROM nodes;", []).unwrap();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());

    let err = service.get_tree().unwrap_err();
    assert!(matches!(err, TreeServiceError::NotFound(Missing::Root)));
}

#[test]
fn get_tree_materializes_nested_children_in_order() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);

    let a = service.add_node(root.id, "A").unwrap();
    let b = service.add_node(root.id, "B").unwrap();
    let a1 = service.add_node(a.id, "A1").unwrap();
    let a2 = service.add_node(a.id, "A2").unwrap();
    service.reorder_node(b.id).unwrap();

    let tree = service.get_tree().unwrap();
    assert_eq!(tree.len(), 5);
    let order = tree.iter().map(|node| node.id).collect::<Vec<_>>();
    assert_eq!(order, vec![root.id, b.id, a.id, a1.id, a2.id]);

    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["id"], root.id);
    assert_eq!(json["parent_node_id"], serde_json::Value::Null);
    assert_eq!(json["children"][0]["title"], "B");
    assert_eq!(json["children"][1]["children"][1]["title"], "A2");
    assert_eq!(
        json["children"][1]["children"][1]["children"],
        serde_json::json!([])
    );
}

#[test]
fn tree_iter_visits_grandchildren_before_later_siblings() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);

    let a = service.add_node(root.id, "A").unwrap();
    let b = service.add_node(root.id, "B").unwrap();
    let a1 = service.add_node(a.id, "A1").unwrap();
    let b1 = service.add_node(b.id, "B1").unwrap();
    let a1x = service.add_node(a1.id, "A1x").unwrap();

    let tree = service.get_tree().unwrap();
    let order = tree.iter().map(|node| node.id).collect::<Vec<_>>();
    assert_eq!(order, vec![root.id, a.id, a1.id, a1x.id, b.id, b1.id]);
    assert_eq!(
        tree.children_of(root.id)
            .into_iter()
            .map(|node| node.id)
            .collect::<Vec<_>>(),
        vec![a.id, b.id]
    );
}

#[test]
fn get_subtree_is_rooted_at_requested_node() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);

    let a = service.add_node(root.id, "A").unwrap();
    let a1 = service.add_node(a.id, "A1").unwrap();
    service.add_node(root.id, "B").unwrap();

    let subtree = service.get_subtree(a.id).unwrap();
    assert_eq!(subtree.root().id, a.id);
    assert_eq!(subtree.len(), 2);
    assert!(subtree.get(a1.id).is_some());

    let err = service.get_subtree(9999).unwrap_err();
    assert!(matches!(err, TreeServiceError::NotFound(Missing::Node(9999))));
}

#[test]
fn add_node_appends_as_last_child() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);

    let first = service.add_node(root.id, "first").unwrap();
    let second = service.add_node(root.id, "  second  ").unwrap();

    assert_eq!(first.ordering, 1);
    assert_eq!(second.ordering, 2);
    assert_eq!(second.title, "second");
    assert_eq!(child_ids(&service, root.id), vec![first.id, second.id]);
}

#[test]
fn add_node_rejects_blank_and_overlong_titles_without_writing() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);
    let before = node_count(&conn);

    for title in ["", "   ", &"x".repeat(256)] {
        let err = service.add_node(root.id, title).unwrap_err();
        match err {
            TreeServiceError::Validation(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "title");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(node_count(&conn), before);

    let at_limit = service.add_node(root.id, &"x".repeat(255)).unwrap();
    assert_eq!(at_limit.title.chars().count(), 255);
}

#[test]
fn add_node_with_missing_parent_returns_not_found() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());

    let err = service.add_node(404, "orphan").unwrap_err();
    assert!(matches!(err, TreeServiceError::NotFound(Missing::Parent(404))));
}

#[test]
fn created_node_roundtrips_through_get_node() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);

    let created = service.add_node(root.id, "roundtrip").unwrap();
    let loaded = service.get_node(created.id).unwrap();
    assert_eq!(loaded.title, created.title);
    assert_eq!(loaded.parent_node_id, created.parent_node_id);
    assert_eq!(loaded.ordering, created.ordering);
}

#[test]
fn update_node_renames_without_touching_ordering() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);
    service.add_node(root.id, "a").unwrap();
    let node = service.add_node(root.id, "b").unwrap();

    let updated = service.update_node(node.id, "renamed", None).unwrap();
    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.ordering, node.ordering);

    let same_parent = service
        .update_node(node.id, "again", Some(root.id))
        .unwrap();
    assert_eq!(same_parent.title, "again");
    assert_eq!(same_parent.ordering, node.ordering);
}

#[test]
fn update_node_with_new_parent_appends_and_renames() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);
    let folder = service.add_node(root.id, "folder").unwrap();
    service.add_node(folder.id, "existing").unwrap();
    let node = service.add_node(root.id, "loose").unwrap();

    let updated = service
        .update_node(node.id, "filed", Some(folder.id))
        .unwrap();
    assert_eq!(updated.parent_node_id, Some(folder.id));
    assert_eq!(updated.ordering, 2);
    assert_eq!(updated.title, "filed");
}

#[test]
fn update_root_parent_always_fails_invalid_operation() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);
    let child = service.add_node(root.id, "child").unwrap();

    for parent in [child.id, root.id, 123_456] {
        let err = service
            .update_node(root.id, "root", Some(parent))
            .unwrap_err();
        assert!(matches!(
            err,
            TreeServiceError::InvalidOperation(InvalidOperation::ChangeRootParent)
        ));
    }

    let renamed = service.update_node(root.id, "Top", None).unwrap();
    assert_eq!(renamed.title, "Top");
    assert_eq!(renamed.parent_node_id, None);
}

#[test]
fn update_node_validation_failures() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);
    let node = service.add_node(root.id, "node").unwrap();

    let err = service.update_node(node.id, " ", None).unwrap_err();
    assert!(matches!(err, TreeServiceError::Validation(ref fields) if fields[0].field == "title"));

    let err = service
        .update_node(node.id, "ok", Some(8888))
        .unwrap_err();
    assert!(
        matches!(err, TreeServiceError::Validation(ref fields) if fields[0].field == "parent_node_id")
    );

    let err = service.update_node(7777, "ok", None).unwrap_err();
    assert!(matches!(err, TreeServiceError::NotFound(Missing::Node(7777))));
}

#[test]
fn delete_root_fails_and_delete_subtree_cascades() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);

    let err = service.delete_node(root.id).unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::InvalidOperation(InvalidOperation::DeleteRoot)
    ));

    let parent = service.add_node(root.id, "parent").unwrap();
    let child = service.add_node(parent.id, "child").unwrap();
    let grandchild = service.add_node(child.id, "grandchild").unwrap();

    service.delete_node(parent.id).unwrap();
    for id in [parent.id, child.id, grandchild.id] {
        assert!(matches!(
            service.get_node(id).unwrap_err(),
            TreeServiceError::NotFound(Missing::Node(_))
        ));
    }
    assert_eq!(service.get_tree().unwrap().len(), 1);

    let err = service.delete_node(parent.id).unwrap_err();
    assert!(matches!(err, TreeServiceError::NotFound(_)));
}

#[test]
fn move_node_appends_under_new_parent() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);
    let target = service.add_node(root.id, "target").unwrap();
    let empty = service.add_node(root.id, "empty").unwrap();
    let existing = service.add_node(target.id, "existing").unwrap();
    let store = SqliteNodeStore::try_new(&conn).unwrap();
    store
        .update_node(
            existing.id,
            &nodetree_core::NodeUpdate {
                ordering: Some(6),
                ..Default::default()
            },
        )
        .unwrap();
    let mover = service.add_node(root.id, "mover").unwrap();

    let moved = service.move_node(mover.id, target.id).unwrap();
    assert_eq!(moved.parent_node_id, Some(target.id));
    assert_eq!(moved.ordering, 7);
    assert_eq!(moved.title, "mover");

    let moved = service.move_node(mover.id, empty.id).unwrap();
    assert_eq!(moved.parent_node_id, Some(empty.id));
    assert_eq!(moved.ordering, 1);
}

#[test]
fn move_node_failures() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);
    let a = service.add_node(root.id, "a").unwrap();
    service.add_node(a.id, "a1").unwrap();

    let err = service.move_node(root.id, a.id).unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::InvalidOperation(InvalidOperation::MoveRoot)
    ));

    let err = service.move_node(500, a.id).unwrap_err();
    assert!(matches!(err, TreeServiceError::NotFound(Missing::Node(500))));
    let err = service.move_node(a.id, 501).unwrap_err();
    assert!(matches!(err, TreeServiceError::NotFound(Missing::Parent(501))));
}

#[test]
fn move_and_update_reject_cycles() {
    let conn = setup();
    let service = TreeService::new(SqliteNodeStore::try_new(&conn).unwrap());
    let root = root_of(&service);
    let a = service.add_node(root.id, "a").unwrap();
    let a1 = service.add_node(a.id, "a1").unwrap();
    let a1x = service.add_node(a1.id, "a1x").unwrap();

    let err = service.move_node(a.id, a1x.id).unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::InvalidOperation(InvalidOperation::Cycle { node_id, parent_id })
            if node_id == a.id && parent_id == a1x.id
    ));

    let err = service.move_node(a.id, a.id).unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::InvalidOperation(InvalidOperation::Cycle { .. })
    ));

    let err = service.update_node(a.id, "a", Some(a1.id)).unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::InvalidOperation(InvalidOperation::Cycle { .. })
    ));

    assert_eq!(service.get_tree().unwrap().len(), 4);
}

#[test]
fn reorder_moves_node_to_front_preserving_sibling_order() {
    let conn = setup();
    let store = SqliteNodeStore::try_new(&conn).unwrap();
    let root_id = store.get_root().unwrap().unwrap().id;
    let a = store.create_node("a", root_id, 3).unwrap();
    let b = store.create_node("b", root_id, 1).unwrap();
    let c = store.create_node("c", root_id, 2).unwrap();
    let x = store.create_node("x", root_id, 2).unwrap();
    let service = TreeService::new(store);

    service.reorder_node(x.id).unwrap();

    let tree = service.get_tree().unwrap();
    let children = tree
        .children_of(root_id)
        .into_iter()
        .map(|node| (node.id, node.ordering))
        .collect::<Vec<_>>();
    assert_eq!(children, vec![(x.id, 1), (b.id, 2), (c.id, 3), (a.id, 4)]);

    let err = service.reorder_node(6060).unwrap_err();
    assert!(matches!(err, TreeServiceError::NotFound(Missing::Node(6060))));
}
