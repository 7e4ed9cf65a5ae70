use std::sync::Arc;

use rolegate_auth::{AccessControl, Changes, PermissionCollection, PermissionQuery, RoleCollection, RoleQuery};
use rolegate_core::{AccessError, PageDefaults, PageRequest, PermissionId, UserId};
use rolegate_infra::{connect, migrate, SqlRbacStore, StoreConfig};

async fn setup() -> anyhow::Result<(SqlRbacStore, AccessControl)> {
    rolegate_observability::init_for_tests();

    let pool = connect(&StoreConfig::in_memory()).await?;
    migrate(&pool).await?;
    // Running the schema twice must be harmless.
    migrate(&pool).await?;

    let store = SqlRbacStore::new(pool);
    let access = AccessControl::from_store(Arc::new(store.clone()));
    Ok((store, access))
}

async fn rows(store: &SqlRbacStore, table: &str) -> anyhow::Result<i64> {
    let n = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(store.pool())
        .await?;
    Ok(n)
}

async fn fail_before(store: &SqlRbacStore, event: &str, table: &str) -> anyhow::Result<()> {
    let sql = format!(
        "CREATE TRIGGER fail_{table} BEFORE {event} ON {table} BEGIN SELECT RAISE(ABORT, 'injected'); END"
    );
    sqlx::query(&sql).execute(store.pool()).await?;
    Ok(())
}

#[tokio::test]
async fn admin_can_delete_users_through_role() -> anyhow::Result<()> {
    let (_, access) = setup().await?;
    let user = UserId::new(7);

    access.create_role("admin", None).await?;
    access.create_permission("delete-user", None).await?;
    access.add_permissions_to_role("admin", "delete-user").await?;
    access.add_roles_to_user(user, "admin").await?;

    assert!(access.user_has_permission(user, "delete-user").await?);
    assert!(!access.user_has_direct_permission(user, "delete-user").await?);
    assert!(access.user_has_role(user, "admin").await?);
    assert!(!access.user_has_role(UserId::new(8), "admin").await?);
    Ok(())
}

#[tokio::test]
async fn find_or_create_keeps_one_row() -> anyhow::Result<()> {
    let (store, access) = setup().await?;

    let first = access.create_permission("Create Contact!", Some("contacts")).await?;
    let second = access.create_permission("create $#% contact", None).await?;

    assert_eq!(first.id, second.id);
    assert_eq!(second.guard_name.as_str(), "create-contact");
    assert_eq!(second.description.as_deref(), Some("contacts"));
    assert_eq!(rows(&store, "permissions").await?, 1);
    Ok(())
}

#[tokio::test]
async fn pivot_mutations_have_set_semantics() -> anyhow::Result<()> {
    let (store, access) = setup().await?;
    let user = UserId::new(1);
    for name in ["A", "B", "C"] {
        access.create_permission(name, None).await?;
    }

    access.add_permissions_to_user(user, ["A", "B"]).await?;
    access.add_permissions_to_user(user, ["B", "C"]).await?;
    let direct = access
        .get_direct_permissions_of_user(user, PermissionQuery::default())
        .await?;
    assert_eq!(direct.items.names(), vec!["A", "B", "C"]);
    assert_eq!(rows(&store, "user_permissions").await?, 3);

    access.remove_permissions_from_user(user, ["A", "unknown"]).await?;
    assert!(!access.user_has_direct_permission(user, "A").await?);

    access.replace_permissions_of_user(user, "A").await?;
    assert_eq!(
        access
            .get_direct_permissions_of_user(user, PermissionQuery::default())
            .await?
            .items
            .names(),
        vec!["A"]
    );

    access.replace_permissions_of_user(user, Vec::<String>::new()).await?;
    assert_eq!(rows(&store, "user_permissions").await?, 0);
    Ok(())
}

#[tokio::test]
async fn role_all_versus_any() -> anyhow::Result<()> {
    let (_, access) = setup().await?;
    for name in ["P1", "P2", "P3"] {
        access.create_permission(name, None).await?;
    }
    access.create_role("R", None).await?;
    access.create_role("S", None).await?;
    access.add_permissions_to_role("R", ["P1", "P2"]).await?;
    access.add_permissions_to_role("S", "P1").await?;

    assert!(access.role_has_all_permissions("R", ["P1", "P2"]).await?);
    assert!(!access.role_has_all_permissions("R", ["P1", "P3"]).await?);
    assert!(access.role_has_any_permissions("R", ["P3", "P2"]).await?);
    assert!(!access.role_has_any_permissions("R", ["P3"]).await?);

    // Every permission on every role.
    assert!(access.role_has_all_permissions(["R", "S"], "P1").await?);
    assert!(!access.role_has_all_permissions(["R", "S"], ["P1", "P2"]).await?);
    assert!(access.role_has_permission(["R", "S"], "P2").await?);
    Ok(())
}

#[tokio::test]
async fn effective_permissions_union_direct_and_roles() -> anyhow::Result<()> {
    let (_, access) = setup().await?;
    let user = UserId::new(2);
    for name in ["P1", "P2", "P3"] {
        access.create_permission(name, None).await?;
    }
    access.create_role("R", None).await?;
    access.add_permissions_to_role("R", ["P1", "P2"]).await?;
    access.add_permissions_to_user(user, "P1").await?;
    access.add_roles_to_user(user, "R").await?;

    let effective = access.effective_permissions_of_user(user).await?;
    assert_eq!(effective.len(), 2);

    assert!(access.user_has_all_permissions(user, ["P1", "P2"]).await?);
    assert!(!access.user_has_all_permissions(user, ["P2", "P3"]).await?);
    assert!(access.user_has_any_permissions(user, ["P3", "P2"]).await?);
    assert!(!access.user_has_any_permissions(user, "P3").await?);
    assert!(access.user_has_all_direct_permissions(user, "P1").await?);
    assert!(!access.user_has_any_direct_permissions(user, "P2").await?);
    Ok(())
}

#[tokio::test]
async fn second_page_of_ten() -> anyhow::Result<()> {
    let (_, access) = setup().await?;
    for i in 1..=25 {
        access.create_permission(&format!("permission {i}"), None).await?;
    }

    let page = access.get_all_permissions(PermissionQuery::paged(2, 10)).await?;
    assert_eq!(page.total, 25);
    assert_eq!(page.items.ids(), (11..=20).map(PermissionId::new).collect::<Vec<_>>());

    let last = access.get_all_permissions(PermissionQuery::paged(3, 10)).await?;
    assert_eq!(last.items.len(), 5);
    Ok(())
}

#[tokio::test]
async fn configured_page_size_applies_to_partial_requests() -> anyhow::Result<()> {
    let config = StoreConfig {
        page_defaults: PageDefaults { page: 1, limit: 10 },
        ..StoreConfig::in_memory()
    };
    let access = rolegate_infra::open(&config).await?;
    for i in 1..=25 {
        access.create_role(&format!("role {i}"), None).await?;
    }

    let query = RoleQuery {
        with_permissions: false,
        page: Some(PageRequest {
            page: Some(3),
            limit: None,
        }),
    };
    let page = access.get_all_roles(query).await?;
    assert_eq!(page.total, 25);
    assert_eq!(page.items.names(), (21..=25).map(|i| format!("role {i}")).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn deleting_a_permission_purges_every_pivot_row() -> anyhow::Result<()> {
    let (store, access) = setup().await?;
    access.create_permission("export", None).await?;
    access.create_role("a", None).await?;
    access.create_role("b", None).await?;
    access.add_permissions_to_role("a", "export").await?;
    access.add_permissions_to_role("b", "export").await?;
    access.add_permissions_to_user(UserId::new(1), "export").await?;

    access.delete_permission("export").await?;

    assert_eq!(rows(&store, "permissions").await?, 0);
    assert_eq!(rows(&store, "role_permissions").await?, 0);
    assert_eq!(rows(&store, "user_permissions").await?, 0);
    assert_eq!(rows(&store, "roles").await?, 2);
    Ok(())
}

#[tokio::test]
async fn failed_cascade_leaves_pivots_in_place() -> anyhow::Result<()> {
    let (store, access) = setup().await?;
    access.create_permission("export", None).await?;
    access.create_role("a", None).await?;
    access.create_role("b", None).await?;
    access.add_permissions_to_role("a", "export").await?;
    access.add_permissions_to_role("b", "export").await?;
    access.add_permissions_to_user(UserId::new(1), "export").await?;
    fail_before(&store, "DELETE", "permissions").await?;

    let err = access.delete_permission("export").await.unwrap_err();

    assert!(matches!(err, AccessError::TransactionAborted { operation: "permissions.delete", .. }));
    assert_eq!(rows(&store, "permissions").await?, 1);
    assert_eq!(rows(&store, "role_permissions").await?, 2);
    assert_eq!(rows(&store, "user_permissions").await?, 1);
    Ok(())
}

#[tokio::test]
async fn failed_replace_restores_previous_roles() -> anyhow::Result<()> {
    let (store, access) = setup().await?;
    let user = UserId::new(3);
    access.create_role("editor", None).await?;
    access.create_role("viewer", None).await?;
    access.add_roles_to_user(user, "editor").await?;
    fail_before(&store, "INSERT", "user_roles").await?;

    let err = access.replace_roles_of_user(user, "viewer").await.unwrap_err();

    assert!(matches!(err, AccessError::TransactionAborted { operation: "users.replace_roles", .. }));
    assert!(access.user_has_role(user, "editor").await?);
    assert!(!access.user_has_role(user, "viewer").await?);
    Ok(())
}

#[tokio::test]
async fn deleting_a_role_cascades() -> anyhow::Result<()> {
    let (store, access) = setup().await?;
    access.create_permission("read", None).await?;
    access.create_role("reader", None).await?;
    access.add_permissions_to_role("reader", "read").await?;
    access.add_roles_to_user(UserId::new(4), "reader").await?;

    access.delete_role("reader").await?;

    assert_eq!(rows(&store, "roles").await?, 0);
    assert_eq!(rows(&store, "role_permissions").await?, 0);
    assert_eq!(rows(&store, "user_roles").await?, 0);
    assert!(!access.user_has_permission(UserId::new(4), "read").await?);
    Ok(())
}

#[tokio::test]
async fn roles_load_their_permissions_on_request() -> anyhow::Result<()> {
    let (_, access) = setup().await?;
    for name in ["read", "write", "audit"] {
        access.create_permission(name, None).await?;
    }
    access.create_role("writer", None).await?;
    access.create_role("auditor", None).await?;
    access.add_permissions_to_role("writer", ["read", "write"]).await?;
    access.add_permissions_to_role("auditor", ["read", "audit"]).await?;

    let bare = access.get_role("writer", false).await?;
    assert!(bare.permissions.is_empty());

    let all = access
        .get_all_roles(RoleQuery::default().with_permissions())
        .await?;
    assert_eq!(all.total, 2);
    assert_eq!(all.items[0].permissions.names(), vec!["read", "write"]);
    assert_eq!(all.items.unique_permissions().len(), 3);

    let of_read = access.get_roles_of_permission("read", RoleQuery::default()).await?;
    assert_eq!(of_read.items.names(), vec!["writer", "auditor"]);

    let perms = access
        .get_permissions_of_roles(["writer", "auditor"], PermissionQuery::paged(1, 2))
        .await?;
    assert_eq!(perms.total, 3);
    assert_eq!(perms.items.names(), vec!["read", "write"]);
    Ok(())
}

#[tokio::test]
async fn rename_recomputes_guard_name() -> anyhow::Result<()> {
    let (_, access) = setup().await?;
    access.create_permission("Edit Post", None).await?;
    access.create_permission("Publish Post", None).await?;

    let renamed = access
        .update_permission("edit-post", Changes::rename("Edit Article").with_description(Some("cms".into())))
        .await?;
    assert_eq!(renamed.guard_name.as_str(), "edit-article");
    assert_eq!(renamed.description.as_deref(), Some("cms"));
    assert!(access.get_permission("edit-post").await.unwrap_err().is_not_found());

    let err = access
        .update_permission("edit-article", Changes::rename("publish post"))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::Storage { operation: "permissions.update", .. }));
    Ok(())
}

#[tokio::test]
async fn unknown_single_reference_is_not_found() -> anyhow::Result<()> {
    let (store, access) = setup().await?;
    let user = UserId::new(7);

    let err = access.add_permissions_to_role("ghost", "anything").await.unwrap_err();
    assert_eq!(err, AccessError::not_found("role", "ghost"));

    let err = access.user_has_permission(user, 42u64).await.unwrap_err();
    assert_eq!(err, AccessError::not_found("permission", 42));

    let err = access.add_permissions_to_user(user, "delete-usr").await.unwrap_err();
    assert_eq!(err, AccessError::not_found("permission", "delete-usr"));
    let err = access.add_roles_to_user(user, "admn").await.unwrap_err();
    assert_eq!(err, AccessError::not_found("role", "admn"));
    let err = access.user_has_all_roles(user, "admn").await.unwrap_err();
    assert_eq!(err, AccessError::not_found("role", "admn"));

    assert_eq!(rows(&store, "user_roles").await?, 0);
    assert_eq!(rows(&store, "user_permissions").await?, 0);
    Ok(())
}

#[tokio::test]
async fn role_permission_verbs_have_set_semantics() -> anyhow::Result<()> {
    let (store, access) = setup().await?;
    for name in ["P1", "P2", "P3"] {
        access.create_permission(name, None).await?;
    }
    access.create_role("R", None).await?;

    access.add_permissions_to_role("R", ["P1", "P2"]).await?;
    access.add_permissions_to_role("R", ["P2", "P3"]).await?;
    assert_eq!(rows(&store, "role_permissions").await?, 3);

    access.remove_permissions_from_role("R", ["P1", "missing"]).await?;
    assert_eq!(access.get_role("R", true).await?.permissions.names(), vec!["P2", "P3"]);

    access.replace_permissions_of_role("R", "P1").await?;
    assert_eq!(access.get_role("R", true).await?.permissions.names(), vec!["P1"]);

    access.replace_permissions_of_role("R", Vec::<String>::new()).await?;
    assert_eq!(rows(&store, "role_permissions").await?, 0);

    access.add_permissions_to_role("R", ["P1", "P3"]).await?;
    access.clear_permissions_of_role("R").await?;
    assert!(!access.role_has_any_permissions("R", ["P1", "P2", "P3"]).await?);
    Ok(())
}

#[tokio::test]
async fn user_role_verbs_and_checks() -> anyhow::Result<()> {
    let (store, access) = setup().await?;
    for name in ["R", "S", "T"] {
        access.create_role(name, None).await?;
    }
    access.create_permission("P1", None).await?;
    let user = UserId::new(8);

    access.add_roles_to_user(user, ["R", "S"]).await?;
    assert!(access.user_has_all_roles(user, ["R", "S"]).await?);
    assert!(!access.user_has_all_roles(user, ["R", "T"]).await?);
    assert!(!access.user_has_all_roles(user, ["R", "missing"]).await?);
    assert!(access.user_has_any_roles(user, ["T", "S"]).await?);
    assert!(!access.user_has_any_roles(user, "T").await?);

    access.remove_roles_from_user(user, ["R", "missing"]).await?;
    assert!(!access.user_has_role(user, "R").await?);
    assert!(access.user_has_role(user, "S").await?);

    access.clear_roles_of_user(user).await?;
    assert_eq!(rows(&store, "user_roles").await?, 0);

    access.add_permissions_to_user(user, "P1").await?;
    access.clear_permissions_of_user(user).await?;
    assert_eq!(rows(&store, "user_permissions").await?, 0);
    Ok(())
}

#[tokio::test]
async fn long_key_lists_are_split_across_statements() -> anyhow::Result<()> {
    let (store, access) = setup().await?;
    let user = UserId::new(9);
    for i in 1..=900 {
        access.create_permission(&format!("p{i}"), None).await?;
    }
    let granted: Vec<u64> = (1..=900).collect();

    // Unknown ids past the last row are simply absent.
    let found = access.get_permissions((1..=40_000).collect::<Vec<u64>>()).await?;
    assert_eq!(found.ids(), granted.iter().copied().map(PermissionId::new).collect::<Vec<_>>());
    let names: Vec<String> = (1..=900).map(|i| format!("p{i}")).collect();
    assert_eq!(access.get_permissions(names).await?.len(), 900);

    access.add_permissions_to_user(user, granted.clone()).await?;
    assert_eq!(rows(&store, "user_permissions").await?, 900);
    assert!(access.user_has_all_direct_permissions(user, granted.clone()).await?);
    assert!(access.user_has_any_direct_permissions(user, (1..=40_000).collect::<Vec<u64>>()).await?);
    assert_eq!(access.effective_permissions_of_user(user).await?.len(), 900);

    access.remove_permissions_from_user(user, granted).await?;
    assert_eq!(rows(&store, "user_permissions").await?, 0);
    Ok(())
}

#[tokio::test]
async fn many_roles_project_and_load_in_chunks() -> anyhow::Result<()> {
    let (_, access) = setup().await?;
    access.create_permission("shared", None).await?;
    access.create_permission("odd", None).await?;
    for i in 1..=450 {
        let role = access.create_role(&format!("role {i}"), None).await?;
        access.add_permissions_to_role(role.id, "shared").await?;
    }
    access.add_permissions_to_role(449u64, "odd").await?;
    let all: Vec<u64> = (1..=450).collect();

    let perms = access
        .get_permissions_of_roles(all.clone(), PermissionQuery::paged(2, 1))
        .await?;
    assert_eq!(perms.total, 2);
    assert_eq!(perms.items.names(), vec!["odd"]);

    let roles = access.get_roles(all, true).await?;
    assert_eq!(roles.len(), 450);
    assert!(roles.iter().all(|role| role.permissions.names().contains(&"shared")));
    assert_eq!(roles.unique_permissions().len(), 2);
    Ok(())
}
