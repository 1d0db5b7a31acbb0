use grantline_application::{GrantRepository, RoleAdminRepository};
use grantline_core::{OrganizationId, PrincipalId, RoleId};
use grantline_domain::{ModuleKey, RoleGrant};
use serde_json::json;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresRoleAdminRepository;
use crate::PostgresGrantRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres role admin tests: {error}");
    }

    Some(pool)
}

async fn seed_role_with_member(pool: &PgPool) -> (RoleId, PrincipalId) {
    let organization_id = OrganizationId::new();
    let role_id = RoleId::new();
    let principal_id = PrincipalId::new();

    let organization = sqlx::query(
        r#"
            INSERT INTO organizations (id, display_name)
            VALUES ($1, $2)
            "#,
    )
    .bind(organization_id.as_uuid())
    .bind("Admin Test Org")
    .execute(pool)
    .await;
    assert!(organization.is_ok());

    let role = sqlx::query(
        r#"
            INSERT INTO roles (id, organization_id, display_name, is_active)
            VALUES ($1, $2, $3, TRUE)
            "#,
    )
    .bind(role_id.as_uuid())
    .bind(organization_id.as_uuid())
    .bind("Admin Test Role")
    .execute(pool)
    .await;
    assert!(role.is_ok());

    let principal = sqlx::query(
        r#"
            INSERT INTO principals (id)
            VALUES ($1)
            "#,
    )
    .bind(principal_id.as_uuid())
    .execute(pool)
    .await;
    assert!(principal.is_ok());

    let membership = sqlx::query(
        r#"
            INSERT INTO memberships (principal_id, role_id, is_active)
            VALUES ($1, $2, TRUE)
            "#,
    )
    .bind(principal_id.as_uuid())
    .bind(role_id.as_uuid())
    .execute(pool)
    .await;
    assert!(membership.is_ok());

    (role_id, principal_id)
}

fn module_key(value: &str) -> ModuleKey {
    match value.parse() {
        Ok(key) => key,
        Err(error) => panic!("module key '{value}' should parse: {error}"),
    }
}

fn module_grant(module: &str, capability: &str) -> RoleGrant {
    match capability.parse() {
        Ok(capability) => RoleGrant::Module {
            module: module_key(module),
            capability,
        },
        Err(error) => panic!("capability key '{capability}' should parse: {error}"),
    }
}

#[tokio::test]
async fn grants_apply_idempotently_and_revoke_cleanly() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleAdminRepository::new(pool.clone());
    let grants = PostgresGrantRepository::new(pool.clone());
    let (role_id, _) = seed_role_with_member(&pool).await;
    let grant = module_grant("sales", "view");

    if let Err(error) = repository.set_module_access(role_id, &module_key("sales"), true).await {
        panic!("module access should apply: {error}");
    }
    for _ in 0..2 {
        if let Err(error) = repository.apply_grant(role_id, &grant).await {
            panic!("grant should apply idempotently: {error}");
        }
    }

    let enabled = match grants.list_enabled_modules(role_id).await {
        Ok(modules) => modules,
        Err(error) => panic!("enabled module query should succeed: {error}"),
    };
    let capabilities = match grants.list_module_capabilities(role_id, &enabled).await {
        Ok(capabilities) => capabilities,
        Err(error) => panic!("module capability query should succeed: {error}"),
    };
    assert!(
        capabilities
            .get(&module_key("sales"))
            .is_some_and(|granted| granted.len() == 1)
    );

    if let Err(error) = repository.revoke_grant(role_id, &grant).await {
        panic!("grant should revoke: {error}");
    }
    let capabilities = match grants.list_module_capabilities(role_id, &enabled).await {
        Ok(capabilities) => capabilities,
        Err(error) => panic!("module capability query should succeed: {error}"),
    };
    assert!(!capabilities.contains_key(&module_key("sales")));
}

#[tokio::test]
async fn module_access_toggle_upserts() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleAdminRepository::new(pool.clone());
    let grants = PostgresGrantRepository::new(pool.clone());
    let (role_id, _) = seed_role_with_member(&pool).await;

    for is_enabled in [true, false] {
        if let Err(error) = repository
            .set_module_access(role_id, &module_key("sales"), is_enabled)
            .await
        {
            panic!("module access should apply: {error}");
        }
    }

    let enabled = match grants.list_enabled_modules(role_id).await {
        Ok(modules) => modules,
        Err(error) => panic!("enabled module query should succeed: {error}"),
    };
    assert!(enabled.is_empty());
}

#[tokio::test]
async fn deactivating_a_membership_unbinds_the_principal() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleAdminRepository::new(pool.clone());
    let (role_id, principal_id) = seed_role_with_member(&pool).await;

    let bound = match repository.list_bound_principals(role_id).await {
        Ok(bound) => bound,
        Err(error) => panic!("bound principal query should succeed: {error}"),
    };
    assert_eq!(bound, vec![principal_id]);

    if let Err(error) = repository.deactivate_membership(principal_id, role_id).await {
        panic!("membership deactivation should succeed: {error}");
    }

    let bound = match repository.list_bound_principals(role_id).await {
        Ok(bound) => bound,
        Err(error) => panic!("bound principal query should succeed: {error}"),
    };
    assert!(bound.is_empty());
}

#[tokio::test]
async fn deactivating_an_unknown_role_reports_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleAdminRepository::new(pool.clone());
    let missing = repository.deactivate_role(RoleId::new()).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn legacy_payloads_survive_listing_until_cleared() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresRoleAdminRepository::new(pool.clone());
    let (role_id, _) = seed_role_with_member(&pool).await;

    let staged = sqlx::query(
        r#"
            INSERT INTO legacy_role_grants (role_id, payload)
            VALUES ($1, $2)
            "#,
    )
    .bind(role_id.as_uuid())
    .bind(json!({"system": ["users.manage"]}))
    .execute(&pool)
    .await;
    assert!(staged.is_ok());

    // Listing leaves the rows in place, so an import that fails partway
    // can be retried against the same payloads.
    for _ in 0..2 {
        let listed = match repository.list_legacy_grant_blobs(role_id).await {
            Ok(listed) => listed,
            Err(error) => panic!("legacy listing should succeed: {error}"),
        };
        assert_eq!(listed, vec![json!({"system": ["users.manage"]})]);
    }

    if let Err(error) = repository.clear_legacy_grant_blobs(role_id).await {
        panic!("legacy clearing should succeed: {error}");
    }

    let listed = match repository.list_legacy_grant_blobs(role_id).await {
        Ok(listed) => listed,
        Err(error) => panic!("legacy listing should succeed: {error}"),
    };
    assert!(listed.is_empty());
}
