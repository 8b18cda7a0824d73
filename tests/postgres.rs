//! Convergence against a real PostgreSQL. Needs Docker.

mod common;
use common::*;
use modelsync::sync::execute_plan;

async fn live_plan(model: &Model, connection: &PgConnection) -> SyncPlan {
    let catalog = PgCatalog::new(connection);
    inspect_and_plan(model, &catalog, Dialect::Postgres, &permissive())
        .await
        .unwrap()
        .1
}

async fn sync(model: &Model, connection: &PgConnection) -> ApplyReport {
    let plan = live_plan(model, connection).await;
    let mut executor = PgExecutor::new(connection);
    execute_plan(&plan, &mut executor).await
}

#[tokio::test]
#[ignore = "requires docker"]
async fn empty_database_converges() {
    let (_container, url) = setup_postgres().await;
    let connection = PgConnection::new(&url).await.unwrap();
    let model = prepare(&person_address_model(), Dialect::Postgres);

    let report = sync(&model, &connection).await;
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.applied(), 2);

    let second = live_plan(&model, &connection).await;
    assert!(second.is_empty(), "{:?}", second.changes);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn introspection_reads_back_created_schema() {
    let (_container, url) = setup_postgres().await;
    let connection = PgConnection::new(&url).await.unwrap();
    let model = EntityModel::new().entity(
        Entity::new("Invoice")
            .field(Field::new("Id", SemanticType::Int64).identity())
            .field(Field::new("Total", SemanticType::Decimal { precision: 12, scale: 4 }))
            .field(Field::new("Issued", SemanticType::DateTimeOffset))
            .field(Field::new("Paid", SemanticType::Bool).nullable())
            .field(Field::new("Pdf", SemanticType::Binary).nullable()),
    );
    let model = prepare(&model, Dialect::Postgres);
    assert!(sync(&model, &connection).await.is_success());

    let live = inspect_catalog(&PgCatalog::new(&connection), &TypeMapper::new(Dialect::Postgres))
        .await
        .unwrap();
    let invoice = live.get("Invoice").unwrap();
    assert!(invoice.column("Id").unwrap().is_primary_key);
    assert_eq!(
        invoice.column("Total").unwrap().semantic_type(),
        Some(SemanticType::Decimal { precision: 12, scale: 4 })
    );
    assert!(invoice.column("Paid").unwrap().nullable);
    assert!(!invoice.column("Issued").unwrap().nullable);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn model_changes_are_applied_in_place() {
    let (_container, url) = setup_postgres().await;
    let connection = PgConnection::new(&url).await.unwrap();

    sqlx::query(r#"CREATE TABLE "Address" ("Id" INTEGER NOT NULL PRIMARY KEY, "Street" TEXT)"#)
        .execute(connection.pool())
        .await
        .unwrap();
    sqlx::query(
        r#"CREATE TABLE "Person" ("Id" INTEGER NOT NULL PRIMARY KEY, "Name" TEXT, "Legacy" TEXT, "Code" VARCHAR(12))"#,
    )
    .execute(connection.pool())
    .await
    .unwrap();

    let model = prepare(&person_address_model(), Dialect::Postgres);
    let plan = live_plan(&model, &connection).await;
    assert_eq!(
        plan.sql(),
        vec![
            r#"ALTER TABLE "Person" DROP COLUMN "Legacy";"#,
            r#"ALTER TABLE "Person" ADD COLUMN "AddressId" INTEGER NOT NULL;"#,
            r#"ALTER TABLE "Person" ADD CONSTRAINT "FK_Person_AddressId" FOREIGN KEY ("AddressId") REFERENCES "Address" ("Id");"#,
        ]
    );

    assert!(sync(&model, &connection).await.is_success());
    assert!(live_plan(&model, &connection).await.is_empty());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn failed_statement_does_not_stop_unrelated_tables() {
    let (_container, url) = setup_postgres().await;
    let connection = PgConnection::new(&url).await.unwrap();

    // A row makes the NOT NULL column add fail on Person only.
    sqlx::query(r#"CREATE TABLE "Person" ("Id" INTEGER NOT NULL PRIMARY KEY, "Name" TEXT)"#)
        .execute(connection.pool())
        .await
        .unwrap();
    sqlx::query(r#"INSERT INTO "Person" ("Id", "Name") VALUES (1, 'Ada')"#)
        .execute(connection.pool())
        .await
        .unwrap();

    let model = prepare(
        &person_address_model().entity(
            Entity::new("Tag").field(Field::new("Id", SemanticType::Int32).identity()),
        ),
        Dialect::Postgres,
    );
    let report = sync(&model, &connection).await;

    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped(), 1);
    assert!(connection_has_table(&connection, "Tag").await);
    assert!(connection_has_table(&connection, "Address").await);
}

async fn connection_has_table(connection: &PgConnection, table: &str) -> bool {
    let catalog = PgCatalog::new(connection);
    inspect_catalog(&catalog, &TypeMapper::new(Dialect::Postgres))
        .await
        .unwrap()
        .contains(table)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn non_default_schema_converges() {
    let (_container, url) = setup_postgres().await;
    let connection = PgConnection::new(&url).await.unwrap();
    sqlx::query("CREATE SCHEMA app")
        .execute(connection.pool())
        .await
        .unwrap();

    let model = prepare(&person_address_model(), Dialect::Postgres);
    let catalog = PgCatalog::new(&connection).with_schema("app");
    let (_, plan) = inspect_and_plan(&model, &catalog, Dialect::Postgres, &permissive())
        .await
        .unwrap();
    let mut executor = PgExecutor::new(&connection).with_schema("app");
    assert!(execute_plan(&plan, &mut executor).await.is_success());

    let (_, second) = inspect_and_plan(&model, &catalog, Dialect::Postgres, &permissive())
        .await
        .unwrap();
    assert!(second.is_empty(), "{:?}", second.changes);
    assert!(!connection_has_table(&connection, "Person").await);
}
