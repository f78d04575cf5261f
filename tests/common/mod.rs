//! Common test utilities

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

/// The restaurant seeded by the initial migration, configured with the
/// `mock` processor.
pub const SEEDED_RESTAURANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Setup test database - truncate tables and seed test data.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to test database");

    let mut tx = pool.begin().await.expect("failed to begin transaction");

    sqlx::query(
        "TRUNCATE TABLE payment_events, outbox, auth_request_state, \
         auth_idempotency_keys, auth_processing_locks CASCADE",
    )
    .execute(&mut *tx)
    .await
    .expect("failed to truncate tables");

    let seeded_restaurant_id: Uuid = SEEDED_RESTAURANT_ID.parse().unwrap();
    sqlx::query(
        r#"
        INSERT INTO restaurant_payment_configs (restaurant_id, config_version, processor_name, processor_config, is_active)
        VALUES ($1, 'v1', 'mock', '{"default_response": "authorized", "latency_ms": 0}', TRUE)
        ON CONFLICT (restaurant_id) DO UPDATE SET is_active = TRUE
        "#,
    )
    .bind(seeded_restaurant_id)
    .execute(&mut *tx)
    .await
    .expect("failed to seed restaurant payment config");

    tx.commit().await.expect("failed to commit transaction");

    pool
}

/// Seed an additional active restaurant config for tests that need more
/// than one tenant.
pub async fn seed_restaurant_config(pool: &PgPool, restaurant_id: Uuid, processor_name: &str) {
    sqlx::query(
        r#"
        INSERT INTO restaurant_payment_configs (restaurant_id, config_version, processor_name, processor_config, is_active)
        VALUES ($1, 'v1', $2, '{}', TRUE)
        ON CONFLICT (restaurant_id) DO UPDATE SET processor_name = EXCLUDED.processor_name, is_active = TRUE
        "#,
    )
    .bind(restaurant_id)
    .bind(processor_name)
    .execute(pool)
    .await
    .expect("failed to seed restaurant payment config");
}
