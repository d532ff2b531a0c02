use crate::config::DatabaseConfig;
use crate::domain::contract::{ContractEvent, ContractStage, EventPayload, NewContractEvent};
use crate::domain::ports::EventLog;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Table holding every contract lifecycle event.
pub const TABLE: &str = "contract_events";

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS contract_events (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        contract_id BIGINT NULL,
        stage VARCHAR(64) NOT NULL,
        payload JSON NOT NULL,
        order_id VARCHAR(128) NULL,
        created_at DATETIME(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3),
        INDEX idx_contract_id (contract_id),
        INDEX idx_stage (stage),
        INDEX idx_created_at (created_at)
    )
"#;

#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    contract_id: Option<i64>,
    stage: String,
    payload: Json<serde_json::Value>,
    order_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for ContractEvent {
    type Error = CheckoutError;

    fn try_from(row: EventRow) -> Result<Self> {
        let stage: ContractStage = row.stage.parse()?;
        Ok(Self {
            id: row.id,
            contract_id: row.contract_id,
            payload: EventPayload::from_parts(stage, row.payload.0)?,
            order_id: row.order_id,
            created_at: row.created_at,
        })
    }
}

/// A persistent event log backed by MySQL.
///
/// The pool is created lazily: no connection is attempted until the first
/// query, and the table is created on first use. Every query checks a
/// connection out of the pool for its own duration only; sqlx returns it on
/// drop, including on error paths.
///
/// This struct is cheap to clone (`MySqlPool` is reference counted).
#[derive(Clone)]
pub struct MySqlEventLog {
    pool: MySqlPool,
    schema_ready: std::sync::Arc<OnceCell<()>>,
}

impl MySqlEventLog {
    /// Builds the pool from `config` without connecting.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(config.password.expose_secret())
            .database(&config.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy_with(options);

        Self::from_pool(pool)
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self {
            pool,
            schema_ready: Default::default(),
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
                tracing::debug!(table = TABLE, "Event table ready");
                Ok::<(), CheckoutError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventLog for MySqlEventLog {
    async fn log_event(&self, event: NewContractEvent) -> Result<i64> {
        self.ensure_schema().await?;

        let stage = event.payload.stage();
        let payload = event.payload.to_value()?;
        let result = sqlx::query(
            "INSERT INTO contract_events (contract_id, stage, payload, order_id, created_at) \
             VALUES (?, ?, ?, ?, NOW(3))",
        )
        .bind(event.contract_id)
        .bind(stage.as_str())
        .bind(Json(payload))
        .bind(event.order_id)
        .execute(&self.pool)
        .await?;

        let id = i64::try_from(result.last_insert_id())
            .map_err(|e| CheckoutError::InternalError(Box::new(e)))?;
        tracing::debug!(id, %stage, "Logged contract event");
        Ok(id)
    }

    async fn get_contract_by_id(&self, id: i64) -> Result<Option<ContractEvent>> {
        self.ensure_schema().await?;

        let row = sqlx::query_as::<_, EventRow>(
            "SELECT id, contract_id, stage, payload, order_id, created_at \
             FROM contract_events WHERE id = ? AND stage = 'form_submitted'",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContractEvent::try_from).transpose()
    }

    async fn get_contract_events(&self, contract_id: i64) -> Result<Vec<ContractEvent>> {
        self.ensure_schema().await?;

        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT id, contract_id, stage, payload, order_id, created_at \
             FROM contract_events WHERE id = ? OR contract_id = ? \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(contract_id)
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ContractEvent::try_from).collect()
    }
}
