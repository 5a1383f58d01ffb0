//! Order, tracking sample and realtime configuration storage.

use alphapulse_domain::DomainError;
use alphapulse_domain::entities::{
    NewOrder, Order, OrderId, RealtimeConfig, SymbolStatistics, TakeProfitTargets, TrackingSample,
};
use alphapulse_domain::enums::{KlineInterval, OrderStatus};
use alphapulse_execution::ports::{OrderFilter, OrderStore, StatusUpdate, StoreError};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

const ORDER_COLUMNS: &str = "id, symbol, kline_interval, ai_model, direction, risk_level, \
     entry_price, stop_loss, target_t1, target_t2, target_t3, position_size_percentage, \
     analysis_summary, status, created_at, closed_at, closed_price, final_profit_percentage";

const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Repository for orders and their audit trail.
///
/// Status transitions are conditional on the row still being `OPEN`, so two
/// sweeps racing on the same order produce exactly one transition.
#[derive(Clone)]
pub struct OrderRepository {
    pool: Arc<PgPool>,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: OrderId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ai_trading_orders WHERE id = $1)")
            .bind(id.0)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(backend)
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn insert(&self, order: NewOrder) -> Result<Order, StoreError> {
        let query = format!(
            r#"
            INSERT INTO ai_trading_orders (symbol, kline_interval, ai_model, direction, risk_level,
                                           entry_price, stop_loss, target_t1, target_t2, target_t3,
                                           position_size_percentage, analysis_summary)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query(&query)
            .bind(&order.symbol)
            .bind(order.interval.as_str())
            .bind(&order.ai_model)
            .bind(order.direction.as_str())
            .bind(order.risk_level.as_str())
            .bind(order.entry_price)
            .bind(order.stop_loss)
            .bind(order.targets.t1)
            .bind(order.targets.t2)
            .bind(order.targets.t3)
            .bind(order.position_size_percentage)
            .bind(&order.analysis_summary)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(backend)?;
        order_from_row(&row).map_err(backend)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM ai_trading_orders WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.0)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(backend)?;
        row.as_ref()
            .map(order_from_row)
            .transpose()
            .map_err(backend)
    }

    async fn list_open(&self) -> Result<Vec<Order>, StoreError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM ai_trading_orders WHERE status = 'OPEN' ORDER BY id"
        );
        let rows = sqlx::query(&query)
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(backend)?;
        rows.iter()
            .map(order_from_row)
            .collect::<Result<_, _>>()
            .map_err(backend)
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, StoreError> {
        // LIMIT NULL means no limit in PostgreSQL
        let query = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM ai_trading_orders
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR symbol = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#
        );
        let rows = sqlx::query(&query)
            .bind(filter.status.map(OrderStatus::as_str))
            .bind(filter.symbol.as_deref().map(str::to_ascii_uppercase))
            .bind(limit_param(filter.limit))
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(backend)?;
        rows.iter()
            .map(order_from_row)
            .collect::<Result<_, _>>()
            .map_err(backend)
    }

    async fn update_status(&self, id: OrderId, update: StatusUpdate) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE ai_trading_orders
            SET status = $2, closed_price = $3, final_profit_percentage = $4,
                closed_at = $5, updated_at = NOW()
            WHERE id = $1 AND status = 'OPEN'
            "#,
        )
        .bind(id.0)
        .bind(update.status.as_str())
        .bind(update.closed_price)
        .bind(update.closed_profit)
        .bind(update.closed_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(backend)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if self.exists(id).await? {
            debug!(order_id = id.0, "Order already left OPEN, update skipped");
            Ok(false)
        } else {
            Err(StoreError::OrderNotFound(id))
        }
    }

    async fn append_sample(&self, sample: &TrackingSample) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO order_profit_tracking (order_id, current_price, profit_percentage,
                                               tracking_interval, is_stop_loss_triggered,
                                               is_take_profit_triggered, triggered_target,
                                               tracked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(sample.order_id.0)
        .bind(sample.price)
        .bind(sample.profit_percentage)
        .bind(sample.cadence.label())
        .bind(sample.stop_loss_triggered)
        .bind(sample.take_profit_triggered)
        .bind(sample.triggered_target.map(|t| t.as_str()))
        .bind(sample.tracked_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|err| missing_order(err, sample.order_id))?;
        Ok(())
    }

    async fn list_samples(&self, id: OrderId) -> Result<Vec<TrackingSample>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, current_price, profit_percentage, tracking_interval,
                   is_stop_loss_triggered, is_take_profit_triggered, triggered_target, tracked_at
            FROM order_profit_tracking
            WHERE order_id = $1
            ORDER BY tracked_at ASC, id ASC
            "#,
        )
        .bind(id.0)
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(backend)?;
        rows.iter()
            .map(sample_from_row)
            .collect::<Result<_, _>>()
            .map_err(backend)
    }

    async fn list_realtime_enabled(&self) -> Result<HashMap<OrderId, KlineInterval>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT c.order_id, c.tracking_interval
            FROM realtime_tracking_config c
            JOIN ai_trading_orders o ON o.id = c.order_id
            WHERE c.is_enabled AND o.status = 'OPEN'
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(backend)?;

        let mut enabled = HashMap::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get("order_id").map_err(backend)?;
            let interval = parse_column(row, "tracking_interval").map_err(backend)?;
            enabled.insert(OrderId(id), interval);
        }
        Ok(enabled)
    }

    async fn realtime_config(&self, id: OrderId) -> Result<Option<RealtimeConfig>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT order_id, is_enabled, tracking_interval
            FROM realtime_tracking_config
            WHERE order_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(backend)?;
        row.as_ref()
            .map(realtime_from_row)
            .transpose()
            .map_err(backend)
    }

    async fn upsert_realtime(&self, config: RealtimeConfig) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO realtime_tracking_config (order_id, is_enabled, tracking_interval)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_id) DO UPDATE SET
                is_enabled = EXCLUDED.is_enabled,
                tracking_interval = EXCLUDED.tracking_interval,
                updated_at = NOW()
            "#,
        )
        .bind(config.order_id.0)
        .bind(config.enabled)
        .bind(config.interval.as_str())
        .execute(self.pool.as_ref())
        .await
        .map_err(|err| missing_order(err, config.order_id))?;
        Ok(())
    }

    async fn statistics(&self, symbol: Option<&str>) -> Result<Vec<SymbolStatistics>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT symbol,
                   COUNT(*) AS total_orders,
                   COUNT(*) FILTER (WHERE status = 'OPEN') AS open_orders,
                   COUNT(*) FILTER (WHERE status <> 'OPEN') AS closed_orders,
                   COUNT(*) FILTER (WHERE final_profit_percentage > 0) AS wins,
                   COUNT(*) FILTER (WHERE final_profit_percentage < 0) AS losses,
                   COALESCE(SUM(final_profit_percentage), 0) AS total_profit
            FROM ai_trading_orders
            WHERE ($1::TEXT IS NULL OR symbol = $1)
            GROUP BY symbol
            ORDER BY total_orders DESC, symbol ASC
            "#,
        )
        .bind(symbol.map(str::to_ascii_uppercase))
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(backend)?;
        rows.iter()
            .map(statistics_from_row)
            .collect::<Result<_, _>>()
            .map_err(backend)
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        id: OrderId(row.try_get("id")?),
        symbol: row.try_get("symbol")?,
        interval: parse_column(row, "kline_interval")?,
        ai_model: row.try_get("ai_model")?,
        direction: parse_column(row, "direction")?,
        risk_level: parse_column(row, "risk_level")?,
        entry_price: row.try_get("entry_price")?,
        stop_loss: row.try_get("stop_loss")?,
        targets: TakeProfitTargets::new(
            row.try_get("target_t1")?,
            row.try_get("target_t2")?,
            row.try_get("target_t3")?,
        ),
        position_size_percentage: row.try_get("position_size_percentage")?,
        analysis_summary: row.try_get("analysis_summary")?,
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
        closed_at: row.try_get("closed_at")?,
        closed_price: row.try_get("closed_price")?,
        final_profit_percentage: row.try_get("final_profit_percentage")?,
    })
}

fn sample_from_row(row: &PgRow) -> Result<TrackingSample, sqlx::Error> {
    let triggered_target: Option<String> = row.try_get("triggered_target")?;
    Ok(TrackingSample {
        order_id: OrderId(row.try_get("order_id")?),
        cadence: parse_column(row, "tracking_interval")?,
        price: row.try_get("current_price")?,
        profit_percentage: row.try_get("profit_percentage")?,
        stop_loss_triggered: row.try_get("is_stop_loss_triggered")?,
        take_profit_triggered: row.try_get("is_take_profit_triggered")?,
        triggered_target: triggered_target
            .map(|raw| parse_value("triggered_target", &raw))
            .transpose()?,
        tracked_at: row.try_get("tracked_at")?,
    })
}

fn realtime_from_row(row: &PgRow) -> Result<RealtimeConfig, sqlx::Error> {
    Ok(RealtimeConfig {
        order_id: OrderId(row.try_get("order_id")?),
        enabled: row.try_get("is_enabled")?,
        interval: parse_column(row, "tracking_interval")?,
    })
}

fn statistics_from_row(row: &PgRow) -> Result<SymbolStatistics, sqlx::Error> {
    Ok(SymbolStatistics {
        symbol: row.try_get("symbol")?,
        total_orders: count_column(row, "total_orders")?,
        open_orders: count_column(row, "open_orders")?,
        closed_orders: count_column(row, "closed_orders")?,
        wins: count_column(row, "wins")?,
        losses: count_column(row, "losses")?,
        total_profit: row.try_get("total_profit")?,
    })
}

/// Reads a `COUNT(*)` column, which PostgreSQL returns as `BIGINT`.
fn count_column(row: &PgRow, column: &str) -> Result<u64, sqlx::Error> {
    let count: i64 = row.try_get(column)?;
    count_value(column, count)
}

fn count_value(column: &str, count: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(count).map_err(|err| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    })
}

/// Reads a text column holding one of the domain's closed variants.
fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = DomainError>,
{
    let raw: String = row.try_get(column)?;
    parse_value(column, &raw)
}

fn parse_value<T>(column: &str, raw: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(|err: DomainError| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    })
}

fn limit_param(limit: Option<usize>) -> Option<i64> {
    limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX))
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn missing_order(err: sqlx::Error, id: OrderId) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
            StoreError::OrderNotFound(id)
        }
        _ => backend(err),
    }
}
