//! Postgres-backed facility store.
//!
//! Every statement binds its values as positional parameters; column lists
//! are the only text spliced into SQL.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Constraint` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (other) | Any other | `Database` |
//! | PoolClosed / PoolTimedOut / Io / other | N/A | `Database` |
//!
//! ## Rollback
//!
//! `PgFacilityTx` wraps a `sqlx::Transaction`; dropping it without `commit`
//! rolls back, and a lost connection is aborted by the server.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::instrument;

use facilities_assets::{
    Component, ComponentFilter, ComponentStatus, Frequency, InventoryLine, MaintenanceRecord,
    MaintenanceStatus, NewComponent, NewMaintenance, Promotion, SpareMatch,
};
use facilities_core::{ComponentId, ItemId, LocationId, MaintenanceId, UserId};

use super::{FacilityStore, FacilityTx, StoreError};

const MIGRATION: &str = include_str!("../../../../migrations/0001_init.sql");

const COMPONENT_COLUMNS: &str = "id, nombre, numero_serie, estado, ubicacion_id, \
     responsable_mantenimiento, item_id, fecha_instalacion, fecha_ultima_revision, \
     vida_util_meses, fecha_creacion";

const MAINTENANCE_COLUMNS: &str = "id, nombre, descripcion, frecuencia, fecha_programada, \
     estado, componente_id, operario_id, ubicacion_id, comentarios";

const INVENTORY_COLUMNS: &str =
    "item_id, cantidad, costo_unitario, ubicacion_actual, fecha_actualizacion";

/// Postgres-backed store. Cheap to clone (shares the pool).
#[derive(Debug, Clone)]
pub struct PgFacilityStore {
    pool: PgPool,
}

impl PgFacilityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool of at most `max_connections`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes when missing.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        tracing::info!("schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl FacilityStore for PgFacilityStore {
    async fn begin(&self) -> Result<Box<dyn FacilityTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgFacilityTx { tx }))
    }
}

/// One open Postgres transaction.
pub struct PgFacilityTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl FacilityTx for PgFacilityTx {
    #[instrument(skip(self), fields(component_id = %id), err)]
    async fn component(&mut self, id: ComponentId) -> Result<Option<Component>, StoreError> {
        let sql = format!("SELECT {COMPONENT_COLUMNS} FROM componentes WHERE id = $1");
        sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("select_component", e))?
            .map(Component::try_from)
            .transpose()
    }

    #[instrument(skip(self), fields(component_id = %id), err)]
    async fn lock_component(&mut self, id: ComponentId) -> Result<Option<Component>, StoreError> {
        let sql = format!("SELECT {COMPONENT_COLUMNS} FROM componentes WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_component", e))?
            .map(Component::try_from)
            .transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_components(&mut self, filter: &ComponentFilter) -> Result<Vec<Component>, StoreError> {
        let sql = format!(
            "SELECT {COMPONENT_COLUMNS} FROM componentes \
             WHERE ($1::text IS NULL OR estado = $1) \
               AND ($2::bigint IS NULL OR ubicacion_id = $2) \
               AND ($3::bigint IS NULL OR item_id = $3) \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.location_id.map(|l| l.get()))
            .bind(filter.item_id.map(|i| i.get()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_components", e))?
            .into_iter()
            .map(Component::try_from)
            .collect()
    }

    #[instrument(skip(self, new), fields(numero_serie = %new.serial_number), err)]
    async fn insert_component(
        &mut self,
        new: &NewComponent,
        created_at: DateTime<Utc>,
    ) -> Result<Component, StoreError> {
        let sql = format!(
            "INSERT INTO componentes (nombre, numero_serie, estado, ubicacion_id, \
                 responsable_mantenimiento, item_id, fecha_instalacion, vida_util_meses, fecha_creacion) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COMPONENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(new.name.trim())
            .bind(new.serial_number.trim())
            .bind(new.status.as_str())
            .bind(new.location_id.map(|l| l.get()))
            .bind(new.maintainer_id.map(|u| u.get()))
            .bind(new.item_id.map(|i| i.get()))
            .bind(new.installed_on)
            .bind(new.service_life_months)
            .bind(created_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_component", e))?;
        Component::try_from(row)
    }

    #[instrument(skip(self, component), fields(component_id = %component.id), err)]
    async fn save_component(&mut self, component: &Component) -> Result<Component, StoreError> {
        let sql = format!(
            "UPDATE componentes SET nombre = $2, numero_serie = $3, estado = $4, ubicacion_id = $5, \
                 responsable_mantenimiento = $6, item_id = $7, fecha_instalacion = $8, \
                 fecha_ultima_revision = $9, vida_util_meses = $10 \
             WHERE id = $1 AND estado <> 'baja' \
             RETURNING {COMPONENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(component.id.get())
            .bind(&component.name)
            .bind(&component.serial_number)
            .bind(component.status.as_str())
            .bind(component.location_id.map(|l| l.get()))
            .bind(component.maintainer_id.map(|u| u.get()))
            .bind(component.item_id.map(|i| i.get()))
            .bind(component.installed_on)
            .bind(component.last_reviewed_on)
            .bind(component.service_life_months)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_component", e))?
            .ok_or_else(|| {
                StoreError::Missing(format!("component {} (or it is already baja)", component.id))
            })?;
        Component::try_from(row)
    }

    #[instrument(skip(self), fields(component_id = %id), err)]
    async fn mark_decommissioned(&mut self, id: ComponentId, on: NaiveDate) -> Result<Component, StoreError> {
        let sql = format!(
            "UPDATE componentes SET estado = 'baja', fecha_ultima_revision = $2 \
             WHERE id = $1 AND estado <> 'baja' \
             RETURNING {COMPONENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(id.get())
            .bind(on)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_status", e))?
            .ok_or_else(|| StoreError::Conflict(format!("component {id} is already baja")))?;
        Component::try_from(row)
    }

    #[instrument(skip(self, rule), fields(target_id = %target), err)]
    async fn lock_spare(
        &mut self,
        target: ComponentId,
        rule: &SpareMatch,
    ) -> Result<Option<Component>, StoreError> {
        let row = match rule {
            SpareMatch::Item(item) => {
                let sql = format!(
                    "SELECT {COMPONENT_COLUMNS} FROM componentes \
                     WHERE estado = 'operativo' AND id <> $1 AND item_id = $2 \
                     ORDER BY fecha_creacion ASC, id ASC \
                     LIMIT 1 FOR UPDATE SKIP LOCKED"
                );
                sqlx::query_as::<_, ComponentRow>(&sql)
                    .bind(target.get())
                    .bind(item.get())
                    .fetch_optional(&mut *self.tx)
                    .await
            }
            SpareMatch::Name(name) => {
                let sql = format!(
                    "SELECT {COMPONENT_COLUMNS} FROM componentes \
                     WHERE estado = 'operativo' AND id <> $1 AND nombre = $2 \
                     ORDER BY fecha_creacion ASC, id ASC \
                     LIMIT 1 FOR UPDATE SKIP LOCKED"
                );
                sqlx::query_as::<_, ComponentRow>(&sql)
                    .bind(target.get())
                    .bind(name)
                    .fetch_optional(&mut *self.tx)
                    .await
            }
        }
        .map_err(|e| map_sqlx_error("select_candidate_spare", e))?;

        row.map(Component::try_from).transpose()
    }

    #[instrument(skip(self, promotion), fields(spare_id = %spare), err)]
    async fn promote_spare(
        &mut self,
        spare: ComponentId,
        promotion: &Promotion,
    ) -> Result<Component, StoreError> {
        let sql = format!(
            "UPDATE componentes SET ubicacion_id = $2, responsable_mantenimiento = $3, \
                 fecha_instalacion = $4, fecha_ultima_revision = $4, estado = 'progreso' \
             WHERE id = $1 AND estado = 'operativo' \
             RETURNING {COMPONENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(spare.get())
            .bind(promotion.location_id.map(|l| l.get()))
            .bind(promotion.maintainer_id.map(|u| u.get()))
            .bind(promotion.installed_on)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_promote_spare", e))?
            .ok_or_else(|| StoreError::Conflict(format!("spare {spare} is no longer operativo")))?;
        Component::try_from(row)
    }

    #[instrument(skip(self, note), fields(component_id = %component), err)]
    async fn cancel_open_maintenance(
        &mut self,
        component: ComponentId,
        note: &str,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE mantenimientos
            SET estado = 'cancelado',
                comentarios = CASE
                    WHEN comentarios IS NULL OR comentarios = '' THEN $2
                    ELSE comentarios || E'\n' || $2
                END
            WHERE componente_id = $1 AND estado IN ('pendiente', 'progreso')
            "#,
        )
        .bind(component.get())
        .bind(note)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("bulk_cancel_maintenance", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, new), fields(component_id = ?new.component_id), err)]
    async fn insert_maintenance(&mut self, new: &NewMaintenance) -> Result<MaintenanceRecord, StoreError> {
        let sql = format!(
            "INSERT INTO mantenimientos (nombre, descripcion, frecuencia, fecha_programada, estado, \
                 componente_id, operario_id, ubicacion_id, comentarios) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {MAINTENANCE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MaintenanceRow>(&sql)
            .bind(new.name.trim())
            .bind(new.description.as_deref())
            .bind(new.frequency.as_str())
            .bind(new.scheduled_for)
            .bind(new.status.as_str())
            .bind(new.component_id.map(|c| c.get()))
            .bind(new.operator_id.map(|u| u.get()))
            .bind(new.location_id.map(|l| l.get()))
            .bind(new.comments.as_deref())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_maintenance", e))?;
        MaintenanceRecord::try_from(row)
    }

    #[instrument(skip(self), fields(maintenance_id = %id), err)]
    async fn lock_maintenance(&mut self, id: MaintenanceId) -> Result<Option<MaintenanceRecord>, StoreError> {
        let sql = format!("SELECT {MAINTENANCE_COLUMNS} FROM mantenimientos WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, MaintenanceRow>(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_maintenance", e))?
            .map(MaintenanceRecord::try_from)
            .transpose()
    }

    #[instrument(skip(self, record), fields(maintenance_id = %record.id), err)]
    async fn save_maintenance(&mut self, record: &MaintenanceRecord) -> Result<MaintenanceRecord, StoreError> {
        let sql = format!(
            "UPDATE mantenimientos SET estado = $2, comentarios = $3 \
             WHERE id = $1 \
             RETURNING {MAINTENANCE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MaintenanceRow>(&sql)
            .bind(record.id.get())
            .bind(record.status.as_str())
            .bind(record.comments.as_deref())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_maintenance", e))?
            .ok_or_else(|| StoreError::Missing(format!("maintenance {}", record.id)))?;
        MaintenanceRecord::try_from(row)
    }

    #[instrument(skip(self), fields(component_id = %component), err)]
    async fn list_maintenance(&mut self, component: ComponentId) -> Result<Vec<MaintenanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {MAINTENANCE_COLUMNS} FROM mantenimientos \
             WHERE componente_id = $1 \
             ORDER BY fecha_programada ASC, id ASC"
        );
        sqlx::query_as::<_, MaintenanceRow>(&sql)
            .bind(component.get())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_maintenance", e))?
            .into_iter()
            .map(MaintenanceRecord::try_from)
            .collect()
    }

    #[instrument(skip(self), fields(item_id = %item), err)]
    async fn inventory_line(&mut self, item: ItemId) -> Result<Option<InventoryLine>, StoreError> {
        let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventario WHERE item_id = $1");
        let row = sqlx::query_as::<_, InventoryRow>(&sql)
            .bind(item.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("select_inventory", e))?;
        Ok(row.map(InventoryLine::from))
    }

    #[instrument(skip(self), fields(item_id = %item), err)]
    async fn lock_inventory_line(&mut self, item: ItemId) -> Result<Option<InventoryLine>, StoreError> {
        let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventario WHERE item_id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, InventoryRow>(&sql)
            .bind(item.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_inventory", e))?;
        Ok(row.map(InventoryLine::from))
    }

    #[instrument(skip(self, line), fields(item_id = %line.item_id), err)]
    async fn upsert_inventory_line(&mut self, line: &InventoryLine) -> Result<InventoryLine, StoreError> {
        let sql = format!(
            "INSERT INTO inventario (item_id, cantidad, costo_unitario, ubicacion_actual, fecha_actualizacion) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (item_id) DO UPDATE SET \
                 cantidad = EXCLUDED.cantidad, \
                 costo_unitario = EXCLUDED.costo_unitario, \
                 ubicacion_actual = EXCLUDED.ubicacion_actual, \
                 fecha_actualizacion = EXCLUDED.fecha_actualizacion \
             RETURNING {INVENTORY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, InventoryRow>(&sql)
            .bind(line.item_id.get())
            .bind(line.quantity)
            .bind(line.unit_cost)
            .bind(line.current_location.as_deref())
            .bind(line.updated_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_inventory", e))?;
        Ok(row.into())
    }

    #[instrument(skip(self), err)]
    async fn list_inventory(&mut self) -> Result<Vec<InventoryLine>, StoreError> {
        let sql = format!("SELECT {INVENTORY_COLUMNS} FROM inventario ORDER BY item_id ASC");
        let rows = sqlx::query_as::<_, InventoryRow>(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_inventory", e))?;
        Ok(rows.into_iter().map(InventoryLine::from).collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Database(format!("timed out acquiring a connection in {}", operation))
        }
        other => StoreError::Database(format!("{} failed: {}", operation, other)),
    }
}

fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Database(format!("unexpected value '{value}' in column {column}"))
}

// SQLx row types

#[derive(Debug, FromRow)]
struct ComponentRow {
    id: i64,
    nombre: String,
    numero_serie: String,
    estado: String,
    ubicacion_id: Option<i64>,
    responsable_mantenimiento: Option<i64>,
    item_id: Option<i64>,
    fecha_instalacion: Option<NaiveDate>,
    fecha_ultima_revision: Option<NaiveDate>,
    vida_util_meses: Option<i32>,
    fecha_creacion: DateTime<Utc>,
}

impl TryFrom<ComponentRow> for Component {
    type Error = StoreError;

    fn try_from(row: ComponentRow) -> Result<Self, Self::Error> {
        let status: ComponentStatus = row.estado.parse().map_err(|_| corrupt("estado", &row.estado))?;
        Ok(Component {
            id: ComponentId::new(row.id),
            name: row.nombre,
            serial_number: row.numero_serie,
            status,
            location_id: row.ubicacion_id.map(LocationId::new),
            maintainer_id: row.responsable_mantenimiento.map(UserId::new),
            item_id: row.item_id.map(ItemId::new),
            installed_on: row.fecha_instalacion,
            last_reviewed_on: row.fecha_ultima_revision,
            service_life_months: row.vida_util_meses,
            created_at: row.fecha_creacion,
        })
    }
}

#[derive(Debug, FromRow)]
struct MaintenanceRow {
    id: i64,
    nombre: String,
    descripcion: Option<String>,
    frecuencia: String,
    fecha_programada: NaiveDate,
    estado: String,
    componente_id: Option<i64>,
    operario_id: Option<i64>,
    ubicacion_id: Option<i64>,
    comentarios: Option<String>,
}

impl TryFrom<MaintenanceRow> for MaintenanceRecord {
    type Error = StoreError;

    fn try_from(row: MaintenanceRow) -> Result<Self, Self::Error> {
        let status: MaintenanceStatus = row.estado.parse().map_err(|_| corrupt("estado", &row.estado))?;
        let frequency: Frequency = row
            .frecuencia
            .parse()
            .map_err(|_| corrupt("frecuencia", &row.frecuencia))?;
        Ok(MaintenanceRecord {
            id: MaintenanceId::new(row.id),
            name: row.nombre,
            description: row.descripcion,
            frequency,
            scheduled_for: row.fecha_programada,
            status,
            component_id: row.componente_id.map(ComponentId::new),
            operator_id: row.operario_id.map(UserId::new),
            location_id: row.ubicacion_id.map(LocationId::new),
            comments: row.comentarios,
        })
    }
}

#[derive(Debug, FromRow)]
struct InventoryRow {
    item_id: i64,
    cantidad: i32,
    costo_unitario: Decimal,
    ubicacion_actual: Option<String>,
    fecha_actualizacion: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryLine {
    fn from(row: InventoryRow) -> Self {
        InventoryLine {
            item_id: ItemId::new(row.item_id),
            quantity: row.cantidad,
            unit_cost: row.costo_unitario,
            current_location: row.ubicacion_actual,
            updated_at: row.fecha_actualizacion,
        }
    }
}
