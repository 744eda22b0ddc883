//! PostgreSQL implementation of the location store port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::{debug, warn};
use trackrelay_core::LocationStore;
use trackrelay_domain::{
    DeliveryOutcome, DeliveryStatus, PendingRecord, RawScalar, RelayError, ZoneSetting,
    Result as DomainResult, TelemetryExtras,
};

use super::errors::StoreError;
use super::executor::StoreExecutor;
use super::values::{SqlInteger, SqlScalar, SqlTimestamp};
use crate::errors::InfraError;

const PENDING_SELECT_SQL: &str = "SELECT \
        l.location_id, l.device_id, d.plate, l.fix_time, \
        l.latitude, l.longitude, l.altitude, l.heading, l.speed_kmh, l.ignition, \
        l.temp1, l.temp2, l.temp3, l.event, l.event_value, l.event_description, l.imei, \
        l.virtual_odometer, l.virtual_hourmeter, l.battery_level, l.external_voltage, \
        l.input1, l.input2, l.input3, l.input4, \
        l.hdop, l.satellites, l.device_state, l.ibutton, l.delivery_status \
    FROM gps_locations l \
    JOIN device_integrations d ON l.device_id = d.device_id \
    WHERE (l.delivery_status IS NULL OR l.delivery_status = 6) AND d.active = 1 \
    ORDER BY l.fix_time ASC \
    LIMIT $1";

const MARK_DELIVERY_SQL: &str = "UPDATE gps_locations \
    SET delivered_at = NOW(), delivery_status = $1::smallint, delivery_detail = $2::text \
    WHERE location_id = $3::bigint";

/// Location store backed by the `gps_locations` table.
pub struct PostgresLocationStore {
    executor: StoreExecutor,
    timezone: ZoneSetting,
}

impl PostgresLocationStore {
    /// `timezone` is the store zone: it resolves fix times stored without one.
    pub fn new(executor: StoreExecutor, timezone: ZoneSetting) -> Self {
        Self { executor, timezone }
    }

    fn decode(&self, row: &Row) -> Result<PendingRecord, StoreError> {
        let location_id = integer(row, "location_id")?.ok_or(StoreError::Decode {
            column: "location_id",
            message: "missing id".into(),
        })?;

        let status_code = integer(row, "delivery_status")?
            .map(|code| {
                i16::try_from(code).map_err(|_| StoreError::Decode {
                    column: "delivery_status",
                    message: format!("status code {code} out of range"),
                })
            })
            .transpose()?;
        let delivery_status =
            DeliveryStatus::from_code(status_code).ok_or_else(|| StoreError::Decode {
                column: "delivery_status",
                message: format!("unknown status code {status_code:?}"),
            })?;

        let fix_time = row
            .try_get::<_, Option<SqlTimestamp>>("fix_time")
            .map_err(|err| decode_error("fix_time", &err))?
            .map(|stamp| resolve_fix_time(location_id, stamp, &self.timezone));

        Ok(PendingRecord {
            location_id,
            device_id: scalar(row, "device_id")?,
            plate: text(row, "plate")?,
            fix_time,
            latitude: scalar(row, "latitude")?,
            longitude: scalar(row, "longitude")?,
            altitude: scalar(row, "altitude")?,
            heading: scalar(row, "heading")?,
            speed_kmh: scalar(row, "speed_kmh")?,
            ignition: scalar(row, "ignition")?,
            temp1: scalar(row, "temp1")?,
            temp2: scalar(row, "temp2")?,
            temp3: scalar(row, "temp3")?,
            event: scalar(row, "event")?,
            event_value: scalar(row, "event_value")?,
            event_description: text(row, "event_description")?,
            imei: text(row, "imei")?,
            extras: TelemetryExtras {
                virtual_odometer: scalar(row, "virtual_odometer")?,
                virtual_hourmeter: text(row, "virtual_hourmeter")?,
                battery_level: scalar(row, "battery_level")?,
                external_voltage: scalar(row, "external_voltage")?,
                inputs: [
                    scalar(row, "input1")?,
                    scalar(row, "input2")?,
                    scalar(row, "input3")?,
                    scalar(row, "input4")?,
                ],
                hdop: scalar(row, "hdop")?,
                satellites: scalar(row, "satellites")?,
                device_state: scalar(row, "device_state")?,
                ibutton: text(row, "ibutton")?,
            },
            delivery_status,
        })
    }
}

#[async_trait]
impl LocationStore for PostgresLocationStore {
    async fn fetch_pending(&self, limit: u32) -> DomainResult<Vec<PendingRecord>> {
        let limit = i64::from(limit);
        let params: [&(dyn ToSql + Sync); 1] = [&limit];
        let rows = self.executor.query(PENDING_SELECT_SQL, &params).await.map_err(map_store_error)?;

        let records = rows
            .iter()
            .map(|row| self.decode(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_store_error)?;
        debug!(count = records.len(), "Fetched pending records");
        Ok(records)
    }

    async fn mark_delivery(&self, location_id: i64, outcome: &DeliveryOutcome) -> DomainResult<()> {
        let status = outcome.status_code();
        let detail = outcome.detail();
        let params: [&(dyn ToSql + Sync); 3] = [&status, &detail, &location_id];
        let updated =
            self.executor.execute(MARK_DELIVERY_SQL, &params).await.map_err(map_store_error)?;

        if updated == 0 {
            return Err(RelayError::Database(format!("location {location_id} not found")));
        }
        Ok(())
    }
}

/// Resolve a stored fix time; a wall time skipped by a DST jump keeps the
/// offset in force before the jump.
fn resolve_fix_time(location_id: i64, stamp: SqlTimestamp, zone: &ZoneSetting) -> DateTime<Utc> {
    let resolved = stamp.to_utc(zone);
    if stamp.is_skipped_in(zone) {
        warn!(
            location_id,
            %zone,
            fix_time = %resolved,
            "Fix time falls in a daylight-saving gap; using the pre-jump offset"
        );
    }
    resolved
}

fn integer(row: &Row, column: &'static str) -> Result<Option<i64>, StoreError> {
    row.try_get::<_, Option<SqlInteger>>(column)
        .map(|value| value.map(|SqlInteger(inner)| inner))
        .map_err(|err| decode_error(column, &err))
}

fn scalar(row: &Row, column: &'static str) -> Result<Option<RawScalar>, StoreError> {
    row.try_get::<_, Option<SqlScalar>>(column)
        .map(|value| value.map(|SqlScalar(inner)| inner))
        .map_err(|err| decode_error(column, &err))
}

fn text(row: &Row, column: &'static str) -> Result<Option<String>, StoreError> {
    Ok(scalar(row, column)?.map(|value| value.to_text()))
}

fn decode_error(column: &'static str, err: &tokio_postgres::Error) -> StoreError {
    StoreError::Decode { column, message: err.to_string() }
}

fn map_store_error(err: StoreError) -> RelayError {
    InfraError::from(err).into()
}
