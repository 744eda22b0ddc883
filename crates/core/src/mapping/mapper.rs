//! Record mapper
//!
//! Pure projection of a [`PendingRecord`] onto the partner's
//! [`DispatchPayload`]. Mapping never fails: missing or malformed columns fall
//! back to the partner's defaults (`0` for numbers, `""` for text).

use chrono::{DateTime, Utc};
use trackrelay_domain::constants::{COORDINATE_DECIMALS, DEFAULT_HOURMETER, FIX_TIME_FORMAT};
use trackrelay_domain::{
    DispatchPayload, EventPayload, Numeric, PendingRecord, RawScalar, ZoneSetting,
};

use super::events::describe_event;

/// Per-deployment inputs to the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingContext {
    /// Partner-issued client id, repeated at the top level and in the event.
    pub client_id: i64,
    /// Zone used to render `fecha`.
    pub timezone: ZoneSetting,
}

/// Stateless mapper bound to one [`MappingContext`].
#[derive(Debug, Clone, Copy)]
pub struct RecordMapper {
    ctx: MappingContext,
}

impl RecordMapper {
    /// Bind the mapper to a partner client id and report zone.
    pub fn new(ctx: MappingContext) -> Self {
        Self { ctx }
    }

    /// Context every payload is mapped with.
    pub fn context(&self) -> &MappingContext {
        &self.ctx
    }

    /// Map `record`, using `now` when the fix has no timestamp.
    pub fn map(&self, record: &PendingRecord, now: DateTime<Utc>) -> DispatchPayload {
        map_to_payload(record, &self.ctx, now)
    }
}

/// Build the partner payload for one record.
pub fn map_to_payload(
    record: &PendingRecord,
    ctx: &MappingContext,
    now: DateTime<Utc>,
) -> DispatchPayload {
    let extras = &record.extras;
    let [input1, input2, input3, input4] = &extras.inputs;

    DispatchPayload {
        timestamp: ctx.timezone.format(record.fix_time.unwrap_or(now), FIX_TIME_FORMAT),
        imei: imei_for(record),
        plate: record.plate.clone().unwrap_or_default(),
        latitude: coordinate(record.latitude.as_ref()),
        longitude: coordinate(record.longitude.as_ref()),
        heading: numeric(record.heading.as_ref()),
        altitude: numeric(record.altitude.as_ref()),
        speed: numeric(record.speed_kmh.as_ref()),
        engine_on: u8::from(record.ignition.as_ref().is_some_and(RawScalar::is_truthy)),
        client_id: ctx.client_id,
        virtual_odometer: numeric(extras.virtual_odometer.as_ref()),
        virtual_hourmeter: non_empty(extras.virtual_hourmeter.as_deref())
            .unwrap_or(DEFAULT_HOURMETER)
            .to_string(),
        battery_level: numeric(extras.battery_level.as_ref()),
        external_voltage: numeric(extras.external_voltage.as_ref()),
        input1: numeric(input1.as_ref()),
        input2: numeric(input2.as_ref()),
        input3: numeric(input3.as_ref()),
        input4: numeric(input4.as_ref()),
        hdop: numeric(extras.hdop.as_ref()),
        satellites: numeric(extras.satellites.as_ref()),
        device_state: numeric(extras.device_state.as_ref()),
        ibutton: extras.ibutton.clone().unwrap_or_default(),
        temp1: numeric(record.temp1.as_ref()),
        temp2: numeric(record.temp2.as_ref()),
        temp3: numeric(record.temp3.as_ref()),
        event: event_for(record, ctx.client_id),
    }
}

fn event_for(record: &PendingRecord, client_id: i64) -> EventPayload {
    // The event value takes precedence over the raw event column.
    let code = record
        .event_value
        .as_ref()
        .or(record.event.as_ref())
        .map_or(Numeric::ZERO, |raw| raw.to_number().map_or(Numeric::ZERO, Numeric::new));

    EventPayload {
        client_id,
        code,
        description: describe_event(record.event_description.as_deref(), code.value()),
    }
}

fn imei_for(record: &PendingRecord) -> String {
    match non_empty(record.imei.as_deref()) {
        Some(imei) => imei.to_string(),
        None => record.device_id.as_ref().map(RawScalar::to_text).unwrap_or_default(),
    }
}

fn numeric(raw: Option<&RawScalar>) -> Numeric {
    raw.and_then(RawScalar::to_number).map_or(Numeric::ZERO, Numeric::new)
}

fn coordinate(raw: Option<&RawScalar>) -> String {
    format!("{:.*}", COORDINATE_DECIMALS, numeric(raw).value())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
