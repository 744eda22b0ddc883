//! Synchronization service - one polling cycle
//!
//! A cycle fetches one page of eligible records, maps and delivers each in
//! page order, and writes the per-record outcome back. A failed delivery or a
//! failed outcome write never stops the rest of the page; only a failed page
//! fetch aborts the cycle.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use trackrelay_common::{Clock, SystemClock};
use trackrelay_domain::constants::DEFAULT_PAGE_SIZE;
use trackrelay_domain::{DeliveryOutcome, PendingRecord, Result};

use super::ports::{LocationStore, PayloadDispatcher};
use crate::mapping::RecordMapper;

/// Per-cycle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Records returned by the pending query
    pub fetched: usize,
    /// Records accepted by the partner
    pub sent: usize,
    /// Records whose delivery failed
    pub failed: usize,
    /// Outcomes that could not be written back
    pub mark_errors: usize,
}

/// Drives one fetch/map/dispatch/acknowledge cycle
pub struct SyncService {
    store: Arc<dyn LocationStore>,
    dispatcher: Arc<dyn PayloadDispatcher>,
    mapper: RecordMapper,
    clock: Arc<dyn Clock>,
    page_size: u32,
}

impl SyncService {
    /// Create a new sync service using the system clock and default page size
    pub fn new(
        store: Arc<dyn LocationStore>,
        dispatcher: Arc<dyn PayloadDispatcher>,
        mapper: RecordMapper,
    ) -> Self {
        Self {
            store,
            dispatcher,
            mapper,
            clock: Arc::new(SystemClock),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the clock used when a record has no fix time
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the number of records fetched per cycle
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Run one cycle.
    ///
    /// # Errors
    /// Returns the store error when the pending page cannot be fetched.
    /// Per-record failures are recorded in the report instead.
    #[instrument(skip(self), fields(page_size = self.page_size))]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        info!("Sync cycle started");

        let records = self.store.fetch_pending(self.page_size).await?;
        let mut report = CycleReport { fetched: records.len(), ..CycleReport::default() };

        if records.is_empty() {
            debug!("No pending records");
            return Ok(report);
        }

        for record in &records {
            self.process_record(record, &mut report).await;
        }

        info!(
            fetched = report.fetched,
            sent = report.sent,
            failed = report.failed,
            mark_errors = report.mark_errors,
            "Sync cycle finished"
        );
        Ok(report)
    }

    async fn process_record(&self, record: &PendingRecord, report: &mut CycleReport) {
        let payload = self.mapper.map(record, self.clock.now_utc());

        let outcome = match self.dispatcher.dispatch(&payload).await {
            Ok(response) => {
                info!(
                    location_id = record.location_id,
                    plate = record.plate_or_empty(),
                    "Record delivered"
                );
                report.sent += 1;
                DeliveryOutcome::sent(response)
            }
            Err(err) => {
                warn!(
                    location_id = record.location_id,
                    plate = record.plate_or_empty(),
                    error = %err,
                    "Record delivery failed"
                );
                report.failed += 1;
                DeliveryOutcome::failed(&err)
            }
        };

        if let Err(err) = self.store.mark_delivery(record.location_id, &outcome).await {
            error!(
                location_id = record.location_id,
                plate = record.plate_or_empty(),
                status = %outcome.status(),
                error = %err,
                "Failed to record delivery outcome"
            );
            report.mark_errors += 1;
        }
    }
}
