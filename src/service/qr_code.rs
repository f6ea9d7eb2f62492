use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{AttendanceError, AttendanceResult};
use crate::model::qr_code::{Coordinates, NewQrCode, QrCode, RefreshPeriod};
use crate::service::clock::Clock;
use crate::store::AttendanceStore;
use crate::utils::qr_cache::QrCodeCache;
use crate::utils::retry::RetryPolicy;

pub const MIN_RADIUS_METERS: u32 = 10;
pub const MAX_RADIUS_METERS: u32 = 5_000;

#[derive(Debug, Clone)]
pub struct GenerateQrCode {
    pub clinic_id: u64,
    pub anchor: Option<Coordinates>,
    pub radius_meters: u32,
    pub refresh_period: RefreshPeriod,
    pub force_regenerate: bool,
}

/// Owns the per-clinic QR code lifecycle.
pub struct QrCodeManager {
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    cache: QrCodeCache,
    retry: RetryPolicy,
}

impl QrCodeManager {
    pub fn new(store: Arc<dyn AttendanceStore>, clock: Arc<dyn Clock>, cache: QrCodeCache, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            cache,
            retry,
        }
    }

    /// Returns the clinic's live code, or issues a new one.
    ///
    /// A live code is returned unchanged unless `force_regenerate` is set; a new
    /// code supersedes the previous one in a single store write.
    #[instrument(
        name = "qr_generate",
        skip(self, req),
        fields(clinic_id = req.clinic_id, force = req.force_regenerate)
    )]
    pub async fn generate(&self, req: GenerateQrCode) -> AttendanceResult<QrCode> {
        validate_request(&req)?;

        let today = self.clock.today();
        let store = self.store.as_ref();
        let clinic_id = req.clinic_id;

        if !req.force_regenerate {
            let current = self
                .retry
                .run("find_active_qr_code", move || store.find_active_qr_code(clinic_id))
                .await?;
            if let Some(code) = current.filter(|c| c.covers(today)) {
                info!(qr_code_id = code.id, "Reusing active QR code");
                self.cache.put(code.clone()).await;
                return Ok(code);
            }
        }

        let new_code = NewQrCode {
            clinic_id,
            code: Uuid::new_v4().to_string(),
            anchor: req.anchor,
            radius_meters: req.radius_meters,
            refresh_period: req.refresh_period,
            valid_date: today,
            valid_until: req.refresh_period.valid_until(today),
            created_at: self.clock.now(),
        };

        let created = self
            .retry
            .run("replace_active_qr_code", move || {
                store.replace_active_qr_code(new_code.clone())
            })
            .await?;

        if created.anchor.is_none() {
            warn!(qr_code_id = created.id, "QR code has no anchor, geofencing disabled");
        }
        info!(
            qr_code_id = created.id,
            valid_until = %created.valid_until,
            "QR code issued"
        );

        self.cache.put(created.clone()).await;
        Ok(created)
    }

    /// The code to display today; `None` lets callers offer generation.
    pub async fn active_code_for_today(&self, clinic_id: u64) -> AttendanceResult<Option<QrCode>> {
        let today = self.clock.today();

        if let Some(cached) = self.cache.get(clinic_id).await {
            if cached.covers(today) {
                return Ok(Some(cached));
            }
            self.cache.invalidate(clinic_id).await;
        }

        let store = self.store.as_ref();
        let current = self
            .retry
            .run("find_active_qr_code", move || store.find_active_qr_code(clinic_id))
            .await?
            .filter(|c| c.covers(today));

        if let Some(code) = &current {
            self.cache.put(code.clone()).await;
        }
        Ok(current)
    }

    /// Checks a scanned token against the store, bypassing the cache.
    pub async fn validate_scan(&self, clinic_id: u64, token: &str, work_date: NaiveDate) -> AttendanceResult<QrCode> {
        let today = self.clock.today();
        let store = self.store.as_ref();
        let current = self
            .retry
            .run("find_active_qr_code", move || store.find_active_qr_code(clinic_id))
            .await?;

        match current {
            Some(code) if code.code == token && code.covers(work_date) && code.covers(today) => Ok(code),
            _ => {
                warn!(clinic_id, %work_date, "QR scan rejected");
                Err(AttendanceError::QrCodeExpiredOrMismatch)
            }
        }
    }
}

fn validate_request(req: &GenerateQrCode) -> AttendanceResult<()> {
    if req.clinic_id == 0 {
        return Err(AttendanceError::validation("clinic_id is required"));
    }
    if !(MIN_RADIUS_METERS..=MAX_RADIUS_METERS).contains(&req.radius_meters) {
        return Err(AttendanceError::validation(format!(
            "radius_meters must be between {MIN_RADIUS_METERS} and {MAX_RADIUS_METERS}"
        )));
    }
    if let Some(anchor) = req.anchor {
        if !anchor.is_valid() {
            return Err(AttendanceError::validation("anchor coordinates are out of range"));
        }
    }
    Ok(())
}
