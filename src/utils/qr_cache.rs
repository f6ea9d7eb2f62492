use std::time::Duration;

use moka::future::Cache;

use crate::model::qr_code::QrCode;

/// TTL cache of each clinic's current QR code, owned by whoever builds the
/// `QrCodeManager`. Only used for display lookups; scans always hit the store.
#[derive(Clone)]
pub struct QrCodeCache {
    inner: Cache<u64, QrCode>,
}

impl QrCodeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, clinic_id: u64) -> Option<QrCode> {
        self.inner.get(&clinic_id).await
    }

    pub async fn put(&self, code: QrCode) {
        self.inner.insert(code.clinic_id, code).await;
    }

    pub async fn invalidate(&self, clinic_id: u64) {
        self.inner.invalidate(&clinic_id).await;
    }
}
