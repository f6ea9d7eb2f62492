use std::sync::Arc;

use actix_web::web::{self, Data};

use crate::config::Config;
use crate::service::attendance::AttendanceService;
use crate::service::clock::Clock;
use crate::service::qr_code::QrCodeManager;
use crate::service::schedule::ScheduleService;
use crate::service::statistics::StatisticsAggregator;
use crate::store::AttendanceStore;
use crate::utils::qr_cache::QrCodeCache;

pub mod attendance;
pub mod clock;
pub mod geofence;
pub mod membership;
pub mod qr_code;
pub mod schedule;
pub mod statistics;

/// Everything the handlers need, built once and shared by all workers.
#[derive(Clone)]
pub struct Services {
    pub attendance: Arc<AttendanceService>,
    pub qr_codes: Arc<QrCodeManager>,
    pub schedules: Arc<ScheduleService>,
    pub statistics: Arc<StatisticsAggregator>,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    pub fn new(store: Arc<dyn AttendanceStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let retry = config.retry_policy();
        let qr_codes = Arc::new(QrCodeManager::new(
            store.clone(),
            clock.clone(),
            QrCodeCache::new(config.qr_cache_ttl()),
            retry,
        ));

        Self {
            attendance: Arc::new(AttendanceService::new(
                store.clone(),
                clock.clone(),
                qr_codes.clone(),
                retry,
                config.require_location,
            )),
            qr_codes,
            schedules: Arc::new(ScheduleService::new(store.clone(), retry)),
            statistics: Arc::new(StatisticsAggregator::new(store, clock.clone(), retry)),
            clock,
        }
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(Data::from(self.attendance.clone()))
            .app_data(Data::from(self.qr_codes.clone()))
            .app_data(Data::from(self.schedules.clone()))
            .app_data(Data::from(self.statistics.clone()))
            .app_data(Data::from(self.clock.clone()));
    }
}
