use crate::{
    api::{self, attendance, qr_code, schedule, statistics},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::anyhow;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct RateLimiters {
    scan: Limiter,
    protected: Limiter,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            scan: Arc::new(build_limiter(config.rate_scan_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

fn build_limiter(requests_per_min: u32) -> anyhow::Result<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.clamp(1, 60_000);
    let per_ms = 60_000 / requests_per_min as u64;
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min}/min"))?;
    Ok(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str, limiters: RateLimiters) {
    api::extractor_config(cfg);

    // Protected routes
    cfg.service(
        web::scope(api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected) // rate limiting
            .service(
                web::scope("/qr-codes")
                    // /qr-codes
                    .service(web::resource("").route(web::post().to(qr_code::generate)))
                    // /qr-codes/today
                    .service(web::resource("/today").route(web::get().to(qr_code::today))),
            )
            .service(
                web::scope("/attendance")
                    // scans get their own, tighter limit
                    .service(
                        web::resource("/check-in")
                            .wrap(limiters.scan.clone())
                            .route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out")
                            .wrap(limiters.scan)
                            .route(web::post().to(attendance::check_out)),
                    )
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(web::resource("/records").route(web::get().to(attendance::records)))
                    .service(
                        web::resource("/day-status").route(web::put().to(attendance::day_status)),
                    )
                    .service(
                        web::resource("/statistics")
                            .route(web::get().to(statistics::get_statistics)),
                    )
                    .service(
                        web::resource("/statistics/recompute")
                            .route(web::post().to(statistics::recompute)),
                    ),
            )
            .service(
                web::scope("/schedules")
                    // /schedules
                    .service(web::resource("").route(web::put().to(schedule::set_schedule)))
                    // /schedules/{user_id}
                    .service(
                        web::resource("/{user_id}")
                            .route(web::get().to(schedule::list_schedules)),
                    ),
            ),
    );
}
