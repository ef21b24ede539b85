pub mod convert;

pub use convert::convert;

use crate::health;
use actix_web::web;

/// Register every route. Shared by `main` and the handler tests so both run
/// the exact same routing table.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/convert", web::post().to(convert))
        .route("/health", web::get().to(health::health_check))
        .route("/metrics", web::get().to(health::detailed_metrics));
}
