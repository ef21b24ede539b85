use crate::config::CorsConfig;
use actix_cors::Cors;

/// Build the CORS layer from configuration.
///
/// Any method, any header, credentials allowed. A `"*"` entry reflects the
/// request origin instead of sending a literal wildcard, since browsers refuse
/// `Access-Control-Allow-Origin: *` on credentialed requests.
pub fn build_cors(config: &CorsConfig) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(config.max_age_secs);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        cors.allow_any_origin()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
    }
}
