mod config;
mod detection;
mod error;
mod routes;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use config::{DetectorConfig, classifier_token};
use detection::DetectionService;
use routes::{configure_routes, cors_headers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match DetectorConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::other(format!(
                "Configuration loading failed: {}",
                e
            )));
        }
    };

    // The credential is read exactly once; without it every detection is a 503.
    let service = web::Data::new(DetectionService::new(&config, classifier_token()));
    if service.is_available() {
        log::info!("Classifier configured with model {}", service.model());
    }

    let max_image_bytes = config.fetch.max_image_bytes;
    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(cors_headers())
            .wrap(Logger::default())
            .app_data(service.clone())
            .configure(|cfg| configure_routes(cfg, max_image_bytes))
    })
    .bind(&bind_address)?
    .run()
    .await
}
