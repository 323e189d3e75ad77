use actix_web::{web, App, HttpServer};
use log::{error, info};

use remote_cabinet::app_state::AppState;
use remote_cabinet::config::AppConfig;
use remote_cabinet::logging::init_logging;
use remote_cabinet::service;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Configuration problems are fatal before the server binds anything
    let config = match AppConfig::load_from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    init_logging(&config.logging);

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let data = web::Data::new(state);

    info!("Starting server on {}:{}", config.server.host, config.server.port);
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(data.clone())
            .configure(service::configure)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
