use log::info;
use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};

use hatrest::{AppConfig, AppState, Board, RuntimeScheduler};

#[cfg(feature = "hardware-gpio")]
use hatrest::{AutomationHat, LibgpiodBackend};
#[cfg(not(feature = "hardware-gpio"))]
use hatrest::{MockGpioBackend, MockHat};

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_file(&path).map_err(io::Error::other)?,
        None => AppConfig::default(),
    };

    let (hat, gpio) = {
        #[cfg(feature = "hardware-gpio")]
        {
            let gpio =
                Arc::new(LibgpiodBackend::new(config.gpio.chip.clone()).map_err(io::Error::other)?);
            let hat = Arc::new(
                AutomationHat::new(Arc::clone(&gpio), &config.hat).map_err(io::Error::other)?,
            );
            (hat, gpio)
        }
        #[cfg(not(feature = "hardware-gpio"))]
        {
            (
                Arc::new(MockHat::default()),
                Arc::new(MockGpioBackend::default()),
            )
        }
    };

    let board = Board::new(&config, hat, gpio, Arc::new(RuntimeScheduler))
        .map_err(io::Error::other)?;
    let app_state = AppState {
        board: Arc::new(board),
    };

    let scope_path = config.http.path.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .service(app_state.api_scope(&scope_path))
    })
    .disable_signals()
    .bind_auto_h2c(&config.http.host)?
    .run();

    info!(
        "Starting server on {}{}...",
        config.http.host, config.http.path
    );

    let handle = server.handle();
    actix_web::rt::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Keyboard interrupted the server");
            handle.stop(true).await;
        }
    });

    server.await?;
    info!("Server exited");
    Ok(())
}
