use tokio_util::sync::CancellationToken;

mod api;
mod config;
mod handler;
mod manager;
mod media;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

#[tokio::main]
async fn main() -> ! {
    init_logging();
    let config = config::config();

    log::info!("framerate: {} fps", config.framerate());
    if !config.station_name().is_empty() {
        log::info!("station: {}", config.station_name());
    }

    let cancel = CancellationToken::new();

    for camera in config.cameras() {
        manager::register_source(camera.clone(), cancel.child_token()).await;
        log::info!("registered source {} (topic {})", camera.name, camera.topic);
    }

    let cancel_clone = cancel.clone();
    api::start_api_server(cancel_clone);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
            },
        }
    }

    std::process::exit(0);
}
