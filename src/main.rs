use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use pyc_server::config;
use pyc_server::logger;
use pyc_server::server;

/// Config file used when no path is given (extension optional)
const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Worker threads default to the number of CPU cores
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr)?;

    let state = Arc::new(config::AppState::new(&cfg));
    let active_connections = Arc::new(AtomicUsize::new(0));

    let signals = Arc::new(server::SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals));

    logger::log_server_start(&addr, &cfg);

    let grace = Duration::from_secs(cfg.performance.write_timeout);

    // Connections are served with spawn_local
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            server::start_server_loop(
                listener,
                state,
                Arc::clone(&active_connections),
                Arc::clone(&signals.shutdown),
            )
            .await?;
            server::wait_for_drain(&active_connections, grace).await;
            Ok::<(), Box<dyn std::error::Error>>(())
        })
        .await
}
