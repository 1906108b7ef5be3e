use aegis_server::{AppConfig, bootstrap, init_tracing, run};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);

    let state = match bootstrap::build_state(config).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "Startup failed");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(state).await {
        tracing::error!(error = %err, "Server error");
    }
}
