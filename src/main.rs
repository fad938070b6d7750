#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use blogsmith::cli;
    use blogsmith::core::config::Config;
    use blogsmith::core::io::{NativeStorage, Storage};
    use blogsmith::core::state::AppState;
    use blogsmith::services::api::{ApiClient, AuthStore, HttpBlogApi};

    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please fix or remove 'config.yml' and try again.");
            return Err(e);
        }
    };
    if !Config::exists() {
        config.save()?;
        println!("Wrote default settings to config.yml");
    }
    config.ensure_directories()?;

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
    let auth = Arc::new(AuthStore::new(storage.clone(), &config.storage_folder));
    auth.restore().await?;

    let client = ApiClient::new(&config.api, auth.clone())?;
    log::info!("Using API at {}", client.base_url());
    let api = Arc::new(HttpBlogApi::new(client));

    let app = AppState::new(config, api, auth);
    cli::run(app, storage).await
}

// The browser build starts from `blogsmith::start`.
#[cfg(target_arch = "wasm32")]
fn main() {}
