use kz_rich_presence::{logging, settings};

#[tokio::main]
async fn main() {
    // Settings come first: they decide where and how much we log
    let loaded = settings::get_settings_path()
        .and_then(|path| settings::load_settings(&path).map(|s| (path, s)));
    let (settings_path, app_settings) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let guard = logging::init_logging(&app_settings.logging);

    if let Err(e) = kz_rich_presence::run(&settings_path, app_settings).await {
        tracing::error!("{}", e);
        drop(guard);
        std::process::exit(1);
    }
}
