//! Update driver CLI: sweep the fixed mailing-list roster once, then patch
//! the status singleton. Ported from `original_source/src/updater.py`.

use mail_search::config::Config;
use mail_search::orchestrator;
use mail_search::store::Store;

#[tokio::main]
async fn main() {
    mail_search::init_logger();

    let cfg = Config::from_env();
    let store = Store::connect(&cfg).await;
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("reqwest client builds");

    let changed = match orchestrator::run_update_sweep(&cfg, &store, http).await {
        Ok(changed) => changed,
        Err(err) => {
            log::error!("update sweep failed: {err}");
            std::process::exit(1);
        }
    };

    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    if let Err(err) = store.update_status(changed, &now).await {
        log::error!("failed to patch status row: {err}");
        std::process::exit(1);
    }
    log::info!("updated status, changed={changed}, date={now}");
}
