//! Seed driver CLI: crawl one mailing list to exhaustion from its stored
//! checkpoint. Ported from `original_source/src/seed.py`; flag defaults
//! follow spec.md §6, not `seed.py`'s argparse defaults (see DESIGN.md).

use clap::Parser;
use mail_search::config::Config;
use mail_search::orchestrator;
use mail_search::store::Store;

#[derive(Debug, Parser)]
#[command(about = "Crawl one mailing list to exhaustion from its stored checkpoint")]
struct Args {
    #[arg(long)]
    list: String,
    #[arg(long, default_value_t = 10)]
    db_workers: usize,
    #[arg(long, default_value_t = 20)]
    mail_workers: usize,
    #[arg(long, default_value_t = 1.5)]
    throttle_sleep: f64,
}

#[tokio::main]
async fn main() {
    mail_search::init_logger();

    let args = Args::parse();
    log::info!("{args:?}");

    let mut cfg = Config::from_env();
    cfg.db_workers = args.db_workers;
    cfg.mail_workers = args.mail_workers;
    cfg.throttle_sleep_secs = args.throttle_sleep;

    let store = Store::connect(&cfg).await;
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("reqwest client builds");

    match orchestrator::run_list(&cfg, &store, http, &args.list).await {
        Ok(changed) => {
            log::info!("seed complete, list={}, changed={changed}", args.list);
        }
        Err(err) => {
            log::error!("seed failed, list={}: {err}", args.list);
            std::process::exit(1);
        }
    }
}
