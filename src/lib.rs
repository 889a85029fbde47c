#[macro_use]
extern crate rocket;

pub mod archive;
pub mod config;
pub mod error;
pub mod indexer;
pub mod orchestrator;
pub mod request_logger;
pub mod routes;
pub mod store;

use crate::config::Config;
use crate::request_logger::RequestLogger;
use crate::store::Store;
use env_logger::Env;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Shared `env_logger` initializer, `Once`-guarded so the server binary and
/// the seed/update CLI binaries can all call it without double-initializing.
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Build the query-handler service: loads `Config` from the environment,
/// connects one shared `Store`, and mounts the C5 dispatcher at the root.
pub async fn rocket() -> Rocket<Build> {
    init_logger();

    let cfg = Config::from_env();
    let store = Store::connect(&cfg).await;

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(vec![Method::Get].into_iter().map(From::from).collect())
        .allow_credentials(false)
        .to_cors()
        .expect("error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(cors)
        .manage(store)
        .manage(cfg)
        .mount("/", routes::routes())
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::config::{Config, TableNames};
    use crate::store::Store;
    use aws_sdk_dynamodb::Client;
    use aws_sdk_dynamodb::config::{Credentials, Region};
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::{Build, Rocket};

    /// A `Store` pointed at a local DynamoDB-compatible endpoint (e.g.
    /// `dynamodb-local` or a test double listening on `DYNAMODB_ENDPOINT_URL`),
    /// for integration tests that don't want to talk to real AWS.
    pub async fn local_store(tables: TableNames) -> Store {
        let endpoint = std::env::var("DYNAMODB_ENDPOINT_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-west-1"))
            .credentials_provider(Credentials::for_tests())
            .endpoint_url(endpoint)
            .load()
            .await;
        Store::from_client(Client::new(&sdk_config), tables, 2)
    }

    /// Builder for constructing Rocket instances tailored for integration
    /// tests: random port, logging disabled, a caller-supplied `Store`.
    pub struct TestRocketBuilder {
        figment: Figment,
        cfg: Config,
    }

    impl TestRocketBuilder {
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));
            Self { figment, cfg: Config::from_env() }
        }

        pub fn build(self, store: Store) -> Rocket<Build> {
            rocket::custom(self.figment)
                .manage(store)
                .manage(self.cfg)
                .mount("/", crate::routes::routes())
        }

        pub async fn async_client(self, store: Store) -> AsyncClient {
            AsyncClient::tracked(self.build(store)).await.expect("valid Rocket instance")
        }
    }

    impl Default for TestRocketBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
