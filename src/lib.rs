#[macro_use]
extern crate rocket;

pub mod error;
pub mod import;
pub mod models;
pub mod request_logger;
pub mod routes;
pub mod users;

use crate::import::{ImportConfig, ImportService};
use crate::request_logger::RequestLogger;
use crate::routes::imports::ImportState;
use crate::users::UserDirectory;
use env_logger::Env;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Every API route, mounted under `/api/v1`.
pub fn api_routes() -> Vec<rocket::Route> {
    routes![
        routes::health::health_check,
        routes::imports::import_users,
        routes::imports::import_template,
        routes::imports::import_capabilities,
    ]
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let import_config = ImportConfig::from_env();
    log::info!(
        "import defaults: workers={}, batch_size={}, max_records={}, timeout={:?}, skip_duplicates={}",
        import_config.worker_count,
        import_config.batch_size,
        import_config.max_records,
        import_config.timeout,
        import_config.skip_duplicates
    );

    let directory = UserDirectory::new().expect("Failed to initialize password hashing");
    let import_state = ImportState::new(ImportService::new(Arc::new(directory)), import_config);

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(cors)
        .manage(import_state)
        .mount("/api/v1", api_routes())
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use crate::import::{EntityCreator, ImportConfig, ImportService};
    use crate::routes::imports::ImportState;
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use std::sync::Arc;

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        import_state: Option<ImportState>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                import_state: None,
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        /// Manage an import service backed by `creator`.
        pub fn manage_importer(mut self, creator: Arc<dyn EntityCreator>, config: ImportConfig) -> Self {
            self.import_state = Some(ImportState::new(ImportService::new(creator), config));
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(state) = self.import_state {
                rocket = rocket.manage(state);
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
