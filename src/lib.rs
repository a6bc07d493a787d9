#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

/// Assemble the server. The database connection is made when the returned
/// instance is ignited.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(Template::fairing())
        .mount("/", api::routes())
}

/// Assemble the server around an existing, already prepared database.
#[cfg(test)]
pub(crate) fn rocket_for_db(client: mongodb::Client, db: mongodb::Database) -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(Template::fairing())
        .mount("/", api::routes())
        .manage(client)
        .manage(db)
}

/// Connect to the database configured for tests.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_config = rocket::Config::figment()
        .extract::<config::DbConfig>()
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_config.db_uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to database: {e}"))
}

/// A fresh database name for one test.
#[cfg(test)]
pub(crate) fn database() -> String {
    config::get_database_name()
}
