use std::{sync::Arc, time::Duration};

use booking_calendar::{
    configuration::Configuration, configuration_handler::ConfigurationHandler,
    database_interface::DatabaseInterface, http::create_app,
    local_reservations::LocalReservations, notifier::Notifications,
};
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("####################");
    println!("# Booking Calendar #");
    println!("####################");

    let configuration = ConfigurationHandler::parse_arguments();
    let notifications = Notifications::from_url(configuration.notify_url());

    let address = format!("0.0.0.0:{}", configuration.port());
    let listener = tokio::net::TcpListener::bind(&address).await.unwrap();
    info!("Accessible at {address}");

    let app = if let Some(database_url) = configuration.database_url() {
        let backend = loop {
            match DatabaseInterface::new(&database_url) {
                Ok(backend) => {
                    info!("Successfully connected to database");
                    break backend;
                }
                Err(err) => {
                    error!(?err, "Failed to establish database connection. Retry in 1 sec. Restart without DATABASE_URL to keep bookings in memory.");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        };
        create_app(Arc::new(backend), configuration, notifications)
    } else {
        warn!("No database configured, bookings are lost on restart");
        create_app(
            Arc::new(LocalReservations::default()),
            configuration,
            notifications,
        )
    };

    axum::serve(listener, app).await.unwrap();
}
