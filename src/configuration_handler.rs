use crate::configuration::Configuration;
use clap::Parser;
use std::path::PathBuf;

/// Booking calendar backend for the roofing website.
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct ConfigurationHandler {
    /// Title shown on the booking page
    #[arg(long, env = "WEBSITE_TITLE", default_value = "Book a Roof Inspection")]
    website_title: String,

    /// Password guarding the admin listings
    #[arg(long, env = "ADMIN_PASSWORD")]
    password: String,

    /// HTML file served at /frontend
    #[arg(long, env = "FRONTEND_PATH", default_value = "../frontend/index.html")]
    frontend_path: PathBuf,

    /// PostgreSQL connection. Bookings are kept in memory when omitted
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "PORT", default_value = "3000")]
    port: String,

    /// Receives a JSON `{table, record}` for every new booking and enquiry
    #[arg(long, env = "NOTIFY_WEBHOOK_URL")]
    notify_url: Option<String>,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn website_title(&self) -> String {
        self.website_title.clone()
    }

    fn password(&self) -> String {
        self.password.clone()
    }

    fn frontend_path(&self) -> PathBuf {
        self.frontend_path.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn port(&self) -> String {
        self.port.clone()
    }

    fn notify_url(&self) -> Option<String> {
        self.notify_url.clone()
    }
}
