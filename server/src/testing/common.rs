use chrono::Utc;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::env;

use crate::{connectors::calendar::DiscoveredMeeting, HttpClient};

use entity::meeting::Attendee;

pub async fn setup() -> (DatabaseConnection, HttpClient) {
    dotenvy::dotenv().ok();
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL is not set in .env file");
    let mut db_options = ConnectOptions::new(db_url);
    db_options.sqlx_logging(false);

    let conn = Database::connect(db_options)
        .await
        .expect("Database connection failed");

    let http_client = reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .build()
        .unwrap();

    (conn, http_client)
}

pub fn discovered_meeting_fixture(calendar_event_id: &str) -> DiscoveredMeeting {
    let start = Utc::now().fixed_offset() - chrono::Duration::hours(3);
    DiscoveredMeeting {
        calendar_event_id: calendar_event_id.to_string(),
        title: "Sprint Planning".to_string(),
        description: "Weekly planning session".to_string(),
        start_time: start,
        end_time: start + chrono::Duration::hours(1),
        attendees: vec![Attendee {
            email: Some("sam@example.com".to_string()),
            name: Some("Sam".to_string()),
            response_status: Some("accepted".to_string()),
        }],
        video_link: "https://meet.google.com/abc-defg-hij".to_string(),
    }
}
