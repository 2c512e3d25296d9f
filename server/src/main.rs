mod auth;
mod connectors;
mod db_core;
mod error;
mod extract;
mod model;
mod pipeline;
mod rate_limiters;
mod request_tracing;
mod routes;
mod server_config;
#[cfg(test)]
mod testing;

use std::{env, net::SocketAddr, time::Duration};

use axum::{extract::FromRef, Router};
use mimalloc::MiMalloc;
use rate_limiters::RateLimiters;
use routes::AppRouter;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::{signal, task::JoinHandle};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    model::processed_email::ProcessedEmailCtrl,
    pipeline::{email_poller::EmailPoller, meeting_poller::MeetingPoller},
    server_config::cfg,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub http_client: HttpClient,
    pub conn: DatabaseConnection,
    pub rate_limiters: RateLimiters,
    pub email_poller: EmailPoller,
    pub meeting_poller: MeetingPoller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL is not set in .env file");
    let mut db_options = ConnectOptions::new(db_url);
    db_options.sqlx_logging(false);

    let conn = Database::connect(db_options)
        .await
        .expect("Database connection failed");

    let http_client = reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .timeout(Duration::from_secs(30))
        .build()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let rate_limiters = RateLimiters::from_env();

    let email_poller = EmailPoller::new(
        conn.clone(),
        http_client.clone(),
        rate_limiters.clone(),
        Duration::from_secs(cfg.poll.email_interval_secs),
    );
    let meeting_poller = MeetingPoller::new(
        conn.clone(),
        http_client.clone(),
        Duration::from_secs(cfg.poll.meeting_interval_secs),
    );

    let state = ServerState {
        http_client,
        conn: conn.clone(),
        rate_limiters,
        email_poller: email_poller.clone(),
        meeting_poller: meeting_poller.clone(),
    };

    let router = AppRouter::create(state.clone());

    email_poller.start();
    meeting_poller.start();

    let mut scheduler = JobScheduler::new()
        .await
        .expect("Failed to create scheduler");

    {
        let conn = conn.clone();
        // Nightly ledger retention sweep
        scheduler
            .add(Job::new_async("0 0 3 * * *", move |uuid, mut l| {
                let conn = conn.clone();
                Box::pin(async move {
                    tracing::info!("Running ledger retention sweep {}", uuid);
                    match ProcessedEmailCtrl::cleanup(&conn, cfg.poll.ledger_retention_days).await {
                        Ok(removed) => {
                            tracing::info!("Retention sweep removed {} ledger rows", removed);
                        }
                        Err(e) => {
                            tracing::error!("Retention sweep failed: {:?}", e);
                        }
                    }

                    let next_tick = l.next_tick_for_job(uuid).await;
                    if let Ok(Some(ts)) = next_tick {
                        tracing::info!("Next retention sweep at {:?}", ts)
                    }
                })
            })?)
            .await?;
    }

    scheduler.set_shutdown_handler(Box::new(move || {
        Box::pin(async move {
            tracing::info!("Shutting down scheduler");
        })
    }));

    println!("Starting scheduler...");
    match scheduler.start().await {
        Ok(_) => {
            println!("-------- SCHEDULER STARTED --------");
        }
        Err(e) => {
            println!("Failed to start scheduler: {:?}", e);
        }
    }

    let server_handle = run_server(router, scheduler, state);
    server_handle.await?;

    Ok(())
}

async fn shutdown_signal(mut scheduler: JobScheduler, state: ServerState) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    state.email_poller.stop().await;
    state.meeting_poller.stop().await;
    scheduler.shutdown().await.ok();
    println!("Cleanups done, shutting down");
}

fn run_server(router: Router, scheduler: JobScheduler, state: ServerState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let port = env::var("PORT").unwrap_or("5006".to_string());
        tracing::info!("Taskclerk server running on http://0.0.0.0:{}", port);
        // check config
        println!("{}", *server_config::cfg);

        let addr = SocketAddr::from(([0, 0, 0, 0], port.parse::<u16>().unwrap()));
        tracing::debug!("listening on {addr}");
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(scheduler, state))
        .await
        .unwrap();
    })
}
