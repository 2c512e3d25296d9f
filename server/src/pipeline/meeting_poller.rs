use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use anyhow::anyhow;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::{
    task::JoinHandle,
    time::{interval, timeout, Duration},
};
use tokio_util::sync::CancellationToken;

use crate::{
    connectors::{calendar::CalendarClient, google},
    db_core::prelude::*,
    error::AppResult,
    model::{meeting::MeetingCtrl, user::UserCtrl},
    pipeline::PollerStatus,
    server_config::cfg,
    HttpClient,
};

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Periodic background worker that discovers past meetings with a video link
/// and records them as `pending`. Discovery is cheap and always runs on the
/// timer; transcript retrieval and summarization are triggered separately, so
/// a tick's cost stays bounded.
#[derive(Clone)]
pub struct MeetingPoller {
    inner: Arc<Inner>,
}

struct Inner {
    conn: DatabaseConnection,
    http_client: HttpClient,
    poll_interval: Duration,
    running: AtomicBool,
    shutdown: Mutex<Option<CancellationToken>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MeetingPoller {
    pub fn new(conn: DatabaseConnection, http_client: HttpClient, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                conn,
                http_client,
                poll_interval,
                running: AtomicBool::new(false),
                shutdown: Mutex::new(None),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            tracing::info!("Meeting poller is already running");
            return;
        }

        let shutdown = CancellationToken::new();
        *self.inner.shutdown.lock().unwrap() = Some(shutdown.clone());

        let poller = self.clone();
        let handle = tokio::spawn(async move {
            poller.run(shutdown).await;
        });
        *self.inner.worker.lock().unwrap() = Some(handle);

        tracing::info!(
            "Meeting poller started (interval: {}s)",
            self.inner.poll_interval.as_secs()
        );
    }

    pub async fn stop(&self) {
        let shutdown = self.inner.shutdown.lock().unwrap().take();
        if let Some(shutdown) = shutdown {
            shutdown.cancel();
        }

        let handle = self.inner.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            if timeout(STOP_TIMEOUT, handle).await.is_err() {
                tracing::warn!(
                    "Meeting poller worker did not stop within {:?}",
                    STOP_TIMEOUT
                );
            }
        }

        self.inner.running.store(false, Ordering::SeqCst);
        tracing::info!("Meeting poller stopped");
    }

    pub fn status(&self) -> PollerStatus {
        PollerStatus {
            is_running: self.inner.running.load(Ordering::SeqCst),
            poll_interval_secs: self.inner.poll_interval.as_secs(),
        }
    }

    async fn run(&self, shutdown: CancellationToken) {
        let mut interval = interval(self.inner.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Meeting poller shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.check_all_users().await {
                        tracing::error!("Error in meeting poll pass: {:?}", e);
                    }
                }
            }
        }
    }

    async fn check_all_users(&self) -> AppResult<()> {
        let users = UserCtrl::all_with_calendar_access(&self.inner.conn).await?;

        if users.is_empty() {
            return Ok(());
        }

        tracing::debug!("Checking meetings for {} users", users.len());

        for user in users {
            if let Err(e) = self.check_user(&user).await {
                tracing::error!("Error checking meetings for {}: {:?}", user.email, e);
            }
        }

        Ok(())
    }

    async fn check_user(&self, user: &user::Model) -> AppResult<()> {
        let tokens = user
            .calendar_tokens
            .as_ref()
            .ok_or_else(|| anyhow!("User {} has no calendar credential", user.email))?;
        let access_token =
            google::refresh_access_token(&self.inner.http_client, &tokens.refresh_token).await?;
        let calendar_client = CalendarClient::new(self.inner.http_client.clone(), access_token);

        let now = Utc::now();
        let window_start = now - ChronoDuration::days(cfg.poll.meeting_lookback_days);

        let events = calendar_client
            .events_with_conference_link(window_start, now)
            .await?;

        let mut discovered = 0;
        for event in &events {
            match MeetingCtrl::insert_discovered(&self.inner.conn, event, user.id).await {
                Ok(true) => {
                    discovered += 1;
                    tracing::info!("Recorded meeting '{}' for {}", event.title, user.email);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        "Error recording meeting {} for {}: {:?}",
                        event.calendar_event_id,
                        user.email,
                        e
                    );
                }
            }
        }

        UserCtrl::touch_meeting_checkpoint(&self.inner.conn, user.id, now).await?;

        if discovered > 0 {
            tracing::info!("Recorded {} new meetings for {}", discovered, user.email);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_poller() -> MeetingPoller {
        MeetingPoller::new(
            DatabaseConnection::default(),
            reqwest::Client::new(),
            Duration::from_secs(120),
        )
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let poller = test_poller();
        assert!(!poller.status().is_running);

        poller.start();
        assert!(poller.status().is_running);
        poller.start();

        poller.stop().await;
        assert!(!poller.status().is_running);
        assert_eq!(poller.status().poll_interval_secs, 120);
    }
}
