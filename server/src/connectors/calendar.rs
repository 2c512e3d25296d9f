use anyhow::Context;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;

use entity::meeting::Attendee;

use crate::{error::AppResult, server_config::cfg, HttpClient};

lazy_static::lazy_static!(
    static ref RE_MEET_LINK: Regex = Regex::new(r"https://meet\.google\.com/[a-z-]+").unwrap();
);

#[derive(Debug, Deserialize)]
struct EventsResponse {
    items: Option<Vec<CalendarEvent>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub attendees: Option<Vec<EventAttendee>>,
    pub hangout_link: Option<String>,
    pub conference_data: Option<ConferenceData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: Option<DateTime<FixedOffset>>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub response_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceData {
    pub conference_solution: Option<ConferenceSolution>,
    pub entry_points: Option<Vec<EntryPoint>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceSolution {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub entry_point_type: Option<String>,
    pub uri: Option<String>,
}

/// A past calendar event carrying a video-conferencing link, reduced to what
/// meeting discovery persists.
#[derive(Debug, Clone)]
pub struct DiscoveredMeeting {
    pub calendar_event_id: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub attendees: Vec<Attendee>,
    pub video_link: String,
}

#[derive(Clone)]
pub struct CalendarClient {
    http_client: HttpClient,
    access_token: String,
}

impl CalendarClient {
    pub fn new(http_client: HttpClient, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
        }
    }

    /// Past events in the window that expose a video link, in start order.
    pub async fn events_with_conference_link(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<DiscoveredMeeting>> {
        let url = format!("{}/calendars/primary/events", cfg.google.calendar_endpoint);

        let resp = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", from.to_rfc3339().as_str()),
                ("timeMax", to.to_rfc3339().as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", "100"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<EventsResponse>()
            .await
            .context("Could not parse calendar events response")?;

        let meetings = resp
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|event| parse_event(&event))
            .collect();

        Ok(meetings)
    }
}

/// Finds the event's video link: structured conference data first, then the
/// dedicated join-link field, then a link pattern in description/location.
pub fn conference_link(event: &CalendarEvent) -> Option<String> {
    if let Some(conference) = &event.conference_data {
        if let Some(entry_points) = &conference.entry_points {
            for entry in entry_points {
                if entry.entry_point_type.as_deref() == Some("video") {
                    if let Some(uri) = &entry.uri {
                        return Some(uri.clone());
                    }
                }
            }
        }
    }

    if let Some(link) = &event.hangout_link {
        return Some(link.clone());
    }

    for text in [&event.description, &event.location].into_iter().flatten() {
        if let Some(m) = RE_MEET_LINK.find(text) {
            return Some(m.as_str().to_string());
        }
    }

    None
}

pub fn parse_event(event: &CalendarEvent) -> Option<DiscoveredMeeting> {
    let video_link = conference_link(event)?;
    let start_time = resolve_time(event.start.as_ref())?;
    let end_time = resolve_time(event.end.as_ref())?;

    let attendees = event
        .attendees
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|a| Attendee {
            email: a.email.clone(),
            name: a.display_name.clone(),
            response_status: a.response_status.clone(),
        })
        .collect();

    Some(DiscoveredMeeting {
        calendar_event_id: event.id.clone(),
        title: event
            .summary
            .clone()
            .unwrap_or_else(|| "No Title".to_string()),
        description: event.description.clone().unwrap_or_default(),
        start_time,
        end_time,
        attendees,
        video_link,
    })
}

fn resolve_time(time: Option<&EventTime>) -> Option<DateTime<FixedOffset>> {
    let time = time?;
    if let Some(dt) = time.date_time {
        return Some(dt);
    }
    // All-day events only carry a date
    time.date
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_event() -> CalendarEvent {
        CalendarEvent {
            id: "evt_1".to_string(),
            summary: Some("Sprint Planning".to_string()),
            start: Some(EventTime {
                date_time: Some("2025-11-20T10:00:00+00:00".parse().unwrap()),
                date: None,
            }),
            end: Some(EventTime {
                date_time: Some("2025-11-20T11:00:00+00:00".parse().unwrap()),
                date: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_conference_link_from_entry_points() {
        let mut event = base_event();
        event.conference_data = Some(ConferenceData {
            conference_solution: Some(ConferenceSolution {
                name: Some("Google Meet".to_string()),
            }),
            entry_points: Some(vec![
                EntryPoint {
                    entry_point_type: Some("phone".to_string()),
                    uri: Some("tel:+1-555-0100".to_string()),
                },
                EntryPoint {
                    entry_point_type: Some("video".to_string()),
                    uri: Some("https://meet.google.com/abc-defg-hij".to_string()),
                },
            ]),
        });

        assert_eq!(
            conference_link(&event).as_deref(),
            Some("https://meet.google.com/abc-defg-hij")
        );
    }

    #[test]
    fn test_conference_link_from_join_field() {
        let mut event = base_event();
        event.hangout_link = Some("https://meet.google.com/xyz-abcd-efg".to_string());
        assert_eq!(
            conference_link(&event).as_deref(),
            Some("https://meet.google.com/xyz-abcd-efg")
        );
    }

    #[test]
    fn test_conference_link_from_description_text() {
        let mut event = base_event();
        event.description =
            Some("Join here: https://meet.google.com/one-two-three then dial in".to_string());
        assert_eq!(
            conference_link(&event).as_deref(),
            Some("https://meet.google.com/one-two-three")
        );
    }

    #[test]
    fn test_event_without_link_is_skipped() {
        let mut event = base_event();
        event.description = Some("Conference room 4B".to_string());
        assert!(conference_link(&event).is_none());
        assert!(parse_event(&event).is_none());
    }

    #[test]
    fn test_parse_event_maps_attendees() {
        let mut event = base_event();
        event.hangout_link = Some("https://meet.google.com/xyz-abcd-efg".to_string());
        event.attendees = Some(vec![EventAttendee {
            email: Some("sam@example.com".to_string()),
            display_name: Some("Sam".to_string()),
            response_status: Some("accepted".to_string()),
        }]);

        let meeting = parse_event(&event).unwrap();
        assert_eq!(meeting.title, "Sprint Planning");
        assert_eq!(meeting.attendees.len(), 1);
        assert_eq!(meeting.attendees[0].email.as_deref(), Some("sam@example.com"));
    }

    #[test]
    fn test_all_day_event_resolves_to_midnight() {
        let mut event = base_event();
        event.hangout_link = Some("https://meet.google.com/xyz-abcd-efg".to_string());
        event.start = Some(EventTime {
            date_time: None,
            date: Some("2025-11-20".parse().unwrap()),
        });
        event.end = Some(EventTime {
            date_time: None,
            date: Some("2025-11-21".parse().unwrap()),
        });

        let meeting = parse_event(&event).unwrap();
        assert_eq!(meeting.start_time.to_rfc3339(), "2025-11-20T00:00:00+00:00");
    }
}
