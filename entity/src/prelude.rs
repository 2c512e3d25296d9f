pub use super::meeting::Entity as Meeting;
pub use super::meeting_summary::Entity as MeetingSummary;
pub use super::meeting_transcript::Entity as MeetingTranscript;
pub use super::processed_email::Entity as ProcessedEmail;
pub use super::task::Entity as Task;
pub use super::user::Entity as User;
