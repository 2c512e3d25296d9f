pub mod prelude;

pub mod meeting;
pub mod meeting_summary;
pub mod meeting_transcript;
pub mod processed_email;
pub mod sea_orm_active_enums;
pub mod task;
pub mod user;
