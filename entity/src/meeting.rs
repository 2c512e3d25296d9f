use sea_orm::{entity::prelude::*, FromJsonQueryResult};
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::ProcessingStatus;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Attendee {
    pub email: Option<String>,
    pub name: Option<String>,
    pub response_status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct AttendeeList(pub Vec<Attendee>);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meeting")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub calendar_event_id: String,
    pub user_id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub start_time: DateTimeWithTimeZone,
    pub end_time: DateTimeWithTimeZone,
    #[sea_orm(column_type = "JsonBinary")]
    pub attendees: AttendeeList,
    pub video_link: Option<String>,
    pub recording_url: Option<String>,
    pub recording_id: Option<String>,
    pub processing_status: ProcessingStatus,
    pub processed_at: Option<DateTimeWithTimeZone>,
    pub error_message: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::task::Entity")]
    Task,
    #[sea_orm(has_one = "super::meeting_summary::Entity")]
    MeetingSummary,
    #[sea_orm(has_one = "super::meeting_transcript::Entity")]
    MeetingTranscript,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl Related<super::meeting_summary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MeetingSummary.def()
    }
}

impl Related<super::meeting_transcript::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MeetingTranscript.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
