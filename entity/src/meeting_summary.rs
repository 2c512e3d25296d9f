use sea_orm::{entity::prelude::*, FromJsonQueryResult};
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::TaskPriority;

/// One actionable item extracted from a meeting. `assigned_to` is the
/// free-text assignee exactly as the model produced it ("Unassigned" when
/// nobody was named); it is never resolved to a user account. `task_id` is
/// backfilled after the corresponding task row is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ActionItem {
    pub description: String,
    pub assigned_to: String,
    pub priority: TaskPriority,
    pub deadline: Option<chrono::NaiveDate>,
    pub context: Option<String>,
    pub task_id: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ActionItemList(pub Vec<ActionItem>);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct NextMeeting {
    pub suggested_date: Option<String>,
    pub topics: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meeting_summary")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub meeting_id: i32,
    pub user_id: i32,
    #[sea_orm(column_type = "Text")]
    pub summary: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub key_points: StringList,
    #[sea_orm(column_type = "JsonBinary")]
    pub decisions_made: StringList,
    #[sea_orm(column_type = "JsonBinary")]
    pub action_items: ActionItemList,
    #[sea_orm(column_type = "JsonBinary")]
    pub topics_discussed: StringList,
    #[sea_orm(column_type = "JsonBinary")]
    pub participants_mentioned: StringList,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub next_meeting: Option<NextMeeting>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::meeting::Entity",
        from = "Column::MeetingId",
        to = "super::meeting::Column::Id"
    )]
    Meeting,
}

impl Related<super::meeting::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meeting.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
