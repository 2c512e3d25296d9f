pub use entity::prelude::*;

pub use entity::{
    meeting, meeting_summary, meeting_transcript, processed_email,
    sea_orm_active_enums::{ProcessingStatus, TaskPriority, TaskSource, TaskStatus},
    task, user,
};

pub use sea_orm::{
    entity::prelude::*, ActiveValue, Condition, DatabaseConnection, DbErr, FromQueryResult,
    InsertResult, Order, QueryOrder, QuerySelect, Set, SqlErr,
};
