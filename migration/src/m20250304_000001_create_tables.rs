use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(pk_auto(User::Id))
                    .col(string_uniq(User::Email))
                    .col(string(User::Name))
                    .col(string_null(User::GoogleId))
                    .col(string_null(User::Picture))
                    .col(string_null(User::MailRefreshToken))
                    .col(json_binary_null(User::CalendarTokens))
                    .col(timestamp_with_time_zone_null(User::LastEmailCheck))
                    .col(timestamp_with_time_zone_null(User::LastMeetingCheck))
                    .col(timestamp_with_time_zone(User::CreatedAt))
                    .col(timestamp_with_time_zone(User::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Composite primary key is the dedup guarantee: a second insert for
        // the same (email_id, user_id) fails at the storage layer.
        manager
            .create_table(
                Table::create()
                    .table(ProcessedEmail::Table)
                    .if_not_exists()
                    .col(string(ProcessedEmail::EmailId))
                    .col(integer(ProcessedEmail::UserId))
                    .col(integer(ProcessedEmail::TasksCreated))
                    .col(timestamp_with_time_zone(ProcessedEmail::ProcessedAt))
                    .primary_key(
                        Index::create()
                            .col(ProcessedEmail::EmailId)
                            .col(ProcessedEmail::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_processed_email_user")
                            .from(ProcessedEmail::Table, ProcessedEmail::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Meeting::Table)
                    .if_not_exists()
                    .col(pk_auto(Meeting::Id))
                    .col(string(Meeting::CalendarEventId))
                    .col(integer(Meeting::UserId))
                    .col(string(Meeting::Title))
                    .col(text(Meeting::Description))
                    .col(timestamp_with_time_zone(Meeting::StartTime))
                    .col(timestamp_with_time_zone(Meeting::EndTime))
                    .col(json_binary(Meeting::Attendees))
                    .col(string_null(Meeting::VideoLink))
                    .col(string_null(Meeting::RecordingUrl))
                    .col(string_null(Meeting::RecordingId))
                    .col(string_len(Meeting::ProcessingStatus, 16))
                    .col(timestamp_with_time_zone_null(Meeting::ProcessedAt))
                    .col(string_null(Meeting::ErrorMessage))
                    .col(timestamp_with_time_zone(Meeting::CreatedAt))
                    .col(timestamp_with_time_zone(Meeting::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_meeting_user")
                            .from(Meeting::Table, Meeting::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_meeting_event_user")
                    .table(Meeting::Table)
                    .col(Meeting::CalendarEventId)
                    .col(Meeting::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Task::Table)
                    .if_not_exists()
                    .col(pk_auto(Task::Id))
                    .col(string(Task::Title))
                    .col(text(Task::Description))
                    .col(string_len(Task::Priority, 16))
                    .col(string_len(Task::Status, 16))
                    .col(date_null(Task::Deadline))
                    .col(integer(Task::AssignedTo))
                    .col(integer(Task::CreatedBy))
                    .col(string(Task::OwnerEmail))
                    .col(string_len(Task::Source, 16))
                    .col(string_null(Task::EmailId))
                    .col(string_null(Task::SenderEmail))
                    .col(integer_null(Task::MeetingId))
                    .col(string_null(Task::MeetingTitle))
                    .col(timestamp_with_time_zone_null(Task::MeetingDate))
                    .col(json_binary(Task::Labels))
                    .col(timestamp_with_time_zone(Task::CreatedAt))
                    .col(timestamp_with_time_zone(Task::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_assigned_user")
                            .from(Task::Table, Task::AssignedTo)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_meeting")
                            .from(Task::Table, Task::MeetingId)
                            .to(Meeting::Table, Meeting::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_task_owner_email")
                    .table(Task::Table)
                    .col(Task::OwnerEmail)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MeetingTranscript::Table)
                    .if_not_exists()
                    .col(pk_auto(MeetingTranscript::Id))
                    .col(integer_uniq(MeetingTranscript::MeetingId))
                    .col(integer(MeetingTranscript::UserId))
                    .col(text(MeetingTranscript::TranscriptText))
                    .col(json_binary(MeetingTranscript::Segments))
                    .col(string(MeetingTranscript::Language))
                    .col(double(MeetingTranscript::Confidence))
                    .col(timestamp_with_time_zone(MeetingTranscript::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transcript_meeting")
                            .from(MeetingTranscript::Table, MeetingTranscript::MeetingId)
                            .to(Meeting::Table, Meeting::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MeetingSummary::Table)
                    .if_not_exists()
                    .col(pk_auto(MeetingSummary::Id))
                    .col(integer_uniq(MeetingSummary::MeetingId))
                    .col(integer(MeetingSummary::UserId))
                    .col(text(MeetingSummary::Summary))
                    .col(json_binary(MeetingSummary::KeyPoints))
                    .col(json_binary(MeetingSummary::DecisionsMade))
                    .col(json_binary(MeetingSummary::ActionItems))
                    .col(json_binary(MeetingSummary::TopicsDiscussed))
                    .col(json_binary(MeetingSummary::ParticipantsMentioned))
                    .col(json_binary_null(MeetingSummary::NextMeeting))
                    .col(timestamp_with_time_zone(MeetingSummary::CreatedAt))
                    .col(timestamp_with_time_zone(MeetingSummary::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_summary_meeting")
                            .from(MeetingSummary::Table, MeetingSummary::MeetingId)
                            .to(Meeting::Table, Meeting::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MeetingSummary::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MeetingTranscript::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Task::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Meeting::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProcessedEmail::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
    Email,
    Name,
    GoogleId,
    Picture,
    MailRefreshToken,
    CalendarTokens,
    LastEmailCheck,
    LastMeetingCheck,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProcessedEmail {
    Table,
    EmailId,
    UserId,
    TasksCreated,
    ProcessedAt,
}

#[derive(DeriveIden)]
enum Meeting {
    Table,
    Id,
    CalendarEventId,
    UserId,
    Title,
    Description,
    StartTime,
    EndTime,
    Attendees,
    VideoLink,
    RecordingUrl,
    RecordingId,
    ProcessingStatus,
    ProcessedAt,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Task {
    Table,
    Id,
    Title,
    Description,
    Priority,
    Status,
    Deadline,
    AssignedTo,
    CreatedBy,
    OwnerEmail,
    Source,
    EmailId,
    SenderEmail,
    MeetingId,
    MeetingTitle,
    MeetingDate,
    Labels,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MeetingTranscript {
    Table,
    Id,
    MeetingId,
    UserId,
    TranscriptText,
    Segments,
    Language,
    Confidence,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MeetingSummary {
    Table,
    Id,
    MeetingId,
    UserId,
    Summary,
    KeyPoints,
    DecisionsMade,
    ActionItems,
    TopicsDiscussed,
    ParticipantsMentioned,
    NextMeeting,
    CreatedAt,
    UpdatedAt,
}
