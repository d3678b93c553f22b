use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202510010003_create_attendance_records"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("attendance_records"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("subject_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("attendance_date")).date().not_null())
                    .col(ColumnDef::new(Alias::new("time_in")).timestamp().not_null())
                    .col(ColumnDef::new(Alias::new("time_out")).timestamp().null())
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .enumeration(
                                Alias::new("attendance_status_type"),
                                vec![Alias::new("present"), Alias::new("late")],
                            )
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("duration_minutes")).big_integer().null())
                    // no FK: qr_sessions rows are purged after expiry, the link is audit only
                    .col(
                        ColumnDef::new(Alias::new("source_session_id"))
                            .string_len(64)
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_attendance_subject_date")
                    .table(Alias::new("attendance_records"))
                    .col(Alias::new("subject_id"))
                    .col(Alias::new("attendance_date"))
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // At most one open record per subject per day. Partial indexes are not
        // expressible through the schema builder, so this one is raw SQL
        // (valid for both SQLite and Postgres).
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_one_open_per_day \
                 ON attendance_records (subject_id, attendance_date) \
                 WHERE time_out IS NULL",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Alias::new("attendance_records"))
                    .to_owned(),
            )
            .await
    }
}
