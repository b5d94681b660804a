use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::Notification,
    traits::{MarketplaceError, NewNotification},
};

pub async fn insert_notification(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<Notification, MarketplaceError> {
    let inserted: Notification = sqlx::query_as(
        r#"
            INSERT INTO notifications (user_id, ntype, title, message, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.ntype)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.data)
    .fetch_one(conn)
    .await?;
    trace!("🔔️ Notification {} ({}) stored for user {}", inserted.id, inserted.ntype, inserted.user_id);
    Ok(inserted)
}

/// Marks a notification read, scoped to the owning user. Returns false when no row matched.
pub async fn mark_read(user_id: i64, notification_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1 AND user_id = $2")
        .bind(notification_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete_notification(
    user_id: i64,
    notification_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(notification_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn fetch_for_user(
    user_id: i64,
    unread_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, sqlx::Error> {
    let sql = if unread_only {
        "SELECT * FROM notifications WHERE user_id = $1 AND is_read = 0 ORDER BY created_at DESC, id DESC"
    } else {
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
    };
    sqlx::query_as(sql).bind(user_id).fetch_all(conn).await
}
