//! Deployment lifecycle queries.

use sqlx::SqlitePool;

use crate::error::DbResult;
use crate::models::DeploymentRow;

pub async fn get_deployment(pool: &SqlitePool, id: &str) -> DbResult<Option<DeploymentRow>> {
    let row = sqlx::query_as::<_, DeploymentRow>(
        r#"
        SELECT id, organization_id, project_id, template_id, base_template_id,
               status, status_message
        FROM deployments
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn insert_deployment(pool: &SqlitePool, row: &DeploymentRow) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO deployments
            (id, organization_id, project_id, template_id, base_template_id,
             status, status_message)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.organization_id)
    .bind(&row.project_id)
    .bind(&row.template_id)
    .bind(&row.base_template_id)
    .bind(&row.status)
    .bind(&row.status_message)
    .execute(pool)
    .await?;

    Ok(())
}

/// Move a deployment to `migrating` if and only if it is not already there.
/// The single UPDATE is the atomic check-and-set; the caller won the claim
/// when a row changed.
pub async fn claim_deployment(pool: &SqlitePool, id: &str) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE deployments
        SET status = 'migrating', updated_at = datetime('now')
        WHERE id = ? AND status != 'migrating'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_ready(pool: &SqlitePool, id: &str, template_id: &str) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE deployments
        SET status = 'ready', template_id = ?, status_message = NULL,
            updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(template_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_failed(pool: &SqlitePool, id: &str, message: &str) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE deployments
        SET status = 'failed', status_message = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(message)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn count_deployments(
    pool: &SqlitePool,
    base_template_id: &str,
    organization_id: &str,
) -> DbResult<u64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM deployments
        WHERE base_template_id = ? AND organization_id = ?
        "#,
    )
    .bind(base_template_id)
    .bind(organization_id)
    .fetch_one(pool)
    .await?;

    Ok(count as u64)
}

/// One fixed-offset page of a template family's deployments, ordered by id
/// so pagination is stable across calls.
pub async fn list_deployments_page(
    pool: &SqlitePool,
    base_template_id: &str,
    organization_id: &str,
    offset: u64,
    limit: u64,
) -> DbResult<Vec<DeploymentRow>> {
    let rows = sqlx::query_as::<_, DeploymentRow>(
        r#"
        SELECT id, organization_id, project_id, template_id, base_template_id,
               status, status_message
        FROM deployments
        WHERE base_template_id = ? AND organization_id = ?
        ORDER BY id
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(base_template_id)
    .bind(organization_id)
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
