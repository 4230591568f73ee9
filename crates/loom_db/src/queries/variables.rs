//! Deployed-agent record and variable queries.

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::error::DbResult;
use crate::models::DeployedAgentRow;

pub async fn get_agent_variables(
    pool: &SqlitePool,
    agent_id: &str,
) -> DbResult<HashMap<String, String>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT key, value
        FROM deployed_agent_variables
        WHERE agent_id = ?
        "#,
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Replace an agent's variable set wholesale inside one transaction.
pub async fn replace_agent_variables(
    pool: &SqlitePool,
    agent_id: &str,
    variables: &HashMap<String, String>,
) -> DbResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM deployed_agent_variables WHERE agent_id = ?")
        .bind(agent_id)
        .execute(&mut *tx)
        .await?;

    for (key, value) in variables {
        sqlx::query(
            r#"
            INSERT INTO deployed_agent_variables (agent_id, key, value)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(agent_id)
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Insert a deployed-agent record and seed its variables atomically, so a
/// crash can never leave a record without its variables.
pub async fn insert_deployed_agent(
    pool: &SqlitePool,
    row: &DeployedAgentRow,
    seed_variables: &HashMap<String, String>,
) -> DbResult<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO deployed_agents
            (agent_id, deployment_id, entity_id, name, template_id, base_template_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.agent_id)
    .bind(&row.deployment_id)
    .bind(&row.entity_id)
    .bind(&row.name)
    .bind(&row.template_id)
    .bind(&row.base_template_id)
    .execute(&mut *tx)
    .await?;

    for (key, value) in seed_variables {
        sqlx::query(
            r#"
            INSERT INTO deployed_agent_variables (agent_id, key, value)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&row.agent_id)
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get_deployed_agent(
    pool: &SqlitePool,
    agent_id: &str,
) -> DbResult<Option<DeployedAgentRow>> {
    let row = sqlx::query_as::<_, DeployedAgentRow>(
        r#"
        SELECT agent_id, deployment_id, entity_id, name, template_id, base_template_id
        FROM deployed_agents
        WHERE agent_id = ?
        "#,
    )
    .bind(agent_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
