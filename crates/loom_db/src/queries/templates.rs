//! Template and entity-template queries.

use sqlx::SqlitePool;

use crate::error::DbResult;
use crate::models::{AgentTemplateRow, AssociationRow, BlockTemplateRow, TemplateRow};

pub async fn get_template(pool: &SqlitePool, id: &str) -> DbResult<Option<TemplateRow>> {
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, base_template_id, version, organization_id, project_id,
               manager_type, group_config
        FROM templates
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// The mutable `'current'` draft of a template family.
pub async fn get_current_version(
    pool: &SqlitePool,
    base_template_id: &str,
    organization_id: &str,
) -> DbResult<Option<TemplateRow>> {
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, base_template_id, version, organization_id, project_id,
               manager_type, group_config
        FROM templates
        WHERE base_template_id = ? AND organization_id = ? AND version = 'current'
        "#,
    )
    .bind(base_template_id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn insert_template(pool: &SqlitePool, row: &TemplateRow) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO templates
            (id, base_template_id, version, organization_id, project_id,
             manager_type, group_config)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.base_template_id)
    .bind(&row.version)
    .bind(&row.organization_id)
    .bind(&row.project_id)
    .bind(&row.manager_type)
    .bind(&row.group_config)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_agent_templates(
    pool: &SqlitePool,
    template_id: &str,
) -> DbResult<Vec<AgentTemplateRow>> {
    let rows = sqlx::query_as::<_, AgentTemplateRow>(
        r#"
        SELECT entity_id, system_prompt, model, tool_ids, tool_rules,
               source_ids, identity_ids, tags, tool_variables, overrides
        FROM agent_templates
        WHERE template_id = ?
        ORDER BY entity_id
        "#,
    )
    .bind(template_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn insert_agent_template(
    pool: &SqlitePool,
    template_id: &str,
    row: &AgentTemplateRow,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO agent_templates
            (template_id, entity_id, system_prompt, model, tool_ids, tool_rules,
             source_ids, identity_ids, tags, tool_variables, overrides)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(template_id)
    .bind(&row.entity_id)
    .bind(&row.system_prompt)
    .bind(&row.model)
    .bind(&row.tool_ids)
    .bind(&row.tool_rules)
    .bind(&row.source_ids)
    .bind(&row.identity_ids)
    .bind(&row.tags)
    .bind(&row.tool_variables)
    .bind(&row.overrides)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_block_templates(
    pool: &SqlitePool,
    template_id: &str,
) -> DbResult<Vec<BlockTemplateRow>> {
    let rows = sqlx::query_as::<_, BlockTemplateRow>(
        r#"
        SELECT entity_id, label, value, char_limit, description,
               read_only, preserve_on_migration
        FROM block_templates
        WHERE template_id = ?
        ORDER BY entity_id
        "#,
    )
    .bind(template_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn insert_block_template(
    pool: &SqlitePool,
    template_id: &str,
    row: &BlockTemplateRow,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO block_templates
            (template_id, entity_id, label, value, char_limit, description,
             read_only, preserve_on_migration)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(template_id)
    .bind(&row.entity_id)
    .bind(&row.label)
    .bind(&row.value)
    .bind(row.char_limit)
    .bind(&row.description)
    .bind(row.read_only)
    .bind(row.preserve_on_migration)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_associations(
    pool: &SqlitePool,
    template_id: &str,
) -> DbResult<Vec<AssociationRow>> {
    let rows = sqlx::query_as::<_, AssociationRow>(
        r#"
        SELECT agent_entity_id, block_entity_id
        FROM agent_block_associations
        WHERE template_id = ?
        ORDER BY agent_entity_id, block_entity_id
        "#,
    )
    .bind(template_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn insert_association(
    pool: &SqlitePool,
    template_id: &str,
    agent_entity_id: &str,
    block_entity_id: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO agent_block_associations (template_id, agent_entity_id, block_entity_id)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(template_id)
    .bind(agent_entity_id)
    .bind(block_entity_id)
    .execute(pool)
    .await?;

    Ok(())
}
