use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::Scenario;

use super::{NewScenario, PgStore, ScenarioPatch, ScenarioStore, StoreError, StoreFuture};

const SCENARIO_COLUMNS: &str = "id, user_id, title, description, context, employee_name,
     employee_avatar, tips, is_custom, created_at, updated_at";

impl PgStore {
    async fn fetch_scenarios_visible_to(&self, user_id: Uuid) -> Result<Vec<Scenario>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCENARIO_COLUMNS}
             FROM scenarios
             WHERE user_id IS NULL OR user_id = $1
             ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(scenario_from_row).collect()
    }

    async fn fetch_scenario(&self, id: Uuid) -> Result<Option<Scenario>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SCENARIO_COLUMNS} FROM scenarios WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| scenario_from_row(&row)).transpose()
    }

    async fn create_scenario(&self, scenario: NewScenario) -> Result<Scenario, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO scenarios (
                id, user_id, title, description, context, employee_name,
                employee_avatar, tips, is_custom, created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, NOW(), NOW())
             RETURNING {SCENARIO_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(scenario.user_id)
        .bind(&scenario.title)
        .bind(&scenario.description)
        .bind(&scenario.context)
        .bind(&scenario.employee_name)
        .bind(&scenario.employee_avatar)
        .bind(Json(&scenario.tips))
        .fetch_one(self.pool())
        .await?;

        scenario_from_row(&row)
    }

    async fn apply_scenario_patch(
        &self,
        id: Uuid,
        patch: ScenarioPatch,
    ) -> Result<Option<Scenario>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE scenarios
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 context = COALESCE($4, context),
                 employee_name = COALESCE($5, employee_name),
                 employee_avatar = COALESCE($6, employee_avatar),
                 tips = COALESCE($7, tips),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {SCENARIO_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.context)
        .bind(patch.employee_name)
        .bind(patch.employee_avatar)
        .bind(patch.tips.as_ref().map(Json))
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| scenario_from_row(&row)).transpose()
    }

    async fn remove_scenario(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM scenarios WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl ScenarioStore for PgStore {
    fn list_scenarios<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Vec<Scenario>> {
        Box::pin(self.fetch_scenarios_visible_to(user_id))
    }

    fn get_scenario<'a>(&'a self, id: Uuid) -> StoreFuture<'a, Option<Scenario>> {
        Box::pin(self.fetch_scenario(id))
    }

    fn insert_scenario<'a>(&'a self, scenario: NewScenario) -> StoreFuture<'a, Scenario> {
        Box::pin(self.create_scenario(scenario))
    }

    fn update_scenario<'a>(
        &'a self,
        id: Uuid,
        patch: ScenarioPatch,
    ) -> StoreFuture<'a, Option<Scenario>> {
        Box::pin(self.apply_scenario_patch(id, patch))
    }

    fn delete_scenario<'a>(&'a self, id: Uuid) -> StoreFuture<'a, bool> {
        Box::pin(self.remove_scenario(id))
    }
}

fn scenario_from_row(row: &PgRow) -> Result<Scenario, StoreError> {
    let tips_raw: Value = row.try_get("tips")?;
    let tips = match tips_raw {
        Value::Null => Vec::new(),
        value => serde_json::from_value::<Vec<String>>(value)
            .map_err(|err| StoreError::InvalidData(format!("scenario tips invalid: {err}")))?,
    };

    Ok(Scenario {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        context: row.try_get("context")?,
        employee_name: row.try_get("employee_name")?,
        employee_avatar: row.try_get("employee_avatar")?,
        tips,
        is_custom: row.try_get("is_custom")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
