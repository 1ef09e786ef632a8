use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::models::{Profile, non_blank};

use super::{PgStore, ProfilePatch, ProfileStore, StoreError, StoreFuture};

const PROFILE_COLUMNS: &str = "id, email, first_name, last_name, avatar_url, created_at, updated_at";

impl PgStore {
    async fn upsert_profile_identity(
        &self,
        user_id: Uuid,
        email: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO profiles (id, email, created_at, updated_at)
             VALUES ($1, $2, NOW(), NOW())
             ON CONFLICT (id) DO UPDATE
             SET email = COALESCE(EXCLUDED.email, profiles.email)
             WHERE profiles.email IS DISTINCT FROM COALESCE(EXCLUDED.email, profiles.email)",
        )
        .bind(user_id)
        .bind(email)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| profile_from_row(&row)).transpose()
    }

    async fn apply_profile_patch(
        &self,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE profiles
             SET first_name = COALESCE($2, first_name),
                 last_name = COALESCE($3, last_name),
                 avatar_url = COALESCE($4, avatar_url),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(non_blank(patch.first_name))
        .bind(non_blank(patch.last_name))
        .bind(non_blank(patch.avatar_url))
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| profile_from_row(&row)).transpose()
    }
}

impl ProfileStore for PgStore {
    fn ensure_profile<'a>(&'a self, user_id: Uuid, email: Option<&'a str>) -> StoreFuture<'a, ()> {
        Box::pin(self.upsert_profile_identity(user_id, email))
    }

    fn get_profile<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Option<Profile>> {
        Box::pin(self.fetch_profile(user_id))
    }

    fn update_profile<'a>(
        &'a self,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> StoreFuture<'a, Option<Profile>> {
        Box::pin(self.apply_profile_patch(user_id, patch))
    }
}

fn profile_from_row(row: &PgRow) -> Result<Profile, StoreError> {
    Ok(Profile {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        avatar_url: row.try_get("avatar_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
