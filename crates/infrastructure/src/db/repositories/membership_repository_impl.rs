use std::str::FromStr;

use application::MembershipRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Membership, OrgId, OrgRole, RepositoryError, UserId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repository::{invalid_data, map_sqlx_err};

#[derive(Debug, FromRow)]
struct MembershipRecord {
    user_id: Uuid,
    organization_id: Uuid,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MembershipRecord> for Membership {
    type Error = RepositoryError;

    fn try_from(value: MembershipRecord) -> Result<Self, Self::Error> {
        let role = OrgRole::from_str(&value.role).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Membership::new(
            UserId::from(value.user_id),
            OrgId::from(value.organization_id),
            role,
            value.created_at,
        ))
    }
}

#[derive(Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 写入或更新成员关系，供种子数据和测试使用
    pub async fn upsert(&self, membership: &Membership) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO organization_members (user_id, organization_id, role, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, organization_id) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(Uuid::from(membership.user_id))
        .bind(Uuid::from(membership.organization_id))
        .bind(membership.role.as_str())
        .bind(membership.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn find(
        &self,
        user_id: UserId,
        organization_id: OrgId,
    ) -> Result<Option<Membership>, RepositoryError> {
        let record = sqlx::query_as::<_, MembershipRecord>(
            r#"
            SELECT user_id, organization_id, role, created_at
            FROM organization_members
            WHERE user_id = $1 AND organization_id = $2
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(Uuid::from(organization_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Membership::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Membership>, RepositoryError> {
        let records = sqlx::query_as::<_, MembershipRecord>(
            r#"
            SELECT user_id, organization_id, role, created_at
            FROM organization_members
            WHERE user_id = $1
            ORDER BY created_at ASC, organization_id ASC
            "#,
        )
        .bind(Uuid::from(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Membership::try_from).collect()
    }

    async fn list_members(
        &self,
        organization_id: OrgId,
        role: Option<OrgRole>,
    ) -> Result<Vec<Membership>, RepositoryError> {
        let records = sqlx::query_as::<_, MembershipRecord>(
            r#"
            SELECT user_id, organization_id, role, created_at
            FROM organization_members
            WHERE organization_id = $1 AND ($2::text IS NULL OR role = $2)
            ORDER BY created_at ASC, user_id ASC
            "#,
        )
        .bind(Uuid::from(organization_id))
        .bind(role.map(|role| role.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Membership::try_from).collect()
    }
}
