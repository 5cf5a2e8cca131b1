//! Postgres store implementations.
//!
//! Ticket/tracking pair writes run inside one transaction, honoring the
//! atomic-pair contract of [`TicketRepository`]. Escalation candidates
//! are selected with `FOR UPDATE SKIP LOCKED` so concurrent sweep workers
//! never contend on the same rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use opsdesk_core::{PolicyId, TeamId, TenantId, TicketId, UserId};

use crate::error::{LifecycleError, Result};
use crate::services::policy::{SlaPolicy, SlaPolicyStore};
use crate::services::sla::SlaTracking;
use crate::services::ticket::{Page, Ticket, TicketFilter, TicketRepository};
use crate::types::{Priority, TicketKind, TicketStatus};

/// Embedded schema migrations for the lifecycle tables.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Debug, FromRow)]
struct TicketRow {
    id: Uuid,
    tenant_id: Uuid,
    team_id: Uuid,
    kind: TicketKind,
    category: String,
    title: String,
    description: String,
    priority: Priority,
    status: String,
    created_by: Uuid,
    assigned_to: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    metadata: serde_json::Value,
}

impl TicketRow {
    fn into_ticket(self) -> Result<Ticket> {
        let status = TicketStatus::parse(self.kind, &self.status).ok_or_else(|| {
            LifecycleError::Persistence(format!(
                "ticket {} has status '{}' unknown for kind '{}'",
                self.id, self.status, self.kind
            ))
        })?;
        Ok(Ticket {
            id: TicketId::from_uuid(self.id),
            kind: self.kind,
            tenant_id: TenantId::from_uuid(self.tenant_id),
            team_id: TeamId::from_uuid(self.team_id),
            title: self.title,
            description: self.description,
            category: self.category,
            priority: self.priority,
            status,
            created_by: UserId::from_uuid(self.created_by),
            assigned_to: self.assigned_to.map(UserId::from_uuid),
            created_at: self.created_at,
            updated_at: self.updated_at,
            resolved_at: self.resolved_at,
            metadata: self.metadata,
        })
    }
}

#[derive(Debug, FromRow)]
struct TrackingRow {
    ticket_id: Uuid,
    tenant_id: Uuid,
    policy_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    response_due_at: Option<DateTime<Utc>>,
    resolution_due_at: Option<DateTime<Utc>>,
    escalation_due_at: Option<DateTime<Utc>>,
    first_response_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
    is_escalated: bool,
}

impl From<TrackingRow> for SlaTracking {
    fn from(row: TrackingRow) -> Self {
        Self {
            ticket_id: TicketId::from_uuid(row.ticket_id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            policy_id: row.policy_id.map(PolicyId::from_uuid),
            created_at: row.created_at,
            response_due_at: row.response_due_at,
            resolution_due_at: row.resolution_due_at,
            escalation_due_at: row.escalation_due_at,
            first_response_at: row.first_response_at,
            resolved_at: row.resolved_at,
            is_escalated: row.is_escalated,
        }
    }
}

/// Postgres-backed ticket repository.
pub struct PgTicketRepository {
    pool: PgPool,
}

impl PgTicketRepository {
    /// Create a repository over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_ticket<'e, E>(executor: E, ticket: &Ticket) -> Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO tickets (
                id, tenant_id, team_id, kind, category, title, description,
                priority, status, created_by, assigned_to, created_at,
                updated_at, resolved_at, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(ticket.id.into_inner())
        .bind(ticket.tenant_id.into_inner())
        .bind(ticket.team_id.into_inner())
        .bind(ticket.kind)
        .bind(&ticket.category)
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(ticket.priority)
        .bind(ticket.status.as_str())
        .bind(ticket.created_by.into_inner())
        .bind(ticket.assigned_to.map(UserId::into_inner))
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .bind(ticket.resolved_at)
        .bind(&ticket.metadata)
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn update_ticket<'e, E>(executor: E, ticket: &Ticket) -> Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE tickets
            SET team_id = $3, category = $4, title = $5, description = $6,
                priority = $7, status = $8, assigned_to = $9, updated_at = $10,
                resolved_at = $11, metadata = $12
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(ticket.id.into_inner())
        .bind(ticket.tenant_id.into_inner())
        .bind(ticket.team_id.into_inner())
        .bind(&ticket.category)
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(ticket.priority)
        .bind(ticket.status.as_str())
        .bind(ticket.assigned_to.map(UserId::into_inner))
        .bind(ticket.updated_at)
        .bind(ticket.resolved_at)
        .bind(&ticket.metadata)
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn upsert_tracking<'e, E>(executor: E, tracking: &SlaTracking) -> Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO sla_trackings (
                ticket_id, tenant_id, policy_id, created_at, response_due_at,
                resolution_due_at, escalation_due_at, first_response_at,
                resolved_at, is_escalated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (ticket_id) DO UPDATE
            SET first_response_at = EXCLUDED.first_response_at,
                resolved_at = EXCLUDED.resolved_at,
                is_escalated = sla_trackings.is_escalated OR EXCLUDED.is_escalated
            "#,
        )
        .bind(tracking.ticket_id.into_inner())
        .bind(tracking.tenant_id.into_inner())
        .bind(tracking.policy_id.map(PolicyId::into_inner))
        .bind(tracking.created_at)
        .bind(tracking.response_due_at)
        .bind(tracking.resolution_due_at)
        .bind(tracking.escalation_due_at)
        .bind(tracking.first_response_at)
        .bind(tracking.resolved_at)
        .bind(tracking.is_escalated)
        .execute(executor)
        .await?;
        Ok(())
    }

    fn filter_clauses(filter: &TicketFilter, first_param: usize) -> (String, usize) {
        let mut sql = String::new();
        let mut param = first_param;
        if filter.tenant_id.is_some() {
            sql.push_str(&format!(" AND tenant_id = ${param}"));
            param += 1;
        }
        if filter.team_id.is_some() {
            sql.push_str(&format!(" AND team_id = ${param}"));
            param += 1;
        }
        if filter.kind.is_some() {
            sql.push_str(&format!(" AND kind = ${param}"));
            param += 1;
        }
        if filter.status.is_some() {
            sql.push_str(&format!(" AND status = ${param}"));
            param += 1;
        }
        if filter.priority.is_some() {
            sql.push_str(&format!(" AND priority = ${param}"));
            param += 1;
        }
        if filter.assigned_to.is_some() {
            sql.push_str(&format!(" AND assigned_to = ${param}"));
            param += 1;
        }
        if filter.created_by.is_some() {
            sql.push_str(&format!(" AND created_by = ${param}"));
            param += 1;
        }
        (sql, param)
    }

    fn bind_filter<'q, O>(
        mut q: sqlx::query::QueryAs<'q, Postgres, O, sqlx::postgres::PgArguments>,
        filter: &'q TicketFilter,
    ) -> sqlx::query::QueryAs<'q, Postgres, O, sqlx::postgres::PgArguments> {
        if let Some(tenant_id) = filter.tenant_id {
            q = q.bind(tenant_id.into_inner());
        }
        if let Some(team_id) = filter.team_id {
            q = q.bind(team_id.into_inner());
        }
        if let Some(kind) = filter.kind {
            q = q.bind(kind);
        }
        if let Some(status) = filter.status.as_deref() {
            q = q.bind(status);
        }
        if let Some(priority) = filter.priority {
            q = q.bind(priority);
        }
        if let Some(assigned_to) = filter.assigned_to {
            q = q.bind(assigned_to.into_inner());
        }
        if let Some(created_by) = filter.created_by {
            q = q.bind(created_by.into_inner());
        }
        q
    }
}

#[async_trait]
impl TicketRepository for PgTicketRepository {
    async fn create_pair(
        &self,
        ticket: Ticket,
        tracking: SlaTracking,
    ) -> Result<(Ticket, SlaTracking)> {
        let mut tx = self.pool.begin().await?;
        Self::insert_ticket(&mut *tx, &ticket).await?;
        Self::upsert_tracking(&mut *tx, &tracking).await?;
        tx.commit().await?;
        Ok((ticket, tracking))
    }

    async fn get(&self, tenant_id: TenantId, id: TicketId) -> Result<Option<Ticket>> {
        let row: Option<TicketRow> = sqlx::query_as(
            r#"
            SELECT * FROM tickets
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id.into_inner())
        .bind(tenant_id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TicketRow::into_ticket).transpose()
    }

    async fn get_tracking(
        &self,
        tenant_id: TenantId,
        id: TicketId,
    ) -> Result<Option<SlaTracking>> {
        let row: Option<TrackingRow> = sqlx::query_as(
            r#"
            SELECT * FROM sla_trackings
            WHERE ticket_id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id.into_inner())
        .bind(tenant_id.into_inner())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SlaTracking::from))
    }

    async fn save(&self, ticket: Ticket) -> Result<Ticket> {
        let mut tx = self.pool.begin().await?;
        Self::update_ticket(&mut *tx, &ticket).await?;
        tx.commit().await?;
        Ok(ticket)
    }

    async fn save_pair(
        &self,
        ticket: Ticket,
        tracking: SlaTracking,
    ) -> Result<(Ticket, SlaTracking)> {
        let mut tx = self.pool.begin().await?;
        Self::update_ticket(&mut *tx, &ticket).await?;
        Self::upsert_tracking(&mut *tx, &tracking).await?;
        tx.commit().await?;
        Ok((ticket, tracking))
    }

    async fn delete_pair(&self, tenant_id: TenantId, id: TicketId) -> Result<bool> {
        // sla_trackings cascades from tickets.
        let result = sqlx::query(
            r#"
            DELETE FROM tickets
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(id.into_inner())
        .bind(tenant_id.into_inner())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &TicketFilter, page: Page) -> Result<Vec<Ticket>> {
        let (clauses, next_param) = Self::filter_clauses(filter, 1);
        let sql = format!(
            "SELECT * FROM tickets WHERE TRUE{clauses} \
             ORDER BY created_at DESC, id ASC LIMIT ${next_param} OFFSET ${}",
            next_param + 1
        );

        let q = sqlx::query_as::<_, TicketRow>(&sql);
        let rows = Self::bind_filter(q, filter)
            .bind(page.limit.max(0))
            .bind(page.offset.max(0))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TicketRow::into_ticket).collect()
    }

    async fn count(&self, filter: &TicketFilter) -> Result<i64> {
        let (clauses, _) = Self::filter_clauses(filter, 1);
        let sql = format!("SELECT COUNT(*) FROM tickets WHERE TRUE{clauses}");

        let mut q = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(tenant_id) = filter.tenant_id {
            q = q.bind(tenant_id.into_inner());
        }
        if let Some(team_id) = filter.team_id {
            q = q.bind(team_id.into_inner());
        }
        if let Some(kind) = filter.kind {
            q = q.bind(kind);
        }
        if let Some(status) = filter.status.as_deref() {
            q = q.bind(status);
        }
        if let Some(priority) = filter.priority {
            q = q.bind(priority);
        }
        if let Some(assigned_to) = filter.assigned_to {
            q = q.bind(assigned_to.into_inner());
        }
        if let Some(created_by) = filter.created_by {
            q = q.bind(created_by.into_inner());
        }
        Ok(q.fetch_one(&self.pool).await?)
    }

    async fn escalation_candidates(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SlaTracking>> {
        let rows: Vec<TrackingRow> = sqlx::query_as(
            r#"
            SELECT * FROM sla_trackings
            WHERE resolved_at IS NULL
              AND is_escalated = FALSE
              AND escalation_due_at IS NOT NULL
              AND escalation_due_at < $1
            ORDER BY escalation_due_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SlaTracking::from).collect())
    }

    async fn mark_escalated(&self, tenant_id: TenantId, ticket_id: TicketId) -> Result<bool> {
        // The flag only ever advances forward; the predicate makes the
        // flip claimable exactly once under concurrent sweeps.
        let result = sqlx::query(
            r#"
            UPDATE sla_trackings
            SET is_escalated = TRUE
            WHERE ticket_id = $1 AND tenant_id = $2 AND is_escalated = FALSE
            "#,
        )
        .bind(ticket_id.into_inner())
        .bind(tenant_id.into_inner())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct PolicyRow {
    id: Uuid,
    tenant_id: Uuid,
    team_id: Option<Uuid>,
    category: String,
    priority: Priority,
    response_time_hours: i64,
    resolution_time_hours: i64,
    escalation_after_hours: Option<i64>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PolicyRow> for SlaPolicy {
    fn from(row: PolicyRow) -> Self {
        Self {
            id: PolicyId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            team_id: row.team_id.map(TeamId::from_uuid),
            category: row.category,
            priority: row.priority,
            response_time_hours: row.response_time_hours,
            resolution_time_hours: row.resolution_time_hours,
            escalation_after_hours: row.escalation_after_hours,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres-backed policy lookup.
pub struct PgSlaPolicyStore {
    pool: PgPool,
}

impl PgSlaPolicyStore {
    /// Create a store over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlaPolicyStore for PgSlaPolicyStore {
    async fn find_active(
        &self,
        tenant_id: TenantId,
        team_id: Option<TeamId>,
        category: &str,
        priority: Priority,
    ) -> Result<Option<SlaPolicy>> {
        let row: Option<PolicyRow> = sqlx::query_as(
            r#"
            SELECT * FROM sla_policies
            WHERE tenant_id = $1
              AND team_id IS NOT DISTINCT FROM $2
              AND category = $3
              AND priority = $4
              AND is_active
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.into_inner())
        .bind(team_id.map(TeamId::into_inner))
        .bind(category)
        .bind(priority)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SlaPolicy::from))
    }
}
