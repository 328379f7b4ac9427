//! PostgreSQL implementation of the storage seams.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::models::{BunnyRow, EventRow, PointsConfigRow};
use super::{
    ActivityStore, BunnyStore, ConfigStore, EventStore, HappinessWrite, RecordedActivity,
};
use crate::config::ServiceConfig;
use crate::domain::{
    Bunny, BunnyEvent, BunnyId, BunnyProfileUpdate, EventDetails, EventId, Happiness,
    NewBunnyEvent, PointsConfig,
};
use crate::error::HappinessError;

const BUNNY_COLUMNS: &str = "id, name, avatar_url, happiness, created_at, updated_at";
const EVENT_COLUMNS: &str = "id, bunny_id, event_type, details, occurred_at, points_earned";

/// PostgreSQL-backed storage using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from the service configuration and applies
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`HappinessError::Storage`] if the database is unreachable
    /// or a migration fails.
    pub async fn connect(config: &ServiceConfig) -> Result<Self, HappinessError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| HappinessError::Storage(format!("migration failed: {e}")))?;
        tracing::info!("postgres storage ready");
        Ok(Self::new(pool))
    }

    /// Locks the bunny row, computes the new score and writes it back in
    /// one transaction.
    async fn write_happiness<F>(
        &self,
        id: BunnyId,
        next: F,
    ) -> Result<HappinessWrite, HappinessError>
    where
        F: FnOnce(Happiness) -> Happiness + Send,
    {
        let mut tx = self.pool.begin().await?;
        let write = write_happiness_in(&mut tx, id, next).await?;
        tx.commit().await?;
        Ok(write)
    }
}

/// Row-locks the bunny inside the caller's transaction and stores
/// `next(current)`.
async fn write_happiness_in<F>(
    conn: &mut PgConnection,
    id: BunnyId,
    next: F,
) -> Result<HappinessWrite, HappinessError>
where
    F: FnOnce(Happiness) -> Happiness + Send,
{
    let current: Option<i16> =
        sqlx::query_scalar("SELECT happiness FROM bunnies WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
    let Some(current) = current else {
        return Err(HappinessError::BunnyNotFound(id));
    };
    let old = Happiness::try_new(i64::from(current))?;
    let new = next(old);

    sqlx::query(
        "UPDATE bunnies SET happiness = $2, updated_at = GREATEST(updated_at, now()) \
         WHERE id = $1",
    )
    .bind(id.as_uuid())
    .bind(i16::from(new.get()))
    .execute(&mut *conn)
    .await?;

    Ok(HappinessWrite { old, new })
}

async fn insert_event(conn: &mut PgConnection, event: &BunnyEvent) -> Result<(), HappinessError> {
    let playmate = match event.details {
        EventDetails::Playing(play) => Some(*play.playmate_bunny_id.as_uuid()),
        EventDetails::Eating(_) => None,
    };
    let details = serde_json::to_value(event.details)
        .map_err(|e| HappinessError::Internal(format!("encode details: {e}")))?;

    sqlx::query(
        "INSERT INTO bunny_events \
           (id, bunny_id, event_type, details, playmate_bunny_id, occurred_at, points_earned) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(event.id.as_uuid())
    .bind(event.bunny_id.as_uuid())
    .bind(event.event_type.as_str())
    .bind(details)
    .bind(playmate)
    .bind(event.timestamp)
    .bind(i64::from(event.points_earned))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl BunnyStore for PostgresStore {
    async fn insert_bunny(&self, bunny: Bunny) -> Result<(), HappinessError> {
        sqlx::query(
            "INSERT INTO bunnies (id, name, avatar_url, happiness, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(bunny.id.as_uuid())
        .bind(&bunny.name)
        .bind(&bunny.avatar_url)
        .bind(i16::from(bunny.happiness.get()))
        .bind(bunny.created_at)
        .bind(bunny.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_bunny(&self, id: BunnyId) -> Result<Option<Bunny>, HappinessError> {
        let row = sqlx::query_as::<_, BunnyRow>(&format!(
            "SELECT {BUNNY_COLUMNS} FROM bunnies WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Bunny::try_from).transpose()
    }

    async fn list_bunnies(&self) -> Result<Vec<Bunny>, HappinessError> {
        let rows = sqlx::query_as::<_, BunnyRow>(&format!(
            "SELECT {BUNNY_COLUMNS} FROM bunnies ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Bunny::try_from).collect()
    }

    async fn update_profile(
        &self,
        id: BunnyId,
        update: &BunnyProfileUpdate,
    ) -> Result<Bunny, HappinessError> {
        // `avatar_url` is only overwritten when the edit carries one; the
        // inner Option may still be NULL to clear it.
        let row = sqlx::query_as::<_, BunnyRow>(&format!(
            "UPDATE bunnies SET \
               name = COALESCE($2, name), \
               avatar_url = CASE WHEN $3 THEN $4 ELSE avatar_url END, \
               updated_at = GREATEST(updated_at, now()) \
             WHERE id = $1 RETURNING {BUNNY_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(&update.name)
        .bind(update.avatar_url.is_some())
        .bind(update.avatar_url.clone().flatten())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Bunny::try_from)
            .transpose()?
            .ok_or(HappinessError::BunnyNotFound(id))
    }

    async fn set_happiness(
        &self,
        id: BunnyId,
        value: Happiness,
    ) -> Result<HappinessWrite, HappinessError> {
        self.write_happiness(id, |_| value).await
    }

    async fn adjust_happiness(
        &self,
        id: BunnyId,
        delta: i64,
    ) -> Result<HappinessWrite, HappinessError> {
        self.write_happiness(id, |old| old.apply(delta)).await
    }
}

#[async_trait]
impl EventStore for PostgresStore {
    async fn append_event(&self, event: NewBunnyEvent) -> Result<BunnyEvent, HappinessError> {
        let event = event.into_event(EventId::new());
        let mut conn = self.pool.acquire().await?;
        insert_event(&mut conn, &event).await?;
        Ok(event)
    }

    async fn remove_event(&self, id: EventId) -> Result<(), HappinessError> {
        let result = sqlx::query("DELETE FROM bunny_events WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HappinessError::EventNotFound(id));
        }
        Ok(())
    }

    async fn list_events_for_bunny(
        &self,
        id: BunnyId,
    ) -> Result<Vec<BunnyEvent>, HappinessError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM bunny_events \
             WHERE bunny_id = $1 OR playmate_bunny_id = $1 \
             ORDER BY occurred_at ASC, seq ASC"
        ))
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BunnyEvent::try_from).collect()
    }

    async fn list_events(&self) -> Result<Vec<BunnyEvent>, HappinessError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM bunny_events ORDER BY occurred_at ASC, seq ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BunnyEvent::try_from).collect()
    }

    async fn has_played_together(&self, a: BunnyId, b: BunnyId) -> Result<bool, HappinessError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
               SELECT 1 FROM bunny_events \
               WHERE event_type = 'playing' \
                 AND LEAST(bunny_id, playmate_bunny_id) = LEAST($1::uuid, $2::uuid) \
                 AND GREATEST(bunny_id, playmate_bunny_id) = GREATEST($1::uuid, $2::uuid))",
        )
        .bind(a.as_uuid())
        .bind(b.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl ActivityStore for PostgresStore {
    async fn record_activity(
        &self,
        event: NewBunnyEvent,
        participants: &[BunnyId],
    ) -> Result<RecordedActivity, HappinessError> {
        let delta = i64::from(event.points_earned);
        let event = event.into_event(EventId::new());
        let ids: Vec<Uuid> = participants.iter().map(|id| *id.as_uuid()).collect();

        let mut tx = self.pool.begin().await?;
        // Row locks in id order, matching the service's lock order.
        let locked: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM bunnies WHERE id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(ids.as_slice())
                .fetch_all(&mut *tx)
                .await?;
        if let Some(missing) = participants
            .iter()
            .find(|id| !locked.contains(id.as_uuid()))
        {
            return Err(HappinessError::BunnyNotFound(*missing));
        }

        insert_event(&mut tx, &event).await?;
        let mut writes = Vec::with_capacity(participants.len());
        for id in participants {
            let write = write_happiness_in(&mut tx, *id, |old| old.apply(delta)).await?;
            writes.push((*id, write));
        }
        tx.commit().await?;

        tracing::debug!(event_id = %event.id, participants = writes.len(), "activity committed");
        Ok(RecordedActivity { event, writes })
    }
}

#[async_trait]
impl ConfigStore for PostgresStore {
    async fn load_config(&self) -> Result<Option<PointsConfig>, HappinessError> {
        let row = sqlx::query_as::<_, PointsConfigRow>(
            "SELECT lettuce, carrot, playing, repeat_playing FROM points_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(PointsConfig::try_from).transpose()
    }

    async fn save_config(&self, config: PointsConfig) -> Result<(), HappinessError> {
        let row = PointsConfigRow::from(config);
        sqlx::query(
            "INSERT INTO points_config (id, lettuce, carrot, playing, repeat_playing) \
             VALUES (1, $1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
               lettuce = EXCLUDED.lettuce, carrot = EXCLUDED.carrot, \
               playing = EXCLUDED.playing, repeat_playing = EXCLUDED.repeat_playing",
        )
        .bind(row.lettuce)
        .bind(row.carrot)
        .bind(row.playing)
        .bind(row.repeat_playing)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
