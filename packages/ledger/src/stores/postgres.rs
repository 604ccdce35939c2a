//! Postgres storage implementation.
//!
//! Runs its own idempotent migrations at startup. The unique-URL
//! constraint race is resolved with `ON CONFLICT DO NOTHING` followed by
//! a re-read of the winning row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::geocoder::GeocodeHit;
use crate::traits::store::IncidentStore;
use crate::types::extraction::QuotedEvidence;
use crate::types::incident::{Activity, IncidentPatch, IncidentRecord, Jurisdiction, SarOpType, SarSegment};
use crate::types::source::{NewSource, SourceDocument, SourceMetaPatch, SourceRef};

/// Postgres-backed incident store.
pub struct PostgresStore {
    pool: PgPool,
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(e))
}

fn count_to_db(value: Option<u32>) -> Option<i32> {
    value.and_then(|v| i32::try_from(v).ok())
}

fn count_from_db(value: Option<i32>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

impl PostgresStore {
    /// Connect and run migrations.
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(backend)?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Wrap an existing pool (migrations assumed done).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS events (
                event_id UUID PRIMARY KEY,
                jurisdiction TEXT,
                location_name TEXT,
                peak_name TEXT,
                route_name TEXT,
                event_type TEXT,
                activity TEXT,
                cause_primary TEXT,
                contributing_factors TEXT[],
                n_fatalities INTEGER,
                n_injured INTEGER,
                party_size INTEGER,
                date_event_start DATE,
                date_event_end DATE,
                date_of_death DATE,
                date_recovery DATE,
                time_to_recovery_days INTEGER,
                iso_country TEXT,
                admin_area TEXT,
                tz_local TEXT,
                phase TEXT,
                names_all TEXT[],
                names_deceased TEXT[],
                names_relatives TEXT[],
                names_responders TEXT[],
                names_spokespersons TEXT[],
                names_medics TEXT[],
                lat DOUBLE PRECISION,
                lon DOUBLE PRECISION,
                created_at TIMESTAMPTZ,
                updated_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                source_id UUID PRIMARY KEY,
                event_id UUID NOT NULL,
                url TEXT NOT NULL UNIQUE,
                publisher TEXT,
                article_title TEXT,
                date_published DATE,
                cleaned_text TEXT,
                quoted_evidence JSONB,
                summary_bullets TEXT[],
                date_scraped TIMESTAMPTZ
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_sources_event_id ON sources(event_id)",
            r#"
            CREATE TABLE IF NOT EXISTS sar_ops (
                sar_id UUID PRIMARY KEY,
                event_id UUID NOT NULL,
                op_type TEXT NOT NULL,
                agency TEXT,
                started_at TIMESTAMPTZ,
                ended_at TIMESTAMPTZ,
                outcome TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_sar_ops_event_id ON sar_ops(event_id)",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        }
        Ok(())
    }

    fn map_event(row: &PgRow) -> StoreResult<IncidentRecord> {
        Ok(IncidentRecord {
            event_id: row.try_get("event_id").map_err(backend)?,
            jurisdiction: row
                .try_get::<Option<String>, _>("jurisdiction")
                .map_err(backend)?
                .as_deref()
                .and_then(Jurisdiction::parse),
            location_name: row.try_get("location_name").map_err(backend)?,
            peak_name: row.try_get("peak_name").map_err(backend)?,
            route_name: row.try_get("route_name").map_err(backend)?,
            event_type: row.try_get("event_type").map_err(backend)?,
            activity: row
                .try_get::<Option<String>, _>("activity")
                .map_err(backend)?
                .as_deref()
                .map(Activity::normalize),
            cause_primary: row.try_get("cause_primary").map_err(backend)?,
            contributing_factors: row.try_get("contributing_factors").map_err(backend)?,
            n_fatalities: count_from_db(row.try_get("n_fatalities").map_err(backend)?),
            n_injured: count_from_db(row.try_get("n_injured").map_err(backend)?),
            party_size: count_from_db(row.try_get("party_size").map_err(backend)?),
            date_event_start: row.try_get("date_event_start").map_err(backend)?,
            date_event_end: row.try_get("date_event_end").map_err(backend)?,
            date_of_death: row.try_get("date_of_death").map_err(backend)?,
            date_recovery: row.try_get("date_recovery").map_err(backend)?,
            time_to_recovery_days: count_from_db(
                row.try_get("time_to_recovery_days").map_err(backend)?,
            ),
            iso_country: row.try_get("iso_country").map_err(backend)?,
            admin_area: row.try_get("admin_area").map_err(backend)?,
            tz_local: row.try_get("tz_local").map_err(backend)?,
            phase: row.try_get("phase").map_err(backend)?,
            names_all: row.try_get("names_all").map_err(backend)?,
            names_deceased: row.try_get("names_deceased").map_err(backend)?,
            names_relatives: row.try_get("names_relatives").map_err(backend)?,
            names_responders: row.try_get("names_responders").map_err(backend)?,
            names_spokespersons: row.try_get("names_spokespersons").map_err(backend)?,
            names_medics: row.try_get("names_medics").map_err(backend)?,
            lat: row.try_get("lat").map_err(backend)?,
            lon: row.try_get("lon").map_err(backend)?,
            created_at: row.try_get("created_at").map_err(backend)?,
            updated_at: row.try_get("updated_at").map_err(backend)?,
        })
    }

    fn map_source(row: &PgRow) -> StoreResult<SourceDocument> {
        let quoted_evidence = row
            .try_get::<Option<serde_json::Value>, _>("quoted_evidence")
            .map_err(backend)?
            .and_then(|value| serde_json::from_value::<QuotedEvidence>(value).ok());
        Ok(SourceDocument {
            source_id: row.try_get("source_id").map_err(backend)?,
            event_id: row.try_get("event_id").map_err(backend)?,
            url: row.try_get("url").map_err(backend)?,
            publisher: row.try_get("publisher").map_err(backend)?,
            article_title: row.try_get("article_title").map_err(backend)?,
            date_published: row.try_get("date_published").map_err(backend)?,
            cleaned_text: row.try_get("cleaned_text").map_err(backend)?,
            quoted_evidence,
            summary_bullets: row.try_get("summary_bullets").map_err(backend)?,
            date_scraped: row.try_get("date_scraped").map_err(backend)?,
        })
    }

    async fn write_event(&self, record: &IncidentRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE events SET
                jurisdiction = $2, location_name = $3, peak_name = $4,
                route_name = $5, event_type = $6, activity = $7,
                cause_primary = $8, contributing_factors = $9,
                n_fatalities = $10, n_injured = $11, party_size = $12,
                date_event_start = $13, date_event_end = $14,
                date_of_death = $15, date_recovery = $16,
                time_to_recovery_days = $17, iso_country = $18,
                admin_area = $19, tz_local = $20, phase = $21,
                names_all = $22, names_deceased = $23, names_relatives = $24,
                names_responders = $25, names_spokespersons = $26,
                names_medics = $27, updated_at = $28
            WHERE event_id = $1
            "#,
        )
        .bind(record.event_id)
        .bind(record.jurisdiction.map(|j| j.code()))
        .bind(&record.location_name)
        .bind(&record.peak_name)
        .bind(&record.route_name)
        .bind(&record.event_type)
        .bind(record.activity.map(|a| a.as_str()))
        .bind(&record.cause_primary)
        .bind(&record.contributing_factors)
        .bind(count_to_db(record.n_fatalities))
        .bind(count_to_db(record.n_injured))
        .bind(count_to_db(record.party_size))
        .bind(record.date_event_start)
        .bind(record.date_event_end)
        .bind(record.date_of_death)
        .bind(record.date_recovery)
        .bind(count_to_db(record.time_to_recovery_days))
        .bind(&record.iso_country)
        .bind(&record.admin_area)
        .bind(&record.tz_local)
        .bind(&record.phase)
        .bind(&record.names_all)
        .bind(&record.names_deceased)
        .bind(&record.names_relatives)
        .bind(&record.names_responders)
        .bind(&record.names_spokespersons)
        .bind(&record.names_medics)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for PostgresStore {
    async fn get_source_by_url(&self, url: &str) -> StoreResult<Option<SourceRef>> {
        let row = sqlx::query("SELECT source_id, event_id FROM sources WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|row| {
            Ok(SourceRef {
                source_id: row.try_get("source_id").map_err(backend)?,
                event_id: row.try_get("event_id").map_err(backend)?,
            })
        })
        .transpose()
    }

    async fn create_incident(&self) -> StoreResult<IncidentRecord> {
        let record = IncidentRecord::new(Uuid::new_v4());
        sqlx::query("INSERT INTO events (event_id, created_at) VALUES ($1, $2)")
            .bind(record.event_id)
            .bind(record.created_at)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(record)
    }

    async fn create_source(&self, source: NewSource) -> StoreResult<SourceDocument> {
        sqlx::query(
            r#"
            INSERT INTO sources (
                source_id, event_id, url, publisher, article_title,
                date_published, cleaned_text, date_scraped
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source.event_id)
        .bind(&source.url)
        .bind(&source.publisher)
        .bind(&source.article_title)
        .bind(source.date_published)
        .bind(&source.cleaned_text)
        .bind(source.date_scraped)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        // Either our insert or the concurrent winner's row
        let row = sqlx::query("SELECT * FROM sources WHERE url = $1")
            .bind(&source.url)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::DuplicateUrl { url: source.url })?;
        Self::map_source(&row)
    }

    async fn get_incident(&self, event_id: Uuid) -> StoreResult<Option<IncidentRecord>> {
        let row = sqlx::query("SELECT * FROM events WHERE event_id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|row| Self::map_event(&row)).transpose()
    }

    async fn sources_for_incident(&self, event_id: Uuid) -> StoreResult<Vec<SourceDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM sources
            WHERE event_id = $1
            ORDER BY date_published DESC NULLS LAST, date_scraped DESC NULLS LAST
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(Self::map_source).collect()
    }

    async fn update_incident(&self, event_id: Uuid, patch: &IncidentPatch) -> StoreResult<()> {
        let Some(mut record) = self.get_incident(event_id).await? else {
            return Ok(());
        };
        patch.apply(&mut record);
        self.write_event(&record).await
    }

    async fn update_source_annotations(
        &self,
        source_id: Uuid,
        quoted_evidence: Option<&QuotedEvidence>,
        summary_bullets: Option<&[String]>,
    ) -> StoreResult<()> {
        let evidence_json = quoted_evidence
            .map(|e| serde_json::to_value(e).unwrap_or(serde_json::Value::Null));
        sqlx::query(
            r#"
            UPDATE sources SET
                quoted_evidence = COALESCE($2, quoted_evidence),
                summary_bullets = COALESCE($3, summary_bullets)
            WHERE source_id = $1
            "#,
        )
        .bind(source_id)
        .bind(evidence_json)
        .bind(summary_bullets.map(|b| b.to_vec()))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn update_source_metadata(
        &self,
        source_id: Uuid,
        patch: &SourceMetaPatch,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE sources SET
                publisher = COALESCE($2, publisher),
                article_title = COALESCE($3, article_title),
                date_published = COALESCE($4, date_published)
            WHERE source_id = $1
            "#,
        )
        .bind(source_id)
        .bind(&patch.publisher)
        .bind(&patch.article_title)
        .bind(patch.date_published)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn replace_sar_segments(
        &self,
        event_id: Uuid,
        segments: &[SarSegment],
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query("DELETE FROM sar_ops WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        for segment in segments {
            sqlx::query(
                r#"
                INSERT INTO sar_ops (sar_id, event_id, op_type, agency, started_at, ended_at, outcome)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(segment.op_type.as_str())
            .bind(&segment.agency)
            .bind(segment.started_at)
            .bind(segment.ended_at)
            .bind(&segment.outcome)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)
    }

    async fn sar_segments(&self, event_id: Uuid) -> StoreResult<Vec<SarSegment>> {
        let rows = sqlx::query(
            "SELECT op_type, agency, started_at, ended_at, outcome FROM sar_ops WHERE event_id = $1 ORDER BY started_at NULLS LAST",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let op_type: String = row.try_get("op_type").map_err(backend)?;
                Ok(SarSegment {
                    op_type: SarOpType::parse(&op_type).unwrap_or(SarOpType::Search),
                    agency: row.try_get("agency").map_err(backend)?,
                    started_at: row
                        .try_get::<Option<DateTime<Utc>>, _>("started_at")
                        .map_err(backend)?,
                    ended_at: row
                        .try_get::<Option<DateTime<Utc>>, _>("ended_at")
                        .map_err(backend)?,
                    outcome: row.try_get("outcome").map_err(backend)?,
                })
            })
            .collect()
    }

    async fn set_geocode(
        &self,
        event_id: Uuid,
        hit: &GeocodeHit,
        tz_local: Option<&str>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE events SET
                lat = $2, lon = $3,
                iso_country = COALESCE(iso_country, $4),
                admin_area = COALESCE(admin_area, $5),
                tz_local = COALESCE(tz_local, $6),
                updated_at = $7
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .bind(hit.lat)
        .bind(hit.lon)
        .bind(&hit.iso_country)
        .bind(&hit.admin_area)
        .bind(tz_local)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}
