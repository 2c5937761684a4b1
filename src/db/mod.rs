use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite};

use crate::config::Config;
use crate::error::{map_unique_violation, Result, TierError};
use crate::models::{
    AnalyticsRecord, Ballot, Item, ItemVote, Suggestion, SuggestionStatus, Template, TemplateRating,
    TierList, TierListStatus,
};
use crate::store::TierStore;
use crate::voting::TierScale;

/// `TierStore` backed by SQLite.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(config: &Config) -> Result<Self> {
        Self::connect(&config.database_url, config.max_connections).await
    }

    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tier_lists (
                id TEXT PRIMARY KEY,
                channel_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                tiers TEXT NOT NULL,
                status TEXT NOT NULL,
                start_time TEXT,
                end_time TEXT,
                allow_real_time_updates BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tier_lists_channel_status ON tier_lists (channel_id, status);",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tier_list_items (
                tier_list_id TEXT NOT NULL,
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                image_url TEXT,
                position INTEGER NOT NULL,
                PRIMARY KEY (tier_list_id, id),
                FOREIGN KEY (tier_list_id) REFERENCES tier_lists(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ballots (
                tier_list_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                entries TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (tier_list_id, user_id),
                FOREIGN KEY (tier_list_id) REFERENCES tier_lists(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics (
                tier_list_id TEXT PRIMARY KEY,
                channel_id TEXT NOT NULL,
                title TEXT NOT NULL,
                total_votes INTEGER NOT NULL,
                total_voters INTEGER NOT NULL,
                item_count INTEGER NOT NULL,
                completed_at TEXT NOT NULL,
                tier_distribution TEXT NOT NULL,
                top_items TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_analytics_channel ON analytics (channel_id, completed_at);",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS suggestions (
                id TEXT PRIMARY KEY,
                tier_list_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                item_name TEXT NOT NULL,
                image_url TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (tier_list_id, user_id, item_name),
                FOREIGN KEY (tier_list_id) REFERENCES tier_lists(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Templates are snapshots and outlive the tier list they were published from
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS templates (
                id TEXT PRIMARY KEY,
                tier_list_id TEXT NOT NULL UNIQUE,
                channel_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                items TEXT NOT NULL,
                tiers TEXT NOT NULL,
                category TEXT,
                tags TEXT NOT NULL,
                is_public BOOLEAN NOT NULL DEFAULT FALSE,
                usage_count INTEGER NOT NULL DEFAULT 0,
                average_rating REAL NOT NULL DEFAULT 0,
                total_ratings INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS template_ratings (
                template_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                created_at TEXT NOT NULL,
                PRIMARY KEY (template_id, user_id),
                FOREIGN KEY (template_id) REFERENCES templates(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn load_items(&self, tier_list_id: &str) -> Result<Vec<Item>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, image_url
            FROM tier_list_items
            WHERE tier_list_id = ?
            ORDER BY position
            "#,
        )
        .bind(tier_list_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Item {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    image_url: row.try_get("image_url")?,
                })
            })
            .collect()
    }

    async fn hydrate(&self, row: &SqliteRow) -> Result<TierList> {
        let id: String = row.try_get("id")?;
        let items = self.load_items(&id).await?;
        tier_list_from_row(row, items)
    }
}

const TIER_LIST_COLUMNS: &str = "id, channel_id, title, description, tiers, status, \
    start_time, end_time, allow_real_time_updates, created_at";

fn tier_list_from_row(row: &SqliteRow, items: Vec<Item>) -> Result<TierList> {
    let tiers: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("tiers")?)?;
    let status_str: String = row.try_get("status")?;
    let status = TierListStatus::parse(&status_str)
        .ok_or_else(|| TierError::Corrupt(format!("unknown tier list status: {}", status_str)))?;

    Ok(TierList {
        id: row.try_get("id")?,
        channel_id: row.try_get("channel_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        items,
        tiers: TierScale::new(tiers)?,
        status,
        start_time: parse_optional_time(row.try_get("start_time")?)?,
        end_time: parse_optional_time(row.try_get("end_time")?)?,
        allow_real_time_updates: row.try_get("allow_real_time_updates")?,
        created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn ballot_from_row(row: &SqliteRow) -> Result<Ballot> {
    let entries: Vec<ItemVote> = serde_json::from_str(&row.try_get::<String, _>("entries")?)?;
    Ok(Ballot {
        tier_list_id: row.try_get("tier_list_id")?,
        channel_id: row.try_get("channel_id")?,
        user_id: row.try_get("user_id")?,
        entries,
        created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_time(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn analytics_from_row(row: &SqliteRow) -> Result<AnalyticsRecord> {
    Ok(AnalyticsRecord {
        tier_list_id: row.try_get("tier_list_id")?,
        channel_id: row.try_get("channel_id")?,
        title: row.try_get("title")?,
        total_votes: row.try_get::<i64, _>("total_votes")? as u32,
        total_voters: row.try_get::<i64, _>("total_voters")? as u32,
        item_count: row.try_get::<i64, _>("item_count")? as u32,
        completed_at: parse_time(&row.try_get::<String, _>("completed_at")?)?,
        average_tier_distribution: serde_json::from_str(
            &row.try_get::<String, _>("tier_distribution")?,
        )?,
        top_items: serde_json::from_str(&row.try_get::<String, _>("top_items")?)?,
    })
}

fn suggestion_from_row(row: &SqliteRow) -> Result<Suggestion> {
    let status_str: String = row.try_get("status")?;
    let status = SuggestionStatus::parse(&status_str)
        .ok_or_else(|| TierError::Corrupt(format!("unknown suggestion status: {}", status_str)))?;

    Ok(Suggestion {
        id: row.try_get("id")?,
        tier_list_id: row.try_get("tier_list_id")?,
        channel_id: row.try_get("channel_id")?,
        user_id: row.try_get("user_id")?,
        item_name: row.try_get("item_name")?,
        image_url: row.try_get("image_url")?,
        status,
        created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn template_from_row(row: &SqliteRow) -> Result<Template> {
    let tiers: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("tiers")?)?;
    Ok(Template {
        id: row.try_get("id")?,
        tier_list_id: row.try_get("tier_list_id")?,
        channel_id: row.try_get("channel_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        items: serde_json::from_str(&row.try_get::<String, _>("items")?)?,
        tiers: TierScale::new(tiers)?,
        category: row.try_get("category")?,
        tags: serde_json::from_str(&row.try_get::<String, _>("tags")?)?,
        is_public: row.try_get("is_public")?,
        usage_count: row.try_get::<i64, _>("usage_count")? as u32,
        average_rating: row.try_get("average_rating")?,
        total_ratings: row.try_get::<i64, _>("total_ratings")? as u32,
        created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_time(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn template_rating_from_row(row: &SqliteRow) -> Result<TemplateRating> {
    Ok(TemplateRating {
        template_id: row.try_get("template_id")?,
        user_id: row.try_get("user_id")?,
        rating: row.try_get::<i64, _>("rating")? as u8,
        created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TierError::Corrupt(format!("bad timestamp {}: {}", value, e)))
}

fn parse_optional_time(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_time).transpose()
}

// Rewrites the list row and its items; callers run this inside a transaction
async fn write_tier_list(conn: &mut SqliteConnection, list: &TierList) -> Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE tier_lists
        SET channel_id = ?, title = ?, description = ?, tiers = ?, status = ?,
            start_time = ?, end_time = ?, allow_real_time_updates = ?
        WHERE id = ?
        "#,
    )
    .bind(&list.channel_id)
    .bind(&list.title)
    .bind(&list.description)
    .bind(serde_json::to_string(list.tiers.labels())?)
    .bind(list.status.as_str())
    .bind(list.start_time.map(|dt| dt.to_rfc3339()))
    .bind(list.end_time.map(|dt| dt.to_rfc3339()))
    .bind(list.allow_real_time_updates)
    .bind(&list.id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(TierError::not_found("tier list", &list.id));
    }

    sqlx::query("DELETE FROM tier_list_items WHERE tier_list_id = ?")
        .bind(&list.id)
        .execute(&mut *conn)
        .await?;
    insert_items(conn, list).await
}

async fn insert_items(conn: &mut SqliteConnection, list: &TierList) -> Result<()> {
    for (i, item) in list.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO tier_list_items (tier_list_id, id, name, image_url, position)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&list.id)
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.image_url)
        .bind(i as i64)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_unique_violation(e, "item"))?;
    }
    Ok(())
}

#[async_trait]
impl TierStore for Database {
    async fn create_tier_list(&self, list: &TierList) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tier_lists (id, channel_id, title, description, tiers, status, start_time,
                end_time, allow_real_time_updates, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&list.id)
        .bind(&list.channel_id)
        .bind(&list.title)
        .bind(&list.description)
        .bind(serde_json::to_string(list.tiers.labels())?)
        .bind(list.status.as_str())
        .bind(list.start_time.map(|dt| dt.to_rfc3339()))
        .bind(list.end_time.map(|dt| dt.to_rfc3339()))
        .bind(list.allow_real_time_updates)
        .bind(list.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "tier list"))?;

        insert_items(&mut *tx, list).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_tier_list(&self, id: &str) -> Result<Option<TierList>> {
        let row = sqlx::query(&format!("SELECT {} FROM tier_lists WHERE id = ?", TIER_LIST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_tier_lists(&self, channel_id: &str) -> Result<Vec<TierList>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tier_lists WHERE channel_id = ? ORDER BY created_at DESC, rowid DESC",
            TIER_LIST_COLUMNS
        ))
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;

        let mut lists = Vec::with_capacity(rows.len());
        for row in &rows {
            lists.push(self.hydrate(row).await?);
        }
        Ok(lists)
    }

    async fn save_tier_list(&self, list: &TierList) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_tier_list(&mut *tx, list).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn activate_exclusive(
        &self,
        list: &TierList,
        now: DateTime<Utc>,
    ) -> Result<Vec<TierList>> {
        let mut tx = self.pool.begin().await?;

        let sibling_ids: Vec<String> = sqlx::query(
            "SELECT id FROM tier_lists WHERE channel_id = ? AND status = 'active' AND id != ?",
        )
        .bind(&list.channel_id)
        .bind(&list.id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| row.try_get("id"))
        .collect::<std::result::Result<_, _>>()?;

        for sibling_id in &sibling_ids {
            sqlx::query("UPDATE tier_lists SET status = 'completed', end_time = ? WHERE id = ?")
                .bind(now.to_rfc3339())
                .bind(sibling_id)
                .execute(&mut *tx)
                .await?;
        }

        write_tier_list(&mut *tx, list).await?;
        tx.commit().await?;

        let mut completed = Vec::with_capacity(sibling_ids.len());
        for sibling_id in &sibling_ids {
            if let Some(sibling) = self.get_tier_list(sibling_id).await? {
                completed.push(sibling);
            }
        }
        Ok(completed)
    }

    async fn delete_tier_list(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        for table in ["ballots", "analytics", "suggestions", "tier_list_items"] {
            sqlx::query(&format!("DELETE FROM {} WHERE tier_list_id = ?", table))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        let deleted = sqlx::query("DELETE FROM tier_lists WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn completed_without_analytics(&self) -> Result<Vec<TierList>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM tier_lists
            WHERE status = 'completed'
              AND id NOT IN (SELECT tier_list_id FROM analytics)
            "#,
            TIER_LIST_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut lists = Vec::with_capacity(rows.len());
        for row in &rows {
            lists.push(self.hydrate(row).await?);
        }
        Ok(lists)
    }

    async fn get_ballot(&self, tier_list_id: &str, user_id: &str) -> Result<Option<Ballot>> {
        sqlx::query(
            r#"
            SELECT tier_list_id, user_id, channel_id, entries, created_at, updated_at
            FROM ballots
            WHERE tier_list_id = ? AND user_id = ?
            "#,
        )
        .bind(tier_list_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(ballot_from_row)
        .transpose()
    }

    async fn insert_ballot(&self, ballot: &Ballot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ballots (tier_list_id, user_id, channel_id, entries, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&ballot.tier_list_id)
        .bind(&ballot.user_id)
        .bind(&ballot.channel_id)
        .bind(serde_json::to_string(&ballot.entries)?)
        .bind(ballot.created_at.to_rfc3339())
        .bind(ballot.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "ballot"))?;
        Ok(())
    }

    async fn update_ballot(&self, ballot: &Ballot) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE ballots
            SET entries = ?, updated_at = ?
            WHERE tier_list_id = ? AND user_id = ?
            "#,
        )
        .bind(serde_json::to_string(&ballot.entries)?)
        .bind(ballot.updated_at.to_rfc3339())
        .bind(&ballot.tier_list_id)
        .bind(&ballot.user_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(TierError::not_found("ballot for user", &ballot.user_id));
        }
        Ok(())
    }

    async fn list_ballots(&self, tier_list_id: &str) -> Result<Vec<Ballot>> {
        sqlx::query(
            r#"
            SELECT tier_list_id, user_id, channel_id, entries, created_at, updated_at
            FROM ballots
            WHERE tier_list_id = ?
            ORDER BY user_id
            "#,
        )
        .bind(tier_list_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(ballot_from_row)
        .collect()
    }

    async fn delete_ballots(&self, tier_list_id: &str) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM ballots WHERE tier_list_id = ?")
            .bind(tier_list_id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected())
    }

    async fn strip_item_from_ballots(&self, tier_list_id: &str, item_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT tier_list_id, user_id, channel_id, entries, created_at, updated_at
            FROM ballots
            WHERE tier_list_id = ?
            "#,
        )
        .bind(tier_list_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut changed = 0;
        for row in &rows {
            let mut ballot = ballot_from_row(row)?;
            let before = ballot.entries.len();
            ballot.entries.retain(|entry| entry.item_id != item_id);
            if ballot.entries.len() == before {
                continue;
            }

            sqlx::query("UPDATE ballots SET entries = ? WHERE tier_list_id = ? AND user_id = ?")
                .bind(serde_json::to_string(&ballot.entries)?)
                .bind(&ballot.tier_list_id)
                .bind(&ballot.user_id)
                .execute(&mut *tx)
                .await?;
            changed += 1;
        }

        tx.commit().await?;
        Ok(changed)
    }

    async fn upsert_analytics(&self, record: &AnalyticsRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analytics (tier_list_id, channel_id, title, total_votes, total_voters,
                item_count, completed_at, tier_distribution, top_items)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tier_list_id)
            DO UPDATE SET channel_id = excluded.channel_id, title = excluded.title,
                total_votes = excluded.total_votes, total_voters = excluded.total_voters,
                item_count = excluded.item_count, completed_at = excluded.completed_at,
                tier_distribution = excluded.tier_distribution, top_items = excluded.top_items
            "#,
        )
        .bind(&record.tier_list_id)
        .bind(&record.channel_id)
        .bind(&record.title)
        .bind(record.total_votes as i64)
        .bind(record.total_voters as i64)
        .bind(record.item_count as i64)
        .bind(record.completed_at.to_rfc3339())
        .bind(serde_json::to_string(&record.average_tier_distribution)?)
        .bind(serde_json::to_string(&record.top_items)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_analytics(&self, tier_list_id: &str) -> Result<Option<AnalyticsRecord>> {
        sqlx::query("SELECT * FROM analytics WHERE tier_list_id = ?")
            .bind(tier_list_id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(analytics_from_row)
            .transpose()
    }

    async fn delete_analytics(&self, tier_list_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM analytics WHERE tier_list_id = ?")
            .bind(tier_list_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_analytics(&self, channel_id: &str) -> Result<Vec<AnalyticsRecord>> {
        sqlx::query(
            "SELECT * FROM analytics WHERE channel_id = ? ORDER BY completed_at DESC, tier_list_id",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(analytics_from_row)
        .collect()
    }

    async fn create_suggestion(&self, suggestion: &Suggestion) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO suggestions (id, tier_list_id, channel_id, user_id, item_name, image_url,
                status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&suggestion.id)
        .bind(&suggestion.tier_list_id)
        .bind(&suggestion.channel_id)
        .bind(&suggestion.user_id)
        .bind(&suggestion.item_name)
        .bind(&suggestion.image_url)
        .bind(suggestion.status.as_str())
        .bind(suggestion.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "suggestion"))?;
        Ok(())
    }

    async fn get_suggestion(&self, id: &str) -> Result<Option<Suggestion>> {
        sqlx::query("SELECT * FROM suggestions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(suggestion_from_row)
            .transpose()
    }

    async fn list_suggestions(
        &self,
        tier_list_id: &str,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM suggestions WHERE tier_list_id = ? AND status = ? ORDER BY created_at DESC, rowid DESC",
                )
                .bind(tier_list_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM suggestions WHERE tier_list_id = ? ORDER BY created_at DESC, rowid DESC",
                )
                .bind(tier_list_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(suggestion_from_row).collect()
    }

    async fn set_suggestion_status(&self, id: &str, status: SuggestionStatus) -> Result<()> {
        let updated = sqlx::query("UPDATE suggestions SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(TierError::not_found("suggestion", id));
        }
        Ok(())
    }

    async fn get_template(&self, id: &str) -> Result<Option<Template>> {
        sqlx::query("SELECT * FROM templates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(template_from_row)
            .transpose()
    }

    async fn get_template_for_list(&self, tier_list_id: &str) -> Result<Option<Template>> {
        sqlx::query("SELECT * FROM templates WHERE tier_list_id = ?")
            .bind(tier_list_id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(template_from_row)
            .transpose()
    }

    async fn save_template(&self, template: &Template) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO templates (id, tier_list_id, channel_id, title, description, items, tiers,
                category, tags, is_public, usage_count, average_rating, total_ratings,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET title = excluded.title, description = excluded.description,
                items = excluded.items, tiers = excluded.tiers, category = excluded.category,
                tags = excluded.tags, is_public = excluded.is_public,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&template.id)
        .bind(&template.tier_list_id)
        .bind(&template.channel_id)
        .bind(&template.title)
        .bind(&template.description)
        .bind(serde_json::to_string(&template.items)?)
        .bind(serde_json::to_string(template.tiers.labels())?)
        .bind(&template.category)
        .bind(serde_json::to_string(&template.tags)?)
        .bind(template.is_public)
        .bind(template.usage_count as i64)
        .bind(template.average_rating)
        .bind(template.total_ratings as i64)
        .bind(template.created_at.to_rfc3339())
        .bind(template.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "template for this tier list"))?;
        Ok(())
    }

    async fn list_public_templates(&self) -> Result<Vec<Template>> {
        sqlx::query("SELECT * FROM templates WHERE is_public = TRUE")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(template_from_row)
            .collect()
    }

    async fn record_template_use(&self, id: &str) -> Result<()> {
        let updated = sqlx::query("UPDATE templates SET usage_count = usage_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(TierError::not_found("template", id));
        }
        Ok(())
    }

    async fn rate_template(&self, rating: &TemplateRating) -> Result<Template> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT id FROM templates WHERE id = ?")
            .bind(&rating.template_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Err(TierError::not_found("template", &rating.template_id));
        }

        sqlx::query(
            r#"
            INSERT INTO template_ratings (template_id, user_id, rating, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(template_id, user_id)
            DO UPDATE SET rating = excluded.rating, created_at = excluded.created_at
            "#,
        )
        .bind(&rating.template_id)
        .bind(&rating.user_id)
        .bind(rating.rating as i64)
        .bind(rating.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE templates
            SET average_rating = (SELECT AVG(rating) FROM template_ratings WHERE template_id = ?),
                total_ratings = (SELECT COUNT(*) FROM template_ratings WHERE template_id = ?)
            WHERE id = ?
            "#,
        )
        .bind(&rating.template_id)
        .bind(&rating.template_id)
        .bind(&rating.template_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_template(&rating.template_id)
            .await?
            .ok_or_else(|| TierError::not_found("template", &rating.template_id))
    }

    async fn get_template_rating(
        &self,
        template_id: &str,
        user_id: &str,
    ) -> Result<Option<TemplateRating>> {
        sqlx::query("SELECT * FROM template_ratings WHERE template_id = ? AND user_id = ?")
            .bind(template_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(template_rating_from_row)
            .transpose()
    }
}
