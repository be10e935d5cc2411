use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Row, Sqlite,
};
use std::str::FromStr;
use tracing::{info, instrument};

use crate::article::{Article, Sentiment};
use crate::digest::DigestRecord;
use crate::languages::Language;
use crate::TARGET_DB;

/// Filter for historical article queries.
#[derive(Clone, Debug, Default)]
pub struct ArticleFilter {
    pub country: Option<String>,
    pub region: Option<String>,
    pub language: Option<String>,
    pub days_back: i64,
    pub sentiment: Option<Sentiment>,
}

#[derive(Clone, Debug, Default)]
pub struct MonitoringStatistics {
    pub total_articles: i64,
    pub positive_count: i64,
    pub negative_count: i64,
    pub neutral_count: i64,
    pub languages_count: i64,
    pub countries_count: i64,
    pub top_languages: Vec<(String, i64)>,
    pub top_countries: Vec<(String, i64)>,
}

/// The persistent store consumed by the engine. All mutating operations are
/// idempotent and safe under retry; implementations must never be required
/// for a run to complete (callers treat write failures as non-fatal).
#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotent by canonical URL; conflicts update derived fields only.
    async fn upsert_articles(&self, articles: &[Article]) -> Result<()>;

    async fn articles_since(&self, filter: &ArticleFilter) -> Result<Vec<Article>>;

    /// Languages not checked within the threshold, never-checked first.
    async fn stale_languages(&self, hours_threshold: i64) -> Result<Vec<String>>;

    async fn languages_for_regions(&self, regions: &[String]) -> Result<Vec<String>>;

    /// Records coverage freshness for a language, found articles or not.
    async fn mark_language_checked(&self, language_code: &str, articles_found: i64) -> Result<()>;

    async fn countries_with_sufficient_data(
        &self,
        min_articles: i64,
        days_back: i64,
    ) -> Result<Vec<String>>;

    async fn save_digest(&self, digest: &DigestRecord) -> Result<()>;

    async fn monitoring_statistics(&self, days_back: i64) -> Result<MonitoringStatistics>;
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Database {
    /// Get access to the database pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    #[instrument(target = "db_query", level = "info")]
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        info!(target: TARGET_DB, "Creating database pool for: {}", database_path);

        let connect_options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", database_path))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        info!(target: TARGET_DB, "Database pool created");

        let db = Database { pool };
        db.initialize_schema().await?;
        db.seed_languages().await?;
        Ok(db)
    }

    /// An in-memory database. Pinned to a single connection so every query
    /// sees the same memory-backed schema.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;

        let db = Database { pool };
        db.initialize_schema().await?;
        db.seed_languages().await?;
        Ok(db)
    }

    async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                normalized_url TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                source_name TEXT NOT NULL,
                source_country TEXT,
                region TEXT,
                source_language TEXT NOT NULL,
                language_name TEXT NOT NULL,
                published_date TEXT,
                first_seen TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                original_content TEXT NOT NULL,
                translated_content TEXT,
                summary TEXT NOT NULL DEFAULT '',
                sentiment TEXT NOT NULL DEFAULT 'neutral',
                sentiment_score REAL NOT NULL DEFAULT 0.0,
                sentiment_explanation TEXT NOT NULL DEFAULT '',
                key_phrases TEXT NOT NULL DEFAULT '[]',
                topics TEXT NOT NULL DEFAULT '[]'
            );
            CREATE INDEX IF NOT EXISTS idx_articles_language ON articles (source_language);
            CREATE INDEX IF NOT EXISTS idx_articles_country_date ON articles (source_country, published_date);
            CREATE INDEX IF NOT EXISTS idx_articles_sentiment ON articles (sentiment);

            CREATE TABLE IF NOT EXISTS language_coverage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                language_code TEXT NOT NULL UNIQUE,
                language_name TEXT NOT NULL,
                region TEXT,
                last_checked TEXT,
                articles_found INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_coverage_region ON language_coverage (region);

            CREATE TABLE IF NOT EXISTS digests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                digest_type TEXT NOT NULL,
                content TEXT NOT NULL,
                articles_count INTEGER NOT NULL,
                languages_covered TEXT NOT NULL DEFAULT '[]',
                generated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        info!(target: TARGET_DB, "Tables ensured to exist");
        Ok(())
    }

    async fn seed_languages(&self) -> Result<(), sqlx::Error> {
        for language in Language::all() {
            sqlx::query(
                r#"
                INSERT INTO language_coverage (language_code, language_name, region)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(language_code) DO NOTHING
                "#,
            )
            .bind(&language.code)
            .bind(&language.name)
            .bind(language.region)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

fn row_to_article(row: &sqlx::sqlite::SqliteRow) -> Article {
    let sentiment: String = row.get("sentiment");
    let key_phrases: String = row.get("key_phrases");
    let topics: String = row.get("topics");
    let published_date: Option<String> = row.get("published_date");
    let first_seen: String = row.get("first_seen");

    Article {
        url: row.get("url"),
        normalized_url: row.get("normalized_url"),
        title: row.get("title"),
        source_name: row.get("source_name"),
        source_country: row.get("source_country"),
        region: row.get("region"),
        source_language: row.get("source_language"),
        language_name: row.get("language_name"),
        published_date: published_date.as_deref().and_then(parse_ts),
        first_seen: parse_ts(&first_seen).unwrap_or_else(Utc::now),
        original_content: row.get("original_content"),
        translated_content: row.get("translated_content"),
        summary: row.get("summary"),
        sentiment: Sentiment::parse(&sentiment).unwrap_or(Sentiment::Neutral),
        sentiment_score: row.get("sentiment_score"),
        sentiment_explanation: row.get("sentiment_explanation"),
        key_phrases: serde_json::from_str(&key_phrases).unwrap_or_default(),
        topics: serde_json::from_str(&topics).unwrap_or_default(),
    }
}

#[async_trait]
impl Store for Database {
    async fn upsert_articles(&self, articles: &[Article]) -> Result<()> {
        let fetched_at = fmt_ts(Utc::now());
        for article in articles {
            sqlx::query(
                r#"
                INSERT INTO articles (
                    url, normalized_url, title, source_name, source_country, region,
                    source_language, language_name, published_date, first_seen, fetched_at,
                    original_content, translated_content, summary, sentiment,
                    sentiment_score, sentiment_explanation, key_phrases, topics
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
                ON CONFLICT(normalized_url) DO UPDATE SET
                    source_country = excluded.source_country,
                    region = excluded.region,
                    published_date = excluded.published_date,
                    fetched_at = excluded.fetched_at,
                    translated_content = excluded.translated_content,
                    summary = excluded.summary,
                    sentiment = excluded.sentiment,
                    sentiment_score = excluded.sentiment_score,
                    sentiment_explanation = excluded.sentiment_explanation,
                    key_phrases = excluded.key_phrases,
                    topics = excluded.topics
                "#,
            )
            .bind(&article.url)
            .bind(&article.normalized_url)
            .bind(&article.title)
            .bind(&article.source_name)
            .bind(&article.source_country)
            .bind(&article.region)
            .bind(&article.source_language)
            .bind(&article.language_name)
            .bind(article.published_date.map(fmt_ts))
            .bind(fmt_ts(article.first_seen))
            .bind(&fetched_at)
            .bind(&article.original_content)
            .bind(&article.translated_content)
            .bind(&article.summary)
            .bind(article.sentiment.as_str())
            .bind(article.sentiment_score)
            .bind(&article.sentiment_explanation)
            .bind(serde_json::to_string(&article.key_phrases)?)
            .bind(serde_json::to_string(&article.topics)?)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn articles_since(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let cutoff = fmt_ts(Utc::now() - Duration::days(filter.days_back));

        let mut sql = String::from(
            "SELECT * FROM articles WHERE COALESCE(published_date, first_seen) >= ?",
        );
        if filter.country.is_some() {
            sql.push_str(" AND source_country = ?");
        }
        if filter.region.is_some() {
            sql.push_str(" AND region = ?");
        }
        if filter.language.is_some() {
            sql.push_str(" AND source_language = ?");
        }
        if filter.sentiment.is_some() {
            sql.push_str(" AND sentiment = ?");
        }
        sql.push_str(" ORDER BY COALESCE(published_date, first_seen) DESC");

        let mut query = sqlx::query(&sql).bind(&cutoff);
        if let Some(country) = &filter.country {
            query = query.bind(country);
        }
        if let Some(region) = &filter.region {
            query = query.bind(region);
        }
        if let Some(language) = &filter.language {
            query = query.bind(language);
        }
        if let Some(sentiment) = &filter.sentiment {
            query = query.bind(sentiment.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_article).collect())
    }

    async fn stale_languages(&self, hours_threshold: i64) -> Result<Vec<String>> {
        let cutoff = fmt_ts(Utc::now() - Duration::hours(hours_threshold));
        let rows = sqlx::query(
            r#"
            SELECT language_code FROM language_coverage
            WHERE last_checked IS NULL OR last_checked < ?1
            ORDER BY last_checked IS NOT NULL, last_checked ASC
            "#,
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("language_code")).collect())
    }

    async fn languages_for_regions(&self, regions: &[String]) -> Result<Vec<String>> {
        if regions.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; regions.len()].join(", ");
        let sql = format!(
            "SELECT DISTINCT language_code FROM language_coverage WHERE region IN ({placeholders}) ORDER BY language_code"
        );
        let mut query = sqlx::query(&sql);
        for region in regions {
            query = query.bind(region);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| row.get("language_code")).collect())
    }

    async fn mark_language_checked(&self, language_code: &str, articles_found: i64) -> Result<()> {
        let language = Language::resolve(language_code);
        sqlx::query(
            r#"
            INSERT INTO language_coverage (language_code, language_name, region, last_checked, articles_found)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(language_code) DO UPDATE SET
                last_checked = excluded.last_checked,
                articles_found = language_coverage.articles_found + excluded.articles_found
            "#,
        )
        .bind(&language.code)
        .bind(&language.name)
        .bind(language.region)
        .bind(fmt_ts(Utc::now()))
        .bind(articles_found)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn countries_with_sufficient_data(
        &self,
        min_articles: i64,
        days_back: i64,
    ) -> Result<Vec<String>> {
        let cutoff = fmt_ts(Utc::now() - Duration::days(days_back));
        let rows = sqlx::query(
            r#"
            SELECT source_country FROM articles
            WHERE COALESCE(published_date, first_seen) >= ?1
              AND source_country IS NOT NULL
            GROUP BY source_country
            HAVING COUNT(*) >= ?2
            ORDER BY COUNT(*) DESC
            "#,
        )
        .bind(&cutoff)
        .bind(min_articles)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("source_country")).collect())
    }

    async fn save_digest(&self, digest: &DigestRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO digests (digest_type, content, articles_count, languages_covered, generated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&digest.digest_type)
        .bind(&digest.content)
        .bind(digest.articles_count)
        .bind(serde_json::to_string(&digest.languages_covered)?)
        .bind(fmt_ts(digest.generated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn monitoring_statistics(&self, days_back: i64) -> Result<MonitoringStatistics> {
        let cutoff = fmt_ts(Utc::now() - Duration::days(days_back));

        let totals = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_articles,
                COALESCE(SUM(CASE WHEN sentiment = 'positive' THEN 1 ELSE 0 END), 0) AS positive_count,
                COALESCE(SUM(CASE WHEN sentiment = 'negative' THEN 1 ELSE 0 END), 0) AS negative_count,
                COALESCE(SUM(CASE WHEN sentiment = 'neutral' THEN 1 ELSE 0 END), 0) AS neutral_count,
                COUNT(DISTINCT source_language) AS languages_count,
                COUNT(DISTINCT source_country) AS countries_count
            FROM articles
            WHERE fetched_at >= ?1
            "#,
        )
        .bind(&cutoff)
        .fetch_one(&self.pool)
        .await?;

        let top_languages = sqlx::query(
            r#"
            SELECT source_language, COUNT(*) AS count FROM articles
            WHERE fetched_at >= ?1
            GROUP BY source_language
            ORDER BY COUNT(*) DESC
            LIMIT 10
            "#,
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?;

        let top_countries = sqlx::query(
            r#"
            SELECT source_country, COUNT(*) AS count FROM articles
            WHERE fetched_at >= ?1 AND source_country IS NOT NULL
            GROUP BY source_country
            ORDER BY COUNT(*) DESC
            LIMIT 10
            "#,
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(MonitoringStatistics {
            total_articles: totals.get("total_articles"),
            positive_count: totals.get("positive_count"),
            negative_count: totals.get("negative_count"),
            neutral_count: totals.get("neutral_count"),
            languages_count: totals.get("languages_count"),
            countries_count: totals.get("countries_count"),
            top_languages: top_languages
                .iter()
                .map(|row| (row.get("source_language"), row.get("count")))
                .collect(),
            top_countries: top_countries
                .iter()
                .map(|row| (row.get("source_country"), row.get("count")))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str, lang: &str) -> Article {
        Article::discovered(url, "title", "content", &Language::resolve(lang), Utc::now())
            .expect("valid url")
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_preserves_originals() {
        let db = Database::in_memory().await.unwrap();

        let mut a = article("https://example.com/story", "tr");
        db.upsert_articles(&[a.clone()]).await.unwrap();

        // Re-ingest with mutated derived fields and a different title.
        a.title = "rewritten title".to_string();
        a.sentiment = Sentiment::Positive;
        a.sentiment_score = 0.9;
        a.summary = "now summarized".to_string();
        db.upsert_articles(&[a.clone()]).await.unwrap();

        let stored = db
            .articles_since(&ArticleFilter {
                days_back: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        // Derived fields updated, original title untouched.
        assert_eq!(stored[0].sentiment, Sentiment::Positive);
        assert_eq!(stored[0].summary, "now summarized");
        assert_eq!(stored[0].title, "title");
    }

    #[tokio::test]
    async fn stale_languages_orders_unchecked_first() {
        let db = Database::in_memory().await.unwrap();

        db.mark_language_checked("tr", 3).await.unwrap();

        let stale = db.stale_languages(24).await.unwrap();
        // tr was just checked and must not be reported stale.
        assert!(!stale.contains(&"tr".to_string()));
        // Everything else is unchecked and therefore stale.
        assert!(stale.contains(&"ru".to_string()));
    }

    #[tokio::test]
    async fn mark_language_checked_accumulates_counts() {
        let db = Database::in_memory().await.unwrap();
        db.mark_language_checked("fa", 2).await.unwrap();
        db.mark_language_checked("fa", 3).await.unwrap();

        let found: i64 =
            sqlx::query("SELECT articles_found FROM language_coverage WHERE language_code = 'fa'")
                .fetch_one(db.pool())
                .await
                .unwrap()
                .get("articles_found");
        assert_eq!(found, 5);
    }

    #[tokio::test]
    async fn sufficient_data_requires_threshold() {
        let db = Database::in_memory().await.unwrap();

        let mut batch = Vec::new();
        for i in 0..5 {
            let mut a = article(&format!("https://tr.example.com/{i}"), "tr");
            a.source_country = Some("TR".to_string());
            batch.push(a);
        }
        let mut ru = article("https://ru.example.com/1", "ru");
        ru.source_country = Some("RU".to_string());
        batch.push(ru);
        db.upsert_articles(&batch).await.unwrap();

        let countries = db.countries_with_sufficient_data(5, 30).await.unwrap();
        assert_eq!(countries, vec!["TR".to_string()]);
    }

    #[tokio::test]
    async fn languages_for_regions_uses_seeded_registry() {
        let db = Database::in_memory().await.unwrap();
        let langs = db
            .languages_for_regions(&["Africa".to_string()])
            .await
            .unwrap();
        assert!(langs.contains(&"sw".to_string()));
        assert!(!langs.contains(&"tr".to_string()));
    }
}
