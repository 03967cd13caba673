use std::{sync::Arc, time::Duration};

use serenity::async_trait;
use sqlx::{
    types::{
        chrono::{DateTime, Utc},
        Json,
    },
    PgPool,
};

use crate::{
    course::{Query, SectionRecord},
    source::CourseSource,
};

/// A snapshot of every section of one course offering.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseRecord {
    pub timestamp: DateTime<Utc>,
    pub sections: Vec<SectionRecord>,
}

impl CourseRecord {
    pub fn find(&self, section: &str) -> Option<&SectionRecord> {
        self.sections.iter().find(|record| record.is_section(section))
    }
}

#[derive(Debug)]
pub enum ClassUpdate {
    /// The cached snapshot was recent enough.
    Cached(CourseRecord),
    Fresh {
        old: Option<CourseRecord>,
        new: CourseRecord,
    },
}

/// Where commands read and write course snapshots.
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// The most recent snapshot, if any was ever taken.
    async fn get(&self, query: &Query) -> Result<Option<CourseRecord>, FetchClassError>;

    /// Fetches from the source and stores the result as the newest snapshot.
    async fn update(&self, query: &Query) -> Result<CourseRecord, FetchClassError>;

    /// Drops every snapshot older than `max_age`, returns how many went.
    async fn purge(&self, max_age: Duration) -> Result<u64, FetchClassError>;

    async fn get_or_update(
        &self,
        query: &Query,
        max_age: Duration,
    ) -> Result<ClassUpdate, FetchClassError> {
        let old = self.get(query).await?;
        match old {
            Some(record) if !is_stale(record.timestamp, Utc::now(), max_age) => {
                Ok(ClassUpdate::Cached(record))
            }
            old => Ok(ClassUpdate::Fresh {
                new: self.update(query).await?,
                old,
            }),
        }
    }
}

/// Whether a snapshot taken at `timestamp` is too old at `now`.
pub fn is_stale(timestamp: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    match (now - timestamp).to_std() {
        Ok(age) => age >= max_age,
        // stamped in the future, clocks disagree
        Err(_) => false,
    }
}

pub struct Cache {
    pool: PgPool,
    source: Arc<dyn CourseSource>,
}

impl Cache {
    pub fn new(pool: PgPool, source: Arc<dyn CourseSource>) -> Self {
        Self { pool, source }
    }
}

#[async_trait]
impl CourseStore for Cache {
    async fn get(&self, query: &Query) -> Result<Option<CourseRecord>, FetchClassError> {
        let latest = sqlx::query_as::<_, (DateTime<Utc>, Json<Vec<SectionRecord>>)>(
            r#"
SELECT timestamp, data
FROM cache
WHERE
  course = $1
  AND
  semester = $2
  AND
  career = $3
ORDER BY timestamp DESC
LIMIT 1;
            "#,
        )
        .bind(&query.course)
        .bind(&query.semester)
        .bind(&query.career)
        .fetch_optional(&self.pool)
        .await?;

        Ok(latest.map(|(timestamp, data)| CourseRecord {
            timestamp,
            sections: data.0,
        }))
    }

    async fn update(&self, query: &Query) -> Result<CourseRecord, FetchClassError> {
        let sections = self.source.fetch(query).await?;
        if sections.is_empty() {
            return Err(FetchClassError::CourseNotFound(query.course.clone()));
        }

        let record = CourseRecord {
            timestamp: Utc::now(),
            sections,
        };
        sqlx::query(
            r#"
INSERT INTO cache (timestamp, course, semester, career, data)
VALUES ($1, $2, $3, $4, $5);
            "#,
        )
        .bind(record.timestamp)
        .bind(&query.course)
        .bind(&query.semester)
        .bind(&query.career)
        .bind(Json(&record.sections))
        .execute(&self.pool)
        .await?;

        tracing::info!(
            course = %query.course,
            semester = %query.semester,
            sections = record.sections.len(),
            "cached course"
        );
        Ok(record)
    }

    async fn purge(&self, max_age: Duration) -> Result<u64, FetchClassError> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let result = sqlx::query("DELETE FROM cache WHERE timestamp < $1;")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchClassError {
    #[error(transparent)]
    Source(#[from] reqwest::Error),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error("invalid course source url: {0}")]
    BaseUrl(String),
    #[error("course {0} was not found")]
    CourseNotFound(String),
    #[error("section {0} was not found")]
    SectionNotFound(String),
}
