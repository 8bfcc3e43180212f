use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::{
    error::{AppError, Result},
    models::{Pagination, StoryListItem, StoryListResponse, StorySort},
    services::boost_service,
};

/// A story's active-boost standing, evaluated against the clock the query
/// runs with.
const ACTIVE_BOOST: &str =
    "EXISTS (SELECT 1 FROM boost_sessions b WHERE b.story_id = s.id AND b.status = 'active' AND b.end_time > ?)";

#[derive(Debug, Clone)]
pub struct StoryQueryParams {
    pub category: Option<String>,
    pub featured: bool,
    pub author_id: Option<String>,
    pub sort: StorySort,
    pub page: u32,
    pub page_size: u32,
}

impl Default for StoryQueryParams {
    fn default() -> Self {
        Self {
            category: None,
            featured: false,
            author_id: None,
            sort: StorySort::Ranked,
            page: 1,
            page_size: 10,
        }
    }
}

/// Filtered, ordered, paginated story listing. Order is always recomputed
/// from current state; the lazy boost sweeps run first so standing
/// reflects expiry and stale pendings at this instant.
pub async fn query(
    db: &SqlitePool,
    params: &StoryQueryParams,
    featured_vote_threshold: i64,
    pending_cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<StoryListResponse> {
    if params.page < 1 || params.page_size < 1 {
        return Err(AppError::Validation(
            "page and page_size must be at least 1".to_string(),
        ));
    }
    let page_size = params.page_size.min(100); // Max 100 per page

    boost_service::expire_overdue(db, now).await?;
    boost_service::cancel_stale_pending(db, pending_cutoff, now).await?;

    // Filters shared by the listing and the count query.
    let mut filters = String::new();
    if params.category.is_some() {
        filters.push_str(" AND LOWER(s.category) LIKE '%' || LOWER(?) || '%'");
    }
    if params.featured {
        filters.push_str(&format!(
            " AND (s.is_priority = 1 OR s.vote_count > ? OR {ACTIVE_BOOST})"
        ));
    }
    if params.author_id.is_some() {
        filters.push_str(" AND s.author_id = ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM stories s WHERE 1=1{filters}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(category) = &params.category {
        count_query = count_query.bind(category);
    }
    if params.featured {
        count_query = count_query.bind(featured_vote_threshold).bind(now);
    }
    if let Some(author_id) = &params.author_id {
        count_query = count_query.bind(author_id);
    }
    let total_matches = count_query.fetch_one(db).await?;

    let order_clause = match params.sort {
        // The ranked order: priority, then live boost standing, then
        // votes, then recency; rowid keeps equal timestamps in catalog
        // insertion order.
        StorySort::Ranked => {
            "s.is_priority DESC, is_boosted DESC, s.vote_count DESC, s.created_at DESC, s.rowid ASC"
        }
        StorySort::Newest => "s.created_at DESC, s.rowid DESC",
        StorySort::Oldest => "s.created_at ASC, s.rowid ASC",
        StorySort::Votes => "s.vote_count DESC, s.created_at DESC, s.rowid ASC",
        StorySort::Title => "s.title ASC, s.rowid ASC",
    };

    let list_sql = format!(
        "SELECT s.*, {ACTIVE_BOOST} AS is_boosted, \
         (SELECT b.end_time FROM boost_sessions b \
          WHERE b.story_id = s.id AND b.status = 'active' AND b.end_time > ? \
          ORDER BY b.end_time DESC LIMIT 1) AS boost_ends_at \
         FROM stories s WHERE 1=1{filters} ORDER BY {order_clause} LIMIT ? OFFSET ?"
    );

    let offset = (params.page as i64 - 1) * page_size as i64;
    let mut list_query = sqlx::query(&list_sql).bind(now).bind(now);
    if let Some(category) = &params.category {
        list_query = list_query.bind(category);
    }
    if params.featured {
        list_query = list_query.bind(featured_vote_threshold).bind(now);
    }
    if let Some(author_id) = &params.author_id {
        list_query = list_query.bind(author_id);
    }
    list_query = list_query.bind(page_size as i64).bind(offset);

    let rows = list_query.fetch_all(db).await?;

    let stories = rows
        .into_iter()
        .map(|row| StoryListItem {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            author_id: row.get("author_id"),
            category: row.get("category"),
            tags: row.get::<sqlx::types::Json<Vec<String>>, _>("tags").0,
            vote_count: row.get("vote_count"),
            is_priority: row.get("is_priority"),
            is_boosted: row.get("is_boosted"),
            boost_ends_at: row.get("boost_ends_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
        .collect();

    let total_matches = total_matches as u32;
    let total_pages = (total_matches + page_size - 1) / page_size;

    Ok(StoryListResponse {
        stories,
        pagination: Pagination {
            current_page: params.page,
            total_pages,
            total_stories: total_matches,
            has_next: params.page < total_pages,
            has_prev: params.page > 1,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoostStatus, CreateStoryRequest, PaymentOutcome};
    use crate::services::{boost_service, story_service};
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;
    use uuid::Uuid;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::database::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn seed(pool: &SqlitePool, title: &str, category: &str, author_id: &str) -> Uuid {
        let payload = CreateStoryRequest {
            title: title.to_string(),
            content: format!("{title} content"),
            author_id: author_id.to_string(),
            category: category.to_string(),
            tags: vec![],
            wants_priority: false,
        };
        story_service::submit(pool, &payload).await.unwrap().id
    }

    async fn set_votes(pool: &SqlitePool, story_id: Uuid, votes: i64) {
        sqlx::query("UPDATE stories SET vote_count = ? WHERE id = ?")
            .bind(votes)
            .bind(story_id)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn set_priority(pool: &SqlitePool, story_id: Uuid) {
        sqlx::query("UPDATE stories SET is_priority = 1 WHERE id = ?")
            .bind(story_id)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn set_created_at(pool: &SqlitePool, story_id: Uuid, at: DateTime<Utc>) {
        sqlx::query("UPDATE stories SET created_at = ? WHERE id = ?")
            .bind(at)
            .bind(story_id)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn activate_boost(pool: &SqlitePool, story_id: Uuid, now: DateTime<Utc>) -> Uuid {
        let session = boost_service::request_boost(pool, story_id, 24, 500)
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        boost_service::mark_pending_payment(&mut conn, session.id, "cs_boost_test")
            .await
            .unwrap();
        drop(conn);
        boost_service::report_payment_outcome(
            pool,
            session.id,
            PaymentOutcome::Completed,
            now,
            now - Duration::minutes(30),
        )
        .await
        .unwrap();
        session.id
    }

    fn params(sort: StorySort) -> StoryQueryParams {
        StoryQueryParams {
            sort,
            ..Default::default()
        }
    }

    async fn run(pool: &SqlitePool, p: &StoryQueryParams) -> StoryListResponse {
        let now = Utc::now();
        query(pool, p, 35, now - Duration::minutes(30), now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn priority_outranks_boost_and_votes() {
        let pool = test_pool().await;
        let now = Utc::now();

        let a = seed(&pool, "A", "Match Moments", "user_001").await;
        set_priority(&pool, a).await;
        set_votes(&pool, a, 5).await;

        let b = seed(&pool, "B", "Match Moments", "user_002").await;
        set_votes(&pool, b, 50).await;
        activate_boost(&pool, b, now).await;

        let response = run(&pool, &params(StorySort::Ranked)).await;
        let titles: Vec<_> = response.stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert!(response.stories[1].is_boosted);
        assert!(response.stories[1].boost_ends_at.is_some());
    }

    #[tokio::test]
    async fn boost_outranks_votes_among_equal_priority() {
        let pool = test_pool().await;
        let now = Utc::now();

        let plain = seed(&pool, "Plain", "General", "user_001").await;
        set_votes(&pool, plain, 40).await;

        let boosted = seed(&pool, "Boosted", "General", "user_002").await;
        set_votes(&pool, boosted, 3).await;
        activate_boost(&pool, boosted, now).await;

        let response = run(&pool, &params(StorySort::Ranked)).await;
        let titles: Vec<_> = response.stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Boosted", "Plain"]);
    }

    #[tokio::test]
    async fn recency_breaks_vote_ties() {
        let pool = test_pool().await;
        let base = Utc::now() - Duration::days(2);

        let c = seed(&pool, "C", "General", "user_001").await;
        set_votes(&pool, c, 10).await;
        set_created_at(&pool, c, base).await;

        let d = seed(&pool, "D", "General", "user_002").await;
        set_votes(&pool, d, 10).await;
        set_created_at(&pool, d, base + Duration::hours(6)).await;

        let response = run(&pool, &params(StorySort::Ranked)).await;
        let titles: Vec<_> = response.stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["D", "C"]);
    }

    #[tokio::test]
    async fn expired_boost_loses_its_standing() {
        let pool = test_pool().await;
        let now = Utc::now();

        let boosted = seed(&pool, "Once Boosted", "General", "user_001").await;
        let boost_id = activate_boost(&pool, boosted, now - Duration::hours(30)).await;

        let plain = seed(&pool, "Plain", "General", "user_002").await;
        set_votes(&pool, plain, 1).await;

        let response = run(&pool, &params(StorySort::Ranked)).await;
        let titles: Vec<_> = response.stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Plain", "Once Boosted"]);
        assert!(!response.stories[1].is_boosted);

        // The query persisted the expiry it observed.
        let stored = boost_service::get(&pool, boost_id).await.unwrap().unwrap();
        assert_eq!(stored.status, BoostStatus::Expired);
    }

    #[tokio::test]
    async fn featured_includes_priority_boosted_and_high_vote_stories() {
        let pool = test_pool().await;
        let now = Utc::now();

        let priority = seed(&pool, "Priority", "General", "user_001").await;
        set_priority(&pool, priority).await;

        let boosted = seed(&pool, "Boosted", "General", "user_002").await;
        activate_boost(&pool, boosted, now).await;

        let popular = seed(&pool, "Popular", "General", "user_003").await;
        set_votes(&pool, popular, 45).await;

        let at_threshold = seed(&pool, "At Threshold", "General", "user_004").await;
        set_votes(&pool, at_threshold, 35).await;

        seed(&pool, "Quiet", "General", "user_005").await;

        let mut p = params(StorySort::Ranked);
        p.featured = true;
        let response = run(&pool, &p).await;

        let mut titles: Vec<_> = response.stories.iter().map(|s| s.title.as_str()).collect();
        titles.sort();
        // Strictly above the threshold; 35 itself does not qualify.
        assert_eq!(titles, vec!["Boosted", "Popular", "Priority"]);
    }

    #[tokio::test]
    async fn category_filter_is_case_insensitive_substring() {
        let pool = test_pool().await;

        seed(&pool, "One", "Match Moments", "user_001").await;
        seed(&pool, "Two", "Personal Stories", "user_002").await;

        let mut p = params(StorySort::Ranked);
        p.category = Some("match".to_string());
        let response = run(&pool, &p).await;

        assert_eq!(response.stories.len(), 1);
        assert_eq!(response.stories[0].title, "One");
    }

    #[tokio::test]
    async fn author_filter_is_exact() {
        let pool = test_pool().await;

        seed(&pool, "Mine", "General", "user_001").await;
        seed(&pool, "Theirs", "General", "user_0011").await;

        let mut p = params(StorySort::Ranked);
        p.author_id = Some("user_001".to_string());
        let response = run(&pool, &p).await;

        assert_eq!(response.stories.len(), 1);
        assert_eq!(response.stories[0].title, "Mine");
    }

    #[tokio::test]
    async fn explicit_sorts_bypass_priority_and_boost() {
        let pool = test_pool().await;
        let base = Utc::now() - Duration::days(1);

        let old = seed(&pool, "Old", "General", "user_001").await;
        set_created_at(&pool, old, base).await;
        set_priority(&pool, old).await;

        let newer = seed(&pool, "New", "General", "user_002").await;
        set_created_at(&pool, newer, base + Duration::hours(1)).await;
        set_votes(&pool, newer, 20).await;

        let by_newest = run(&pool, &params(StorySort::Newest)).await;
        let titles: Vec<_> = by_newest.stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Old"]);

        let by_oldest = run(&pool, &params(StorySort::Oldest)).await;
        let titles: Vec<_> = by_oldest.stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Old", "New"]);

        let by_votes = run(&pool, &params(StorySort::Votes)).await;
        let titles: Vec<_> = by_votes.stories.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Old"]);
    }

    #[tokio::test]
    async fn title_sort_is_case_sensitive() {
        let pool = test_pool().await;

        seed(&pool, "apple", "General", "user_001").await;
        seed(&pool, "Banana", "General", "user_002").await;

        let response = run(&pool, &params(StorySort::Title)).await;
        let titles: Vec<_> = response.stories.iter().map(|s| s.title.as_str()).collect();
        // BINARY collation puts uppercase first.
        assert_eq!(titles, vec!["Banana", "apple"]);
    }

    #[tokio::test]
    async fn pagination_slices_and_reports_metadata() {
        let pool = test_pool().await;
        let base = Utc::now() - Duration::days(1);

        for i in 0..5 {
            let id = seed(&pool, &format!("Story {i}"), "General", "user_001").await;
            set_created_at(&pool, id, base + Duration::minutes(i)).await;
        }

        let mut p = params(StorySort::Oldest);
        p.page_size = 2;

        let first = run(&pool, &p).await;
        assert_eq!(first.stories.len(), 2);
        assert_eq!(first.stories[0].title, "Story 0");
        assert_eq!(first.pagination.total_stories, 5);
        assert_eq!(first.pagination.total_pages, 3);
        assert!(first.pagination.has_next);
        assert!(!first.pagination.has_prev);

        p.page = 3;
        let last = run(&pool, &p).await;
        assert_eq!(last.stories.len(), 1);
        assert_eq!(last.stories[0].title, "Story 4");
        assert!(!last.pagination.has_next);
        assert!(last.pagination.has_prev);
    }

    #[tokio::test]
    async fn page_beyond_the_last_is_empty_not_an_error() {
        let pool = test_pool().await;
        seed(&pool, "Only", "General", "user_001").await;

        let mut p = params(StorySort::Ranked);
        p.page = 7;
        let response = run(&pool, &p).await;

        assert!(response.stories.is_empty());
        assert!(!response.pagination.has_next);
        assert!(response.pagination.has_prev);
        assert_eq!(response.pagination.total_stories, 1);
    }

    #[tokio::test]
    async fn zero_page_or_page_size_is_rejected() {
        let pool = test_pool().await;
        let now = Utc::now();

        let mut p = params(StorySort::Ranked);
        p.page = 0;
        let err = query(&pool, &p, 35, now - Duration::minutes(30), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut p = params(StorySort::Ranked);
        p.page_size = 0;
        let err = query(&pool, &p, 35, now - Duration::minutes(30), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
