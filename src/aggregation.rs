use crate::error::ServiceError;
use crate::models::PostWithVotes;
use crate::repository::{Page, PostFilter, PostStore, RepoResult, Session, VoteStore};

/// EmptyListPolicy
///
/// What a listing reports when its filter matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyListPolicy {
    /// Report [`ServiceError::EmptyResult`].
    #[default]
    NotFound,
    /// Return an empty collection.
    ReturnEmpty,
}

impl EmptyListPolicy {
    /// Parses `EMPTY_LIST_POLICY`. Unknown values fall back to the default.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "empty" | "return_empty" => EmptyListPolicy::ReturnEmpty,
            _ => EmptyListPolicy::NotFound,
        }
    }

    pub fn apply(self, rows: Vec<PostWithVotes>) -> Result<Vec<PostWithVotes>, ServiceError> {
        if rows.is_empty() && self == EmptyListPolicy::NotFound {
            return Err(ServiceError::EmptyResult);
        }
        Ok(rows)
    }
}

/// posts_with_votes
///
/// Posts matching `filter`, paginated, each paired with its vote count.
/// Equivalent to `posts LEFT JOIN votes GROUP BY post`: a post without votes
/// comes back with a count of 0, never dropped.
pub async fn posts_with_votes(
    session: &mut dyn Session,
    filter: &PostFilter,
    page: Page,
) -> RepoResult<Vec<PostWithVotes>> {
    let posts = session.find_filtered(filter, page).await?;
    let ids: Vec<i32> = posts.iter().map(|p| p.id).collect();
    let counts = session.count_by_posts(&ids).await?;

    Ok(posts
        .into_iter()
        .map(|post| {
            let votes = counts.get(&post.id).copied().unwrap_or(0);
            PostWithVotes { post, votes }
        })
        .collect())
}

/// The single-post form used by reads of one id.
pub async fn post_with_votes(
    session: &mut dyn Session,
    post_id: i32,
) -> RepoResult<Option<PostWithVotes>> {
    let filter = PostFilter {
        id: Some(post_id),
        ..PostFilter::default()
    };
    let page = Page { limit: 1, offset: 0 };
    Ok(posts_with_votes(session, &filter, page).await?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRepository;
    use crate::models::{PostFields, Vote};
    use crate::repository::{IdentityStore, Repository};

    fn fields(title: &str) -> PostFields {
        PostFields {
            title: title.to_string(),
            content: "c".to_string(),
            published: true,
        }
    }

    #[tokio::test]
    async fn zero_vote_posts_are_kept_with_count_zero() {
        let repo = MemoryRepository::new();
        let mut session = repo.begin().await.unwrap();
        let alice = session.insert_user("alice@x.io", "h").await.unwrap();
        let bob = session.insert_user("bob@x.io", "h").await.unwrap();
        let voted = session.insert_post(alice.id, &fields("voted")).await.unwrap();
        let quiet = session.insert_post(alice.id, &fields("quiet")).await.unwrap();
        for user_id in [alice.id, bob.id] {
            session
                .insert_vote(Vote { user_id, post_id: voted.id })
                .await
                .unwrap();
        }

        let page = Page { limit: 10, offset: 0 };
        let rows = posts_with_votes(session.as_mut(), &PostFilter::default(), page)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].post.id, voted.id);
        assert_eq!(rows[0].votes, 2);
        assert_eq!(rows[1].post.id, quiet.id);
        assert_eq!(rows[1].votes, 0);
    }

    #[tokio::test]
    async fn filter_applies_before_the_page_is_cut() {
        let repo = MemoryRepository::new();
        let mut session = repo.begin().await.unwrap();
        let alice = session.insert_user("alice@x.io", "h").await.unwrap();
        for title in ["rust 1", "go", "rust 2", "zig", "rust 3"] {
            session.insert_post(alice.id, &fields(title)).await.unwrap();
        }
        let filter = PostFilter {
            title_contains: Some("rust".to_string()),
            ..PostFilter::default()
        };

        let rows = posts_with_votes(session.as_mut(), &filter, Page { limit: 2, offset: 1 })
            .await
            .unwrap();

        let titles: Vec<_> = rows.iter().map(|r| r.post.title.as_str()).collect();
        assert_eq!(titles, ["rust 2", "rust 3"]);
    }

    #[test]
    fn policy_decides_how_an_empty_listing_is_reported() {
        assert!(matches!(
            EmptyListPolicy::NotFound.apply(vec![]),
            Err(ServiceError::EmptyResult)
        ));
        assert!(EmptyListPolicy::ReturnEmpty.apply(vec![]).unwrap().is_empty());
        assert_eq!(EmptyListPolicy::parse("EMPTY"), EmptyListPolicy::ReturnEmpty);
        assert_eq!(EmptyListPolicy::parse("bogus"), EmptyListPolicy::NotFound);
    }
}
