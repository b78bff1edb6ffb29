//! Voting service: upvotes as like reactions.

use serde::Serialize;
use showcase_common::{AppError, AppResult};
use showcase_forum::{ForumGateway, ReactionKind, SharedGateway};

use super::listing_cache::ListingCache;
use super::pagination::drain_pages;
use super::session::Viewer;
use super::showcase_data::Submission;
use super::submission::visible_submission;

/// What a toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Liked,
    Unliked,
}

/// Result of a toggle, with the confirmed count after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteResult {
    pub outcome: VoteOutcome,
    pub upvotes: u64,
}

/// Count the like reactions on a thread.
pub(crate) async fn count_likes(
    gateway: &dyn ForumGateway,
    max_pages: usize,
    thread_id: &str,
) -> AppResult<u64> {
    let reactions = drain_pages(max_pages, |cursor| {
        gateway.list_reactions(None, thread_id, cursor)
    })
    .await?;
    Ok(reactions
        .iter()
        .filter(|r| r.kind == ReactionKind::Like)
        .count() as u64)
}

/// Voting service.
#[derive(Clone)]
pub struct VotingService {
    gateway: SharedGateway,
    max_pages: usize,
    listing_cache: ListingCache<Vec<Submission>>,
}

impl VotingService {
    /// Create a new voting service.
    #[must_use]
    pub const fn new(
        gateway: SharedGateway,
        max_pages: usize,
        listing_cache: ListingCache<Vec<Submission>>,
    ) -> Self {
        Self {
            gateway,
            max_pages,
            listing_cache,
        }
    }

    /// Like the submission, or take the like back if the viewer already left one.
    ///
    /// The read and the write are separate calls, so two concurrent toggles
    /// can both act on the same snapshot. Losing that race in either
    /// direction still lands in the state the caller asked for, and is
    /// reported as success. Once the write has gone through the toggle
    /// succeeds even if the new count cannot be read; the count is then 0.
    pub async fn toggle_upvote(&self, viewer: &Viewer, thread_id: &str) -> AppResult<VoteResult> {
        if thread_id.trim().is_empty() {
            return Err(AppError::invalid_field("threadId", "is required"));
        }
        visible_submission(self.gateway.as_ref(), Some(viewer), thread_id).await?;

        let reactions = drain_pages(self.max_pages, |cursor| {
            self.gateway
                .list_reactions(viewer.token(), thread_id, cursor)
        })
        .await?;

        let existing = reactions
            .iter()
            .find(|r| r.kind == ReactionKind::Like && r.user_id == viewer.id);

        let outcome = if let Some(reaction) = existing {
            match self
                .gateway
                .delete_reaction(viewer.token(), thread_id, &reaction.id)
                .await
            {
                Ok(()) => {}
                Err(AppError::NotFound(_)) => {
                    tracing::debug!(thread_id, reaction_id = %reaction.id, "Like already removed");
                }
                Err(e) => return Err(e),
            }
            VoteOutcome::Unliked
        } else {
            match self
                .gateway
                .create_reaction(viewer.token(), thread_id, ReactionKind::Like)
                .await
            {
                Ok(_) => {}
                Err(AppError::Conflict(_)) => {
                    tracing::debug!(thread_id, user_id = %viewer.id, "Like already present");
                }
                Err(e) => return Err(e),
            }
            VoteOutcome::Liked
        };

        self.listing_cache.invalidate().await;

        let upvotes = match count_likes(self.gateway.as_ref(), self.max_pages, thread_id).await {
            Ok(upvotes) => upvotes,
            Err(e) => {
                tracing::warn!(error = %e, thread_id, ?outcome, "Upvote toggled but recount failed");
                0
            }
        };
        tracing::debug!(thread_id, user_id = %viewer.id, ?outcome, upvotes, "Upvote toggled");

        Ok(VoteResult { outcome, upvotes })
    }

    /// Live like count of a submission the viewer can see.
    pub async fn upvotes(&self, viewer: Option<&Viewer>, thread_id: &str) -> AppResult<u64> {
        visible_submission(self.gateway.as_ref(), viewer, thread_id).await?;
        count_likes(self.gateway.as_ref(), self.max_pages, thread_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use showcase_forum::InMemoryForum;
    use std::sync::Arc;
    use std::time::Duration;

    async fn setup() -> (Arc<InMemoryForum>, VotingService, Viewer, String) {
        let forum = Arc::new(InMemoryForum::with_page_size(2));
        let (user, token) = forum.add_user("alice", None).await;
        let thread = forum
            .insert_thread(&user.id, "Demo", json!({"type": "showcase_submission"}))
            .await;
        let service = VotingService::new(
            forum.clone(),
            100,
            ListingCache::new(Duration::from_secs(60)),
        );
        let viewer = Viewer::from_user(user, token, "admin");
        (forum, service, viewer, thread.id)
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_count() {
        let (forum, service, viewer, thread_id) = setup().await;
        let (other, _) = forum.add_user("bob", None).await;
        forum
            .insert_reaction(&thread_id, &other.id, ReactionKind::Like)
            .await;
        let before = service.upvotes(Some(&viewer), &thread_id).await.unwrap();
        assert_eq!(before, 1);

        let first = service.toggle_upvote(&viewer, &thread_id).await.unwrap();
        assert_eq!(first.outcome, VoteOutcome::Liked);
        assert_eq!(first.upvotes, 2);

        let second = service.toggle_upvote(&viewer, &thread_id).await.unwrap();
        assert_eq!(second.outcome, VoteOutcome::Unliked);
        assert_eq!(second.upvotes, before);
    }

    #[tokio::test]
    async fn test_finds_own_like_past_first_page() {
        let (forum, service, viewer, thread_id) = setup().await;
        forum
            .insert_reaction(&thread_id, &viewer.id, ReactionKind::Like)
            .await;
        for name in ["b", "c", "d"] {
            let (user, _) = forum.add_user(name, None).await;
            forum
                .insert_reaction(&thread_id, &user.id, ReactionKind::Dislike)
                .await;
        }

        let result = service.toggle_upvote(&viewer, &thread_id).await.unwrap();
        assert_eq!(result.outcome, VoteOutcome::Unliked);
        assert_eq!(result.upvotes, 0);
    }

    #[tokio::test]
    async fn test_dislikes_are_not_upvotes() {
        let (forum, service, viewer, thread_id) = setup().await;
        forum
            .insert_reaction(&thread_id, &viewer.id, ReactionKind::Dislike)
            .await;

        assert_eq!(service.upvotes(Some(&viewer), &thread_id).await.unwrap(), 0);
        let result = service.toggle_upvote(&viewer, &thread_id).await.unwrap();
        assert_eq!(result.outcome, VoteOutcome::Liked);
        assert_eq!(result.upvotes, 1);
    }

    #[tokio::test]
    async fn test_concurrent_delete_counts_as_unliked() {
        let (forum, service, viewer, thread_id) = setup().await;
        forum
            .insert_reaction(&thread_id, &viewer.id, ReactionKind::Like)
            .await;
        forum.vanish_reaction_deletes(1).await;

        let result = service.toggle_upvote(&viewer, &thread_id).await.unwrap();
        assert_eq!(result.outcome, VoteOutcome::Unliked);
        assert_eq!(result.upvotes, 0);
    }

    #[tokio::test]
    async fn test_duplicate_like_counts_as_liked() {
        let (forum, service, viewer, thread_id) = setup().await;
        forum.enforce_unique_reactions().await;
        forum
            .insert_reaction(&thread_id, &viewer.id, ReactionKind::Like)
            .await;
        forum.stale_reaction_listings(1).await;

        let result = service.toggle_upvote(&viewer, &thread_id).await.unwrap();
        assert_eq!(result.outcome, VoteOutcome::Liked);
        assert_eq!(result.upvotes, 1);
    }

    #[tokio::test]
    async fn test_toggle_on_missing_thread_is_not_found() {
        let (_, service, viewer, _) = setup().await;
        let err = service.toggle_upvote(&viewer, "missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = service.toggle_upvote(&viewer, " ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_toggle_invalidates_listing_cache() {
        let (_, service, viewer, thread_id) = setup().await;
        let generation = service.listing_cache.generation().await;
        service.listing_cache.store(generation, Vec::new()).await;

        service.toggle_upvote(&viewer, &thread_id).await.unwrap();
        assert!(service.listing_cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_toggle_succeeds_when_recount_fails() {
        let (forum, service, viewer, thread_id) = setup().await;
        forum.fail_reaction_listings_after_write().await;

        let result = service.toggle_upvote(&viewer, &thread_id).await.unwrap();
        assert_eq!(result.outcome, VoteOutcome::Liked);
        assert_eq!(result.upvotes, 0);
        assert_eq!(forum.reaction_count(&thread_id, ReactionKind::Like).await, 1);
    }

    #[tokio::test]
    async fn test_votes_follow_submission_visibility() {
        let (forum, service, _, thread_id) = setup().await;
        let (other, token) = forum.add_user("bob", None).await;
        let stranger = Viewer::from_user(other, token, "admin");

        // Pending and not theirs: it does not exist for them.
        let err = service.upvotes(None, &thread_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = service
            .toggle_upvote(&stranger, &thread_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(forum.reaction_count(&thread_id, ReactionKind::Like).await, 0);

        let approved = forum
            .insert_thread(
                &stranger.id,
                "Live",
                json!({"type": "showcase_submission", "status": "approved"}),
            )
            .await;
        assert_eq!(service.upvotes(None, &approved.id).await.unwrap(), 0);

        let chatter = forum
            .insert_thread(&stranger.id, "Chat", json!({"type": "discussion"}))
            .await;
        let err = service.upvotes(None, &chatter.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = service
            .toggle_upvote(&stranger, &chatter.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
