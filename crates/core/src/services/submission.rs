//! Submission service: the showcase lifecycle on top of forum threads.
//!
//! A submission is a thread tagged as a showcase entry, plus a moderation
//! report that puts it on the review queue. Thread extension data holds the
//! canonical status; the report is only the queue entry and is brought in
//! line with the thread on every review and by [`SubmissionService::reconcile`].

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use showcase_common::{AppError, AppResult, Config, FieldErrors};
use showcase_forum::{
    ForumGateway, NewReport, NewThread, Report, ReportQuery, ReportStatus, SharedGateway, Thread,
    ThreadQuery,
};
use validator::Validate;

use super::listing_cache::ListingCache;
use super::pagination::drain_pages;
use super::session::{Viewer, require_admin, require_viewer};
use super::showcase_data::{
    ImageUpload, SUBMISSION_TYPE, ShowcaseData, Submission, SubmissionStatus, to_submission,
    with_status,
};
use super::voting::count_likes;

/// Input for submitting a project.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionInput {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub title: String,

    #[validate(length(min = 10, max = 5000, message = "must be 10 to 5000 characters"))]
    pub description: String,

    #[validate(
        length(min = 1, max = 10, message = "must contain 1 to 10 images"),
        nested
    )]
    pub images: Vec<ImageUpload>,

    #[serde(default)]
    #[validate(range(min = 0, message = "must not be negative"))]
    pub main_image_index: i64,

    #[serde(default)]
    #[validate(url(message = "must be a valid URL"))]
    pub project_url: Option<String>,
}

impl CreateSubmissionInput {
    /// Trim text fields and treat an empty project link as none.
    fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            images: self
                .images
                .into_iter()
                .map(|image| ImageUpload {
                    url: image.url.trim().to_string(),
                    name: image.name.trim().to_string(),
                })
                .collect(),
            main_image_index: self.main_image_index,
            project_url: self
                .project_url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
        }
    }
}

/// Identity of a newly created submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSubmission {
    pub id: String,
    /// Review queue entry; absent when filing it failed.
    pub report_id: Option<String>,
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// Open reports closed to match an already reviewed thread.
    pub reports_synced: usize,
    /// Reports filed for pending threads missing from the queue.
    pub reports_created: usize,
    /// Reports pointing at deleted or non-showcase threads.
    pub skipped: usize,
    /// Repairs that failed and will be retried by the next pass.
    pub failed: usize,
}

impl ReconcileSummary {
    /// Whether the pass wrote anything.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.reports_synced > 0 || self.reports_created > 0
    }
}

/// Load the thread behind submission `id` if `viewer` may see it.
///
/// Approved submissions are public; the rest are visible to their author
/// and to admins. Threads that are not submissions, and submissions the
/// viewer may not see, are reported as missing.
pub(crate) async fn visible_submission(
    gateway: &dyn ForumGateway,
    viewer: Option<&Viewer>,
    id: &str,
) -> AppResult<Thread> {
    let thread = gateway
        .retrieve_thread(viewer.and_then(Viewer::token), id)
        .await?;
    if !ShowcaseData::is_showcase(&thread.extended_data) {
        return Err(AppError::NotFound(format!("Submission {id} not found")));
    }

    let visible = ShowcaseData::decode(&thread.extended_data).status == SubmissionStatus::Approved
        || viewer.is_some_and(|v| v.is_admin || v.id == thread.user_id);
    if !visible {
        return Err(AppError::NotFound(format!("Submission {id} not found")));
    }
    Ok(thread)
}

/// Submission service.
#[derive(Clone)]
pub struct SubmissionService {
    gateway: SharedGateway,
    listing_cache: ListingCache<Vec<Submission>>,
    page_size: u32,
    max_pages: usize,
    concurrency: usize,
}

impl SubmissionService {
    /// Create a new submission service.
    #[must_use]
    pub fn new(
        gateway: SharedGateway,
        config: &Config,
        listing_cache: ListingCache<Vec<Submission>>,
    ) -> Self {
        Self {
            gateway,
            listing_cache,
            page_size: config.forum.page_size,
            max_pages: config.showcase.max_pages,
            concurrency: config.showcase.pending_fetch_concurrency.max(1),
        }
    }

    /// Submit a project for review.
    ///
    /// Creates the thread, then files its review report. The two writes are
    /// independent: if the report cannot be filed the submission still
    /// exists, is visible to its author, and is picked up by the next
    /// [`reconcile`](Self::reconcile).
    pub async fn create(
        &self,
        viewer: Option<&Viewer>,
        input: CreateSubmissionInput,
    ) -> AppResult<CreatedSubmission> {
        let viewer = require_viewer(viewer)?;
        let input = input.normalized();
        input.validate()?;

        let data = ShowcaseData {
            images: input.images,
            main_image_index: usize::try_from(input.main_image_index).unwrap_or(0),
            project_url: input.project_url,
            status: SubmissionStatus::Pending,
            author_name: viewer.author_name().to_string(),
        };

        let thread = self
            .gateway
            .create_thread(
                viewer.token(),
                NewThread {
                    title: input.title,
                    body: input.description,
                    extended_data: data.encode(),
                },
            )
            .await?;

        let report_id = match self.file_report(viewer.token(), &thread).await {
            Ok(report) => Some(report.id),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    thread_id = %thread.id,
                    "Submission created without a review report"
                );
                None
            }
        };

        tracing::info!(
            thread_id = %thread.id,
            user_id = %viewer.id,
            report_id = ?report_id,
            "Submission created"
        );

        Ok(CreatedSubmission {
            id: thread.id,
            report_id,
        })
    }

    /// Approved submissions, visible to everyone.
    ///
    /// Served from the listing cache while fresh. Backend failures yield an
    /// empty list, which is not cached.
    pub async fn list_approved(&self) -> Vec<Submission> {
        if let Some(cached) = self.listing_cache.get().await {
            return cached;
        }
        let generation = self.listing_cache.generation().await;

        let threads = match self.drain_threads(None, None).await {
            Ok(threads) => threads,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list approved submissions");
                return Vec::new();
            }
        };

        let approved = threads
            .iter()
            .filter(|t| ShowcaseData::is_showcase(&t.extended_data))
            .map(|t| to_submission(t, None))
            .filter(|s| s.status == SubmissionStatus::Approved)
            .collect();
        let approved = self.with_upvotes(approved).await;

        self.listing_cache.store(generation, approved.clone()).await;
        approved
    }

    /// The viewer's own submissions in any status. Empty when signed out.
    pub async fn list_mine(&self, viewer: Option<&Viewer>) -> Vec<Submission> {
        let Some(viewer) = viewer else {
            return Vec::new();
        };

        let threads = match self
            .drain_threads(viewer.token(), Some(viewer.id.clone()))
            .await
        {
            Ok(threads) => threads,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %viewer.id, "Failed to list own submissions");
                return Vec::new();
            }
        };

        let mine = threads
            .iter()
            .filter(|t| t.user_id == viewer.id && ShowcaseData::is_showcase(&t.extended_data))
            .map(|t| to_submission(t, None))
            .collect();
        self.with_upvotes(mine).await
    }

    /// The review queue. Empty for anyone but an admin.
    ///
    /// Each open report is joined with its thread; lookups run concurrently.
    /// A report whose thread is gone, unreadable, or already reviewed is
    /// left out rather than failing the whole queue.
    pub async fn list_pending(&self, viewer: Option<&Viewer>) -> Vec<Submission> {
        let Ok(admin) = require_admin(viewer) else {
            return Vec::new();
        };

        let reports = match self.drain_open_reports(admin.token()).await {
            Ok(reports) => reports,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list pending submissions");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let reports: Vec<(String, Report)> = reports
            .into_iter()
            .filter_map(|r| Some((r.thread_id.clone()?, r)))
            .filter(|(thread_id, _)| seen.insert(thread_id.clone()))
            .collect();

        let resolved = self.resolve_threads(admin.token(), reports).await;

        let mut pending = Vec::with_capacity(resolved.len());
        for (thread_id, report, result) in resolved {
            match result {
                Ok(thread) if ShowcaseData::is_showcase(&thread.extended_data) => {
                    let submission = to_submission(&thread, Some(&report));
                    if submission.status == SubmissionStatus::Pending {
                        pending.push(submission);
                    } else {
                        tracing::warn!(
                            thread_id = %thread_id,
                            report_id = %report.id,
                            status = submission.status.as_str(),
                            "Open report for an already reviewed submission"
                        );
                    }
                }
                Ok(_) => {
                    tracing::debug!(thread_id = %thread_id, report_id = %report.id, "Report target is not a submission");
                }
                Err(AppError::NotFound(_)) => {
                    tracing::debug!(thread_id = %thread_id, report_id = %report.id, "Report target was deleted");
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        thread_id = %thread_id,
                        report_id = %report.id,
                        "Failed to load submission for report"
                    );
                }
            }
        }

        self.with_upvotes(pending).await
    }

    /// One submission by id.
    ///
    /// Approved submissions are public. Anything else is only visible to its
    /// author and to admins; to everyone else it does not exist.
    pub async fn get(&self, viewer: Option<&Viewer>, id: &str) -> AppResult<Submission> {
        let thread = visible_submission(self.gateway.as_ref(), viewer, id).await?;
        Ok(self.counted(to_submission(&thread, None)).await)
    }

    /// Approve a submission and close its review report.
    pub async fn approve(
        &self,
        viewer: Option<&Viewer>,
        thread_id: &str,
        report_id: &str,
    ) -> AppResult<Submission> {
        self.review(viewer, thread_id, report_id, SubmissionStatus::Approved)
            .await
    }

    /// Reject a submission and close its review report.
    pub async fn reject(
        &self,
        viewer: Option<&Viewer>,
        thread_id: &str,
        report_id: &str,
    ) -> AppResult<Submission> {
        self.review(viewer, thread_id, report_id, SubmissionStatus::Rejected)
            .await
    }

    /// Move a submission to `status`.
    ///
    /// The report must have been filed for this thread. The thread is
    /// written first, merging the new status into its current extension
    /// data; the report follows. Both writes are skipped or
    /// repeated harmlessly when replayed, so a failed review can simply be
    /// retried.
    async fn review(
        &self,
        viewer: Option<&Viewer>,
        thread_id: &str,
        report_id: &str,
        status: SubmissionStatus,
    ) -> AppResult<Submission> {
        let admin = require_admin(viewer)?;

        let mut missing = FieldErrors::default();
        if thread_id.trim().is_empty() {
            missing.push("threadId", "is required");
        }
        if report_id.trim().is_empty() {
            missing.push("reportId", "is required");
        }
        if !missing.is_empty() {
            return Err(AppError::Validation(missing));
        }

        let mut thread = self
            .gateway
            .retrieve_thread(admin.token(), thread_id)
            .await?;
        if !ShowcaseData::is_showcase(&thread.extended_data) {
            return Err(AppError::NotFound(format!(
                "Submission {thread_id} not found"
            )));
        }

        let report = self.find_report(admin.token(), report_id).await?;
        if report.thread_id.as_deref() != Some(thread_id) {
            tracing::warn!(
                thread_id,
                report_id,
                report_thread_id = ?report.thread_id,
                "Review names a report filed for another thread"
            );
            return Err(AppError::invalid_field(
                "reportId",
                "does not belong to this submission",
            ));
        }

        let current = ShowcaseData::decode(&thread.extended_data).status;
        if current == status {
            tracing::debug!(thread_id, status = status.as_str(), "Submission already in target status");
        } else {
            let merged = with_status(&thread.extended_data, status).ok_or_else(|| {
                AppError::NotFound(format!("Submission {thread_id} not found"))
            })?;
            thread = self
                .gateway
                .update_thread(admin.token(), thread_id, merged)
                .await?;
            self.listing_cache.invalidate().await;
        }

        if let Err(e) = self
            .gateway
            .update_report(admin.token(), report_id, status.into())
            .await
        {
            tracing::warn!(
                error = %e,
                thread_id,
                report_id,
                status = status.as_str(),
                "Submission reviewed but its report was not updated"
            );
            return Err(e);
        }

        tracing::info!(
            thread_id,
            report_id,
            moderator_id = %admin.id,
            from = current.as_str(),
            to = status.as_str(),
            "Submission reviewed"
        );

        Ok(self.counted(to_submission(&thread, None)).await)
    }

    /// Repair divergence left behind by partially failed writes.
    ///
    /// Open reports whose thread was already reviewed are closed with the
    /// thread's status, and pending threads without an open report get one.
    /// Safe to run at any time and as often as needed.
    pub async fn reconcile(&self, viewer: Option<&Viewer>) -> AppResult<ReconcileSummary> {
        let admin = require_admin(viewer)?;
        let token = admin.token();
        let mut summary = ReconcileSummary::default();

        // Threads before reports: a submission landing between the two drains
        // then has its report seen without its thread, never the reverse.
        let threads = self.drain_threads(token, None).await?;
        let reports = self.drain_open_reports(token).await?;
        let reports: Vec<(String, Report)> = reports
            .into_iter()
            .filter_map(|r| Some((r.thread_id.clone()?, r)))
            .collect();
        let queued: HashSet<String> = reports.iter().map(|(id, _)| id.clone()).collect();

        for (thread_id, report, result) in self.resolve_threads(token, reports).await {
            let thread = match result {
                Ok(thread) if ShowcaseData::is_showcase(&thread.extended_data) => thread,
                Ok(_) | Err(AppError::NotFound(_)) => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, thread_id = %thread_id, "Reconcile could not load thread");
                    summary.failed += 1;
                    continue;
                }
            };

            let status = ShowcaseData::decode(&thread.extended_data).status;
            if status == SubmissionStatus::Pending {
                continue;
            }
            match self
                .gateway
                .update_report(token, &report.id, status.into())
                .await
            {
                Ok(_) => {
                    tracing::info!(thread_id = %thread_id, report_id = %report.id, status = status.as_str(), "Report synced to submission status");
                    summary.reports_synced += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, thread_id = %thread_id, report_id = %report.id, "Failed to sync report");
                    summary.failed += 1;
                }
            }
        }

        for thread in threads.iter().filter(|t| {
            ShowcaseData::is_showcase(&t.extended_data)
                && ShowcaseData::decode(&t.extended_data).status == SubmissionStatus::Pending
                && !queued.contains(&t.id)
        }) {
            match self.file_report(token, thread).await {
                Ok(report) => {
                    tracing::info!(thread_id = %thread.id, report_id = %report.id, "Review report filed for orphaned submission");
                    summary.reports_created += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, thread_id = %thread.id, "Failed to file review report");
                    summary.failed += 1;
                }
            }
        }

        if summary.changed() {
            self.listing_cache.invalidate().await;
        }
        tracing::info!(
            reports_synced = summary.reports_synced,
            reports_created = summary.reports_created,
            skipped = summary.skipped,
            failed = summary.failed,
            "Reconciliation finished"
        );

        Ok(summary)
    }

    // ========== Helpers ==========

    async fn file_report(&self, token: Option<&str>, thread: &Thread) -> AppResult<Report> {
        self.gateway
            .create_report(
                token,
                NewReport {
                    thread_id: thread.id.clone(),
                    report_type: SUBMISSION_TYPE.to_string(),
                    description: Some(format!("Showcase submission: {}", thread.title)),
                    status: ReportStatus::Pending,
                },
            )
            .await
    }

    async fn drain_threads(
        &self,
        token: Option<&str>,
        user_id: Option<String>,
    ) -> AppResult<Vec<Thread>> {
        drain_pages(self.max_pages, |cursor| {
            self.gateway.list_threads(
                token,
                ThreadQuery {
                    cursor,
                    limit: self.page_size,
                    user_id: user_id.clone(),
                },
            )
        })
        .await
    }

    /// Open showcase reports.
    async fn drain_open_reports(&self, token: Option<&str>) -> AppResult<Vec<Report>> {
        let reports = drain_pages(self.max_pages, |cursor| {
            self.gateway.list_reports(
                token,
                ReportQuery {
                    cursor,
                    status: Some(ReportStatus::Pending),
                    limit: self.page_size,
                },
            )
        })
        .await?;
        Ok(reports
            .into_iter()
            .filter(|r| r.report_type == SUBMISSION_TYPE && r.status == ReportStatus::Pending)
            .collect())
    }

    /// The showcase report with this id, whatever its status.
    async fn find_report(&self, token: Option<&str>, report_id: &str) -> AppResult<Report> {
        let reports = drain_pages(self.max_pages, |cursor| {
            self.gateway.list_reports(
                token,
                ReportQuery {
                    cursor,
                    status: None,
                    limit: self.page_size,
                },
            )
        })
        .await?;
        reports
            .into_iter()
            .find(|r| r.id == report_id && r.report_type == SUBMISSION_TYPE)
            .ok_or_else(|| AppError::NotFound(format!("Report {report_id} not found")))
    }

    /// Look up the thread behind each report, a bounded number at a time.
    async fn resolve_threads(
        &self,
        token: Option<&str>,
        reports: Vec<(String, Report)>,
    ) -> Vec<(String, Report, AppResult<Thread>)> {
        let gateway: &dyn ForumGateway = self.gateway.as_ref();
        stream::iter(reports)
            .map(move |(thread_id, report)| async move {
                let result = gateway.retrieve_thread(token, &thread_id).await;
                (thread_id, report, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Fill in the live upvote count. A count that cannot be read stays 0.
    async fn counted(&self, mut submission: Submission) -> Submission {
        let upvotes = count_likes(self.gateway.as_ref(), self.max_pages, &submission.id).await;
        match upvotes {
            Ok(upvotes) => submission.upvotes = upvotes,
            Err(e) => {
                tracing::warn!(error = %e, thread_id = %submission.id, "Failed to count upvotes");
            }
        }
        submission
    }

    async fn with_upvotes(&self, submissions: Vec<Submission>) -> Vec<Submission> {
        stream::iter(submissions)
            .map(|submission| self.counted(submission))
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
