//! In-memory forum gateway for tests.
//!
//! Behaves like a small forum backend: tokens map to users, listings are
//! cursor-paginated, and moderation endpoints require an admin. Individual
//! calls can be made to fail so partial-failure paths can be exercised.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use showcase_common::{AppError, AppResult};
use tokio::sync::Mutex;

use crate::gateway::ForumGateway;
use crate::models::{
    AuthToken, ForumUser, LoginInput, NewReport, NewThread, Page, Reaction, ReactionKind,
    RegisterInput, Report, ReportQuery, ReportStatus, Thread, ThreadQuery,
};

fn new_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

#[derive(Default)]
struct Failures {
    report_creates: usize,
    report_updates: usize,
    thread_updates: usize,
    thread_lookups: HashSet<String>,
    rate_limit_thread_creates: Option<u64>,
    stale_reaction_listings: usize,
    vanished_reaction_deletes: usize,
    /// Once armed, the first reaction write takes reaction listings down.
    reaction_listings_fail_after_write: bool,
    reaction_listings_down: bool,
}

/// A thread and its open report, published once a report listing is served.
struct Arrival {
    user_id: String,
    title: String,
    extended_data: Value,
    report_type: String,
}

#[derive(Default)]
struct State {
    users: HashMap<String, (ForumUser, String)>,
    tokens: HashMap<String, String>,
    /// Oldest first; listings return newest first.
    threads: Vec<Thread>,
    reports: Vec<Report>,
    reactions: Vec<Reaction>,
    failures: Failures,
    unique_reactions: bool,
    list_thread_calls: usize,
    thread_lookup_delay: Option<StdDuration>,
    arrival_on_report_listing: Option<Arrival>,
}

impl State {
    fn user_for(&self, token: Option<&str>) -> AppResult<ForumUser> {
        let token = token.ok_or(AppError::Unauthorized)?;
        let user_id = self.tokens.get(token).ok_or(AppError::Unauthorized)?;
        self.users
            .get(user_id)
            .map(|(user, _)| user.clone())
            .ok_or(AppError::Unauthorized)
    }

    fn after_reaction_write(&mut self) {
        if self.failures.reaction_listings_fail_after_write {
            self.failures.reaction_listings_down = true;
        }
    }

    fn publish(&mut self, arrival: Arrival) {
        let thread = Thread {
            id: new_id(),
            title: arrival.title,
            body: String::new(),
            user_id: arrival.user_id,
            created_at: Utc::now() + Duration::milliseconds(self.threads.len() as i64),
            extended_data: arrival.extended_data,
        };
        self.reports.push(Report {
            id: new_id(),
            thread_id: Some(thread.id.clone()),
            post_id: None,
            report_type: arrival.report_type,
            description: None,
            status: ReportStatus::Pending,
            created_at: Utc::now(),
        });
        self.threads.push(thread);
    }

    fn admin_for(&self, token: Option<&str>) -> AppResult<ForumUser> {
        let user = self.user_for(token)?;
        if user.is_admin || user.roles.iter().any(|r| r == "admin") {
            Ok(user)
        } else {
            Err(AppError::Forbidden("Moderator access required".to_string()))
        }
    }
}

/// Slice `items` into a page starting at `cursor`.
fn paginate<T: Clone>(items: &[T], cursor: Option<&str>, limit: usize) -> AppResult<Page<T>> {
    let start = match cursor {
        Some(c) => c
            .parse::<usize>()
            .map_err(|_| AppError::BadRequest(format!("Invalid cursor: {c}")))?,
        None => 0,
    };
    let end = (start + limit).min(items.len());
    let page = items.get(start..end).map(<[T]>::to_vec).unwrap_or_default();
    let next_cursor = (end < items.len()).then(|| end.to_string());
    Ok(Page {
        items: page,
        next_cursor,
    })
}

/// In-memory [`ForumGateway`].
pub struct InMemoryForum {
    state: Mutex<State>,
    page_size: usize,
    lookups_in_flight: AtomicUsize,
    max_lookups_in_flight: AtomicUsize,
}

impl Default for InMemoryForum {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryForum {
    /// Create an empty forum serving up to 50 items per page.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(50)
    }

    /// Create an empty forum that never serves more than `page_size` items per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: page_size.max(1),
            lookups_in_flight: AtomicUsize::new(0),
            max_lookups_in_flight: AtomicUsize::new(0),
        }
    }

    fn limit(&self, requested: u32) -> usize {
        if requested == 0 {
            self.page_size
        } else {
            (requested as usize).min(self.page_size)
        }
    }

    /// Add an account and return a token for it.
    pub async fn add_user(&self, username: &str, display_name: Option<&str>) -> (ForumUser, String) {
        self.insert_user(username, display_name, Vec::new()).await
    }

    /// Add an account carrying the `admin` role and return a token for it.
    pub async fn add_admin(&self, username: &str) -> (ForumUser, String) {
        self.insert_user(username, None, vec!["admin".to_string()])
            .await
    }

    async fn insert_user(
        &self,
        username: &str,
        display_name: Option<&str>,
        roles: Vec<String>,
    ) -> (ForumUser, String) {
        let user = ForumUser {
            id: new_id(),
            username: username.to_string(),
            display_name: display_name.map(String::from),
            roles,
            is_admin: false,
        };
        let token = new_id();
        let mut state = self.state.lock().await;
        state
            .users
            .insert(user.id.clone(), (user.clone(), "password".to_string()));
        state.tokens.insert(token.clone(), user.id.clone());
        (user, token)
    }

    /// Insert a thread as-is, bypassing authentication.
    pub async fn insert_thread(&self, user_id: &str, title: &str, extended_data: Value) -> Thread {
        let mut state = self.state.lock().await;
        let thread = Thread {
            id: new_id(),
            title: title.to_string(),
            body: String::new(),
            user_id: user_id.to_string(),
            created_at: Utc::now() + Duration::milliseconds(state.threads.len() as i64),
            extended_data,
        };
        state.threads.push(thread.clone());
        thread
    }

    /// Insert a report as-is, bypassing authentication.
    pub async fn insert_report(
        &self,
        thread_id: &str,
        report_type: &str,
        status: ReportStatus,
    ) -> Report {
        let report = Report {
            id: new_id(),
            thread_id: Some(thread_id.to_string()),
            post_id: None,
            report_type: report_type.to_string(),
            description: None,
            status,
            created_at: Utc::now(),
        };
        self.state.lock().await.reports.push(report.clone());
        report
    }

    /// Remove a thread, leaving any reports pointing at it dangling.
    pub async fn delete_thread(&self, id: &str) {
        self.state.lock().await.threads.retain(|t| t.id != id);
    }

    /// Snapshot of a thread.
    pub async fn thread(&self, id: &str) -> Option<Thread> {
        self.state
            .lock()
            .await
            .threads
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    /// Snapshot of a report.
    pub async fn report(&self, id: &str) -> Option<Report> {
        self.state
            .lock()
            .await
            .reports
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Snapshot of all reports.
    pub async fn reports(&self) -> Vec<Report> {
        self.state.lock().await.reports.clone()
    }

    /// Number of reactions of `kind` on a thread.
    pub async fn reaction_count(&self, thread_id: &str, kind: ReactionKind) -> usize {
        self.state
            .lock()
            .await
            .reactions
            .iter()
            .filter(|r| r.thread_id.as_deref() == Some(thread_id) && r.kind == kind)
            .count()
    }

    /// Number of `threads.list` calls served so far.
    pub async fn list_thread_calls(&self) -> usize {
        self.state.lock().await.list_thread_calls
    }

    /// Make the next `count` report creations fail.
    pub async fn fail_report_creates(&self, count: usize) {
        self.state.lock().await.failures.report_creates = count;
    }

    /// Make the next `count` report updates fail.
    pub async fn fail_report_updates(&self, count: usize) {
        self.state.lock().await.failures.report_updates = count;
    }

    /// Make the next `count` thread updates fail.
    pub async fn fail_thread_updates(&self, count: usize) {
        self.state.lock().await.failures.thread_updates = count;
    }

    /// Make every lookup of this thread fail with a backend error.
    pub async fn fail_thread_lookup(&self, id: &str) {
        self.state
            .lock()
            .await
            .failures
            .thread_lookups
            .insert(id.to_string());
    }

    /// Throttle thread creation, advertising `retry_after` seconds.
    pub async fn rate_limit_thread_creates(&self, retry_after: u64) {
        self.state.lock().await.failures.rate_limit_thread_creates = Some(retry_after);
    }

    /// Serve the next `count` reaction listings as empty, as a replica that
    /// has not caught up would.
    pub async fn stale_reaction_listings(&self, count: usize) {
        self.state.lock().await.failures.stale_reaction_listings = count;
    }

    /// Make the next `count` reaction deletions report `NotFound`, as if a
    /// concurrent request had already removed the reaction.
    pub async fn vanish_reaction_deletes(&self, count: usize) {
        self.state.lock().await.failures.vanished_reaction_deletes = count;
    }

    /// Let the next reaction write succeed, then fail every reaction listing.
    pub async fn fail_reaction_listings_after_write(&self) {
        self.state
            .lock()
            .await
            .failures
            .reaction_listings_fail_after_write = true;
    }

    /// Hold every thread lookup for `delay` so overlapping lookups can be counted.
    pub async fn delay_thread_lookups(&self, delay: StdDuration) {
        self.state.lock().await.thread_lookup_delay = Some(delay);
    }

    /// Most thread lookups that were ever in flight at once.
    pub fn max_concurrent_thread_lookups(&self) -> usize {
        self.max_lookups_in_flight.load(Ordering::SeqCst)
    }

    /// Publish a thread with an open report of `report_type` right after the
    /// next report listing is served, as a concurrent submitter would.
    pub async fn arrive_after_report_listing(
        &self,
        user_id: &str,
        title: &str,
        extended_data: Value,
        report_type: &str,
    ) {
        self.state.lock().await.arrival_on_report_listing = Some(Arrival {
            user_id: user_id.to_string(),
            title: title.to_string(),
            extended_data,
            report_type: report_type.to_string(),
        });
    }

    /// Reject a second reaction of the same kind by the same user with `Conflict`.
    pub async fn enforce_unique_reactions(&self) {
        self.state.lock().await.unique_reactions = true;
    }

    /// Insert a reaction directly, bypassing uniqueness checks.
    pub async fn insert_reaction(&self, thread_id: &str, user_id: &str, kind: ReactionKind) {
        self.state.lock().await.reactions.push(Reaction {
            id: new_id(),
            user_id: user_id.to_string(),
            thread_id: Some(thread_id.to_string()),
            kind,
        });
    }
}

#[async_trait]
impl ForumGateway for InMemoryForum {
    async fn me(&self, token: &str) -> AppResult<ForumUser> {
        self.state.lock().await.user_for(Some(token))
    }

    async fn login(&self, input: LoginInput) -> AppResult<AuthToken> {
        let mut state = self.state.lock().await;
        let user_id = state
            .users
            .values()
            .find(|(user, password)| user.username == input.login && *password == input.password)
            .map(|(user, _)| user.id.clone())
            .ok_or(AppError::Unauthorized)?;
        let token = new_id();
        state.tokens.insert(token.clone(), user_id);
        Ok(AuthToken { token })
    }

    async fn register(&self, input: RegisterInput) -> AppResult<ForumUser> {
        let mut state = self.state.lock().await;
        if state
            .users
            .values()
            .any(|(user, _)| user.username == input.username)
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
        let user = ForumUser {
            id: new_id(),
            username: input.username,
            display_name: input.display_name,
            roles: Vec::new(),
            is_admin: false,
        };
        state
            .users
            .insert(user.id.clone(), (user.clone(), input.password));
        Ok(user)
    }

    async fn create_thread(&self, token: Option<&str>, input: NewThread) -> AppResult<Thread> {
        let mut state = self.state.lock().await;
        let user = state.user_for(token)?;
        if let Some(retry_after) = state.failures.rate_limit_thread_creates {
            return Err(AppError::RateLimited(Some(retry_after)));
        }
        let thread = Thread {
            id: new_id(),
            title: input.title,
            body: input.body,
            user_id: user.id,
            created_at: Utc::now() + Duration::milliseconds(state.threads.len() as i64),
            extended_data: input.extended_data,
        };
        state.threads.push(thread.clone());
        Ok(thread)
    }

    async fn list_threads(
        &self,
        _token: Option<&str>,
        query: ThreadQuery,
    ) -> AppResult<Page<Thread>> {
        let limit = self.limit(query.limit);
        let mut state = self.state.lock().await;
        state.list_thread_calls += 1;
        let threads: Vec<Thread> = state
            .threads
            .iter()
            .rev()
            .filter(|t| query.user_id.as_ref().is_none_or(|uid| &t.user_id == uid))
            .cloned()
            .collect();
        paginate(&threads, query.cursor.as_deref(), limit)
    }

    async fn retrieve_thread(&self, _token: Option<&str>, id: &str) -> AppResult<Thread> {
        let delay = self.state.lock().await.thread_lookup_delay;
        if let Some(delay) = delay {
            let in_flight = self.lookups_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_lookups_in_flight
                .fetch_max(in_flight, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.lookups_in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        let state = self.state.lock().await;
        if state.failures.thread_lookups.contains(id) {
            return Err(AppError::ExternalService(format!(
                "Thread lookup failed: {id}"
            )));
        }
        state
            .threads
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Thread {id} not found")))
    }

    async fn update_thread(
        &self,
        token: Option<&str>,
        id: &str,
        extended_data: Value,
    ) -> AppResult<Thread> {
        let mut state = self.state.lock().await;
        let user = state.user_for(token)?;
        let is_admin = state.admin_for(token).is_ok();
        if state.failures.thread_updates > 0 {
            state.failures.thread_updates -= 1;
            return Err(AppError::ExternalService("Thread update failed".to_string()));
        }
        let thread = state
            .threads
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Thread {id} not found")))?;
        if thread.user_id != user.id && !is_admin {
            return Err(AppError::Forbidden(
                "You can only update your own threads".to_string(),
            ));
        }
        thread.extended_data = extended_data;
        Ok(thread.clone())
    }

    async fn list_reactions(
        &self,
        _token: Option<&str>,
        thread_id: &str,
        cursor: Option<String>,
    ) -> AppResult<Page<Reaction>> {
        let mut state = self.state.lock().await;
        if !state.threads.iter().any(|t| t.id == thread_id) {
            return Err(AppError::NotFound(format!("Thread {thread_id} not found")));
        }
        if state.failures.reaction_listings_down {
            return Err(AppError::ExternalService(
                "Reaction listing failed".to_string(),
            ));
        }
        if state.failures.stale_reaction_listings > 0 {
            state.failures.stale_reaction_listings -= 1;
            return Ok(Page::last(Vec::new()));
        }
        let reactions: Vec<Reaction> = state
            .reactions
            .iter()
            .filter(|r| r.thread_id.as_deref() == Some(thread_id))
            .cloned()
            .collect();
        paginate(&reactions, cursor.as_deref(), self.page_size)
    }

    async fn create_reaction(
        &self,
        token: Option<&str>,
        thread_id: &str,
        kind: ReactionKind,
    ) -> AppResult<Reaction> {
        let mut state = self.state.lock().await;
        let user = state.user_for(token)?;
        if !state.threads.iter().any(|t| t.id == thread_id) {
            return Err(AppError::NotFound(format!("Thread {thread_id} not found")));
        }
        if state.unique_reactions
            && state.reactions.iter().any(|r| {
                r.thread_id.as_deref() == Some(thread_id) && r.user_id == user.id && r.kind == kind
            })
        {
            return Err(AppError::Conflict("Already reacted".to_string()));
        }
        let reaction = Reaction {
            id: new_id(),
            user_id: user.id,
            thread_id: Some(thread_id.to_string()),
            kind,
        };
        state.reactions.push(reaction.clone());
        state.after_reaction_write();
        Ok(reaction)
    }

    async fn delete_reaction(
        &self,
        token: Option<&str>,
        thread_id: &str,
        reaction_id: &str,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let user = state.user_for(token)?;
        if state.failures.vanished_reaction_deletes > 0 {
            state.failures.vanished_reaction_deletes -= 1;
            state
                .reactions
                .retain(|r| !(r.id == reaction_id && r.user_id == user.id));
            return Err(AppError::NotFound("Reaction not found".to_string()));
        }
        let position = state
            .reactions
            .iter()
            .position(|r| r.id == reaction_id && r.thread_id.as_deref() == Some(thread_id))
            .ok_or_else(|| AppError::NotFound("Reaction not found".to_string()))?;
        if state.reactions[position].user_id != user.id {
            return Err(AppError::Forbidden(
                "You can only remove your own reactions".to_string(),
            ));
        }
        state.reactions.remove(position);
        state.after_reaction_write();
        Ok(())
    }

    async fn create_report(&self, token: Option<&str>, input: NewReport) -> AppResult<Report> {
        let mut state = self.state.lock().await;
        state.user_for(token)?;
        if state.failures.report_creates > 0 {
            state.failures.report_creates -= 1;
            return Err(AppError::ExternalService("Report creation failed".to_string()));
        }
        let report = Report {
            id: new_id(),
            thread_id: Some(input.thread_id),
            post_id: None,
            report_type: input.report_type,
            description: input.description,
            status: input.status,
            created_at: Utc::now(),
        };
        state.reports.push(report.clone());
        Ok(report)
    }

    async fn list_reports(
        &self,
        token: Option<&str>,
        query: ReportQuery,
    ) -> AppResult<Page<Report>> {
        let limit = self.limit(query.limit);
        let mut state = self.state.lock().await;
        state.admin_for(token)?;
        let reports: Vec<Report> = state
            .reports
            .iter()
            .filter(|r| query.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        let page = paginate(&reports, query.cursor.as_deref(), limit);
        if let Some(arrival) = state.arrival_on_report_listing.take() {
            state.publish(arrival);
        }
        page
    }

    async fn update_report(
        &self,
        token: Option<&str>,
        id: &str,
        status: ReportStatus,
    ) -> AppResult<Report> {
        let mut state = self.state.lock().await;
        state.admin_for(token)?;
        if state.failures.report_updates > 0 {
            state.failures.report_updates -= 1;
            return Err(AppError::ExternalService("Report update failed".to_string()));
        }
        let report = state
            .reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Report {id} not found")))?;
        report.status = status;
        Ok(report.clone())
    }
}
