//! Feed state: the paginated list of videos, the viewing cursor, and
//! optimistic like/unlike with explicit reconciliation.
//!
//! ## Concurrency
//! The controller is driven from a single task. Methods take `&self` so that
//! several intents can be in progress at once (a prefetch while the user
//! likes a video); state sits behind a mutex that is never held across an
//! `.await`. Only one page fetch is ever outstanding: a second call while one
//! is in flight returns [`FetchOutcome::Skipped`] immediately instead of
//! queueing.
//!
//! ## Likes
//! `toggle_like` applies the change locally first (`Pending`), then settles
//! it as `Confirmed`, or according to [`LikeFailurePolicy`] as `RolledBack`
//! or `Unconfirmed`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::comments::CommentThread;
use crate::config::{ClientConfig, LikeFailurePolicy};
use crate::error::{ClientError, Result};
use crate::models::{
    Ack, AddCommentResponse, CommentList, LikeResponse, LikeStatus, UserId, VideoId, VideoItem,
    VideoPage,
};
use crate::session::SessionHandle;

/// Backend operations the feed needs. Implemented by [`crate::api::ApiClient`].
#[allow(async_fn_in_trait)]
pub trait FeedApi {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<VideoPage>;
    async fn set_liked(&self, video: VideoId, liked: bool) -> Result<LikeResponse>;
    async fn comments(&self, video: VideoId) -> Result<CommentList>;
    async fn add_comment(&self, video: VideoId, text: &str) -> Result<AddCommentResponse>;
    async fn share(&self, video: VideoId, receiver: UserId) -> Result<Ack>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page arrived; this many new videos were appended.
    Loaded(usize),
    /// Nothing more to fetch.
    Exhausted,
    /// Another fetch was already in flight; this call did nothing.
    Skipped,
}

// ---------------------------------------------------------------------------
// FeedState: pagination and cursor bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    /// Append-only across pages.
    pub items: Vec<VideoItem>,
    /// Index of the displayed video; `0` on an empty feed.
    pub cursor: usize,
    pub has_more: bool,
    /// 1-based page number the next fetch will request.
    pub next_page: u32,
    pub last_error: Option<String>,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
            has_more: true,
            next_page: 1,
            last_error: None,
        }
    }
}

impl FeedState {
    pub fn current(&self) -> Option<&VideoItem> {
        self.items.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Videos loaded after the cursor.
    pub fn remaining(&self) -> usize {
        self.items.len().saturating_sub(self.cursor + 1)
    }

    /// Something to move forward to, now or after the next fetch.
    pub fn has_next(&self) -> bool {
        self.remaining() > 0 || self.has_more
    }

    pub fn has_prev(&self) -> bool {
        self.cursor > 0
    }

    /// Append a page. Videos already present (the list shifted under offset
    /// pagination) are skipped. Returns how many were appended.
    pub fn apply_page(&mut self, page: VideoPage, page_size: u32) -> usize {
        if page.videos.is_empty() {
            self.has_more = false;
            return 0;
        }

        let full = page.videos.len() >= page_size as usize;
        self.has_more = page.more_flag().unwrap_or(true) && full;
        self.next_page += 1;

        let before = self.items.len();
        for video in page.videos {
            if !self.items.iter().any(|v| v.id == video.id) {
                self.items.push(video);
            }
        }
        self.items.len() - before
    }

    /// Move the cursor one step forward if a loaded video is there.
    pub fn step_forward(&mut self) -> bool {
        if self.cursor + 1 < self.items.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn step_back(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    fn find_mut(&mut self, id: VideoId) -> Option<&mut VideoItem> {
        self.items.iter_mut().find(|v| v.id == id)
    }
}

// ---------------------------------------------------------------------------
// In-flight guard
// ---------------------------------------------------------------------------

/// Holds the page-fetch flag; releasing happens on drop so an error or a
/// dropped future cannot leave the feed stuck.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// FeedController
// ---------------------------------------------------------------------------

pub struct FeedController<A> {
    api: Arc<A>,
    session: SessionHandle,
    page_size: u32,
    prefetch_distance: usize,
    like_failure: LikeFailurePolicy,
    state: Mutex<FeedState>,
    fetching: AtomicBool,
}

impl<A: FeedApi> FeedController<A> {
    pub fn new(api: Arc<A>, session: SessionHandle, config: &ClientConfig) -> Self {
        Self {
            api,
            session,
            page_size: config.page_size.max(1),
            prefetch_distance: config.effective_prefetch_distance(),
            like_failure: config.like_failure,
            state: Mutex::new(FeedState::default()),
            fetching: AtomicBool::new(false),
        }
    }

    pub(crate) fn api(&self) -> &A {
        &self.api
    }

    pub(crate) fn session(&self) -> &SessionHandle {
        &self.session
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> FeedState {
        self.lock().clone()
    }

    pub fn current(&self) -> Option<VideoItem> {
        self.lock().current().cloned()
    }

    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    pub fn has_next(&self) -> bool {
        self.lock().has_next()
    }

    pub fn has_prev(&self) -> bool {
        self.lock().has_prev()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    /// Request the next page of `page_size` videos.
    ///
    /// A call made while another fetch is outstanding is dropped
    /// ([`FetchOutcome::Skipped`]); once the server has signalled the end, or
    /// returned a short page, calls return [`FetchOutcome::Exhausted`]
    /// without a request. On error the feed is left as it was and the error
    /// is remembered in `last_error`; the next call retries the same page.
    pub async fn fetch_next_page(&self) -> Result<FetchOutcome> {
        let Some(_guard) = InFlight::acquire(&self.fetching) else {
            debug!("page fetch already in flight, dropping request");
            return Ok(FetchOutcome::Skipped);
        };

        let page = {
            let state = self.lock();
            if !state.has_more {
                return Ok(FetchOutcome::Exhausted);
            }
            state.next_page
        };

        debug!(page, limit = self.page_size, "fetching feed page");
        match self.api.fetch_page(page, self.page_size).await {
            Ok(resp) => {
                let mut state = self.lock();
                let added = state.apply_page(resp, self.page_size);
                state.last_error = None;
                debug!(page, added, has_more = state.has_more, total = state.len(), "feed page applied");
                Ok(if added == 0 && !state.has_more {
                    FetchOutcome::Exhausted
                } else {
                    FetchOutcome::Loaded(added)
                })
            }
            Err(e) => {
                warn!(page, error = %e, "feed page fetch failed");
                self.lock().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Move to the next video, prefetching when the cursor nears the tail.
    ///
    /// When the cursor already sits on the last loaded video and more pages
    /// exist, the next page is fetched and the cursor then moves onto it.
    pub async fn advance(&self) -> Result<Option<VideoItem>> {
        let (at_tail, wants_more) = {
            let mut state = self.lock();
            let at_tail = !state.is_empty() && !state.step_forward();
            (at_tail, state.has_more && state.remaining() <= self.prefetch_distance)
        };

        if wants_more {
            let outcome = self.fetch_next_page().await?;
            if at_tail && matches!(outcome, FetchOutcome::Loaded(n) if n > 0) {
                self.lock().step_forward();
            }
        }
        Ok(self.current())
    }

    /// Move to the previous video; stays put at the head.
    pub fn retreat(&self) -> Option<VideoItem> {
        let mut state = self.lock();
        state.step_back();
        state.current().cloned()
    }

    /// Flip the viewer's like on `video`, optimistically.
    ///
    /// The flag and count (±1) change before the request is sent. The
    /// returned status tells how the change settled; on failure the error is
    /// returned after the configured policy has been applied. A toggle on a
    /// video whose previous toggle is still `Pending` is ignored and reports
    /// `Pending`.
    pub async fn toggle_like(&self, video: VideoId) -> Result<LikeStatus> {
        self.session.require("like videos")?;

        let (target, previous) = {
            let mut state = self.lock();
            let item = state.find_mut(video).ok_or(ClientError::UnknownVideo(video))?;
            if item.like_status == Some(LikeStatus::Pending) {
                debug!(video, "like already pending, dropping toggle");
                return Ok(LikeStatus::Pending);
            }
            let previous = (item.liked_by_viewer, item.like_count);
            let target = !item.liked_by_viewer;
            item.liked_by_viewer = target;
            item.like_count = if target {
                item.like_count + 1
            } else {
                item.like_count.saturating_sub(1)
            };
            item.like_status = Some(LikeStatus::Pending);
            (target, previous)
        };

        let result = self.api.set_liked(video, target).await;

        let mut state = self.lock();
        let Some(item) = state.find_mut(video) else {
            return result.map(|_| LikeStatus::Confirmed);
        };
        match result {
            Ok(resp) => {
                if let Some(count) = resp.likes_count {
                    item.like_count = count;
                }
                item.like_status = Some(LikeStatus::Confirmed);
                Ok(LikeStatus::Confirmed)
            }
            // 409: the server already held the target state, so the count
            // it reported before the toggle already included it.
            Err(e) if e.status() == Some(409) => {
                debug!(video, error = %e, "like conflict, server already in target state");
                item.liked_by_viewer = target;
                item.like_count = previous.1;
                item.like_status = Some(LikeStatus::Confirmed);
                Ok(LikeStatus::Confirmed)
            }
            Err(e) => {
                match self.like_failure {
                    LikeFailurePolicy::Rollback => {
                        (item.liked_by_viewer, item.like_count) = previous;
                        item.like_status = Some(LikeStatus::RolledBack);
                        warn!(video, error = %e, "like failed, rolled back");
                    }
                    LikeFailurePolicy::Keep => {
                        item.like_status = Some(LikeStatus::Unconfirmed);
                        warn!(video, error = %e, "like failed, optimistic change kept");
                    }
                }
                Err(e)
            }
        }
    }

    /// Bump the displayed comment count after a comment was posted.
    pub fn record_comment_added(&self, video: VideoId) {
        if let Some(item) = self.lock().find_mut(video) {
            item.comment_count += 1;
        }
    }

    /// Comment thread for `video`, bound to this feed so posting a comment
    /// updates the video's count.
    pub fn open_comments(&self, video: VideoId) -> CommentThread<'_, A> {
        CommentThread::new(self, video)
    }

    /// Share `video` with another user.
    pub async fn share(&self, video: VideoId, receiver: UserId) -> Result<String> {
        let session = self.session.require("share videos")?;
        if session.user_id == Some(receiver) {
            return Err(ClientError::Validation("cannot share a video with yourself".into()));
        }
        let ack = self.api.share(video, receiver).await?;
        info!(video, receiver, "video shared");
        Ok(ack.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserSummary;
    use crate::session::{MemoryTokenStore, SessionStore};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn video(id: VideoId, likes: u64, liked: bool) -> VideoItem {
        VideoItem {
            id,
            owner_id: Some(1),
            owner_username: "ana".into(),
            description: Some(format!("clip {id}")),
            media_url: format!("/uploads/{id}.mp4"),
            uploaded_at: None,
            like_count: likes,
            liked_by_viewer: liked,
            comment_count: 0,
            like_status: None,
        }
    }

    fn page(ids: std::ops::Range<VideoId>, has_more: Option<bool>) -> VideoPage {
        VideoPage {
            videos: ids.map(|id| video(id, 0, false)).collect(),
            has_more,
            ..Default::default()
        }
    }

    /// Scripted backend. A gated call signals `started` and then parks until
    /// its gate is notified.
    #[derive(Default)]
    struct FakeFeed {
        pages: Mutex<VecDeque<Result<VideoPage>>>,
        likes: Mutex<VecDeque<Result<LikeResponse>>>,
        fetch_calls: AtomicUsize,
        like_calls: Mutex<Vec<(VideoId, bool)>>,
        started: Notify,
        fetch_gate: Option<Notify>,
        like_gate: Option<Notify>,
    }

    impl FakeFeed {
        fn with_pages(pages: Vec<Result<VideoPage>>) -> Self {
            Self { pages: Mutex::new(pages.into()), ..Default::default() }
        }

        fn gate_fetches(mut self) -> Self {
            self.fetch_gate = Some(Notify::new());
            self
        }

        fn gate_likes(mut self) -> Self {
            self.like_gate = Some(Notify::new());
            self
        }

        async fn park(&self, gate: &Option<Notify>) {
            if let Some(gate) = gate {
                self.started.notify_one();
                gate.notified().await;
            }
        }
    }

    impl FeedApi for FakeFeed {
        async fn fetch_page(&self, _page: u32, _limit: u32) -> Result<VideoPage> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.park(&self.fetch_gate).await;
            self.pages.lock().unwrap().pop_front().unwrap_or_else(|| Ok(VideoPage::default()))
        }

        async fn set_liked(&self, video: VideoId, liked: bool) -> Result<LikeResponse> {
            self.like_calls.lock().unwrap().push((video, liked));
            self.park(&self.like_gate).await;
            self.likes.lock().unwrap().pop_front().unwrap_or_else(|| Ok(LikeResponse::default()))
        }

        async fn comments(&self, _video: VideoId) -> Result<CommentList> {
            Ok(CommentList::default())
        }

        async fn add_comment(&self, _video: VideoId, _text: &str) -> Result<AddCommentResponse> {
            Ok(AddCommentResponse::default())
        }

        async fn share(&self, _video: VideoId, _receiver: UserId) -> Result<Ack> {
            Ok(Ack { message: "shared".into() })
        }
    }

    fn signed_in() -> SessionHandle {
        let session = SessionStore::anonymous(MemoryTokenStore::default());
        session.login("opaque", UserSummary { id: 1, username: "ana".into(), email: None });
        session
    }

    fn controller(api: FakeFeed, config: ClientConfig) -> FeedController<FakeFeed> {
        FeedController::new(Arc::new(api), signed_in(), &config)
    }

    fn five() -> ClientConfig {
        ClientConfig { page_size: 5, ..Default::default() }
    }

    // -- FeedState ------------------------------------------------------------

    #[test]
    fn full_page_without_flag_means_more() {
        let mut st = FeedState::default();
        assert_eq!(st.apply_page(page(1..6, None), 5), 5);
        assert!(st.has_more);
        assert_eq!(st.next_page, 2);
    }

    #[test]
    fn short_page_stops_even_if_server_says_more() {
        let mut st = FeedState::default();
        st.apply_page(page(1..4, Some(true)), 5);
        assert!(!st.has_more);
    }

    #[test]
    fn server_flag_false_stops_on_full_page() {
        let mut st = FeedState::default();
        st.apply_page(page(1..6, Some(false)), 5);
        assert!(!st.has_more);
    }

    #[test]
    fn empty_page_stops_without_advancing_page_number() {
        let mut st = FeedState::default();
        assert_eq!(st.apply_page(VideoPage::default(), 5), 0);
        assert!(!st.has_more);
        assert_eq!(st.next_page, 1);
    }

    #[test]
    fn duplicates_are_not_appended_twice() {
        let mut st = FeedState::default();
        st.apply_page(page(1..6, None), 5);
        assert_eq!(st.apply_page(page(4..9, None), 5), 3);
        let ids: Vec<_> = st.items.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn steps_are_clamped() {
        let mut st = FeedState::default();
        assert!(!st.step_forward());
        assert!(!st.step_back());
        st.apply_page(page(1..3, None), 5);
        assert!(st.step_forward());
        assert!(!st.step_forward());
        assert_eq!(st.cursor, 1);
        assert!(st.step_back());
        assert!(!st.step_back());
        assert_eq!(st.cursor, 0);
    }

    #[test]
    fn navigation_hints() {
        let mut st = FeedState::default();
        st.apply_page(page(1..3, None), 5);
        assert!(st.has_next());
        assert!(!st.has_prev());
        st.step_forward();
        assert!(!st.has_next());
        assert!(st.has_prev());
    }

    // -- fetch ------------------------------------------------------------------

    #[tokio::test]
    async fn first_fetch_populates_at_cursor_zero() {
        let feed = controller(FakeFeed::with_pages(vec![Ok(page(1..6, None))]), five());
        assert_eq!(feed.fetch_next_page().await.unwrap(), FetchOutcome::Loaded(5));
        let st = feed.snapshot();
        assert_eq!(st.cursor, 0);
        assert_eq!(st.current().map(|v| v.id), Some(1));
        assert!(st.has_more);
    }

    #[tokio::test]
    async fn concurrent_fetch_is_dropped() {
        let feed = controller(FakeFeed::with_pages(vec![Ok(page(1..6, None))]).gate_fetches(), five());
        let api = Arc::clone(&feed.api);

        let (first, second) = tokio::join!(feed.fetch_next_page(), async {
            api.started.notified().await;
            assert!(feed.is_fetching());
            let second = feed.fetch_next_page().await;
            api.fetch_gate.as_ref().unwrap().notify_one();
            second
        });

        assert_eq!(first.unwrap(), FetchOutcome::Loaded(5));
        assert_eq!(second.unwrap(), FetchOutcome::Skipped);
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 1);
        assert!(!feed.is_fetching());
    }

    #[tokio::test]
    async fn exhausted_feed_issues_no_request() {
        let feed = controller(FakeFeed::with_pages(vec![Ok(page(1..3, None))]), five());
        feed.fetch_next_page().await.unwrap();
        assert_eq!(feed.fetch_next_page().await.unwrap(), FetchOutcome::Exhausted);
        assert_eq!(feed.api.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_items_and_allows_retry() {
        let feed = controller(
            FakeFeed::with_pages(vec![
                Ok(page(1..6, None)),
                Err(ClientError::Connect { url: "u".into(), detail: "refused".into() }),
                Ok(page(6..11, None)),
            ]),
            five(),
        );
        feed.fetch_next_page().await.unwrap();
        assert!(feed.fetch_next_page().await.is_err());
        let st = feed.snapshot();
        assert_eq!(st.len(), 5);
        assert!(st.last_error.as_deref().unwrap().contains("refused"));
        assert!(!feed.is_fetching());

        assert_eq!(feed.fetch_next_page().await.unwrap(), FetchOutcome::Loaded(5));
        assert_eq!(feed.snapshot().len(), 10);
        assert!(feed.snapshot().last_error.is_none());
    }

    // -- navigation ---------------------------------------------------------------

    #[tokio::test]
    async fn advance_prefetches_near_tail() {
        let feed = controller(
            FakeFeed::with_pages(vec![Ok(page(1..6, None)), Ok(page(6..11, None))]),
            five(),
        );
        feed.fetch_next_page().await.unwrap();
        feed.advance().await.unwrap(); // cursor 1, 3 remaining
        assert_eq!(feed.api.fetch_calls.load(Ordering::SeqCst), 1);
        feed.advance().await.unwrap(); // cursor 2, 2 remaining -> prefetch
        assert_eq!(feed.api.fetch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(feed.snapshot().len(), 10);
        assert_eq!(feed.cursor(), 2);
    }

    #[tokio::test]
    async fn advance_at_tail_fetches_then_moves() {
        let cfg = ClientConfig { page_size: 2, ..Default::default() };
        let feed = controller(
            FakeFeed::with_pages(vec![
                Ok(page(1..3, None)),
                Err(ClientError::Connect { url: "u".into(), detail: "refused".into() }),
                Ok(page(3..5, None)),
            ]),
            cfg,
        );
        feed.fetch_next_page().await.unwrap();
        // Moves to the last loaded video; the prefetch fails.
        assert!(feed.advance().await.is_err());
        assert_eq!(feed.cursor(), 1);
        // Stuck at the tail: fetch, then step onto the new page.
        let now = feed.advance().await.unwrap().unwrap();
        assert_eq!(now.id, 3);
        assert_eq!(feed.snapshot().len(), 4);
    }

    #[tokio::test]
    async fn advance_on_empty_feed_loads_first_page() {
        let feed = controller(FakeFeed::with_pages(vec![Ok(page(1..6, None))]), five());
        let now = feed.advance().await.unwrap();
        assert_eq!(now.map(|v| v.id), Some(1));
        assert_eq!(feed.cursor(), 0);
    }

    #[tokio::test]
    async fn advance_stops_at_end_when_exhausted() {
        let feed = controller(FakeFeed::with_pages(vec![Ok(page(1..3, None))]), five());
        feed.fetch_next_page().await.unwrap();
        feed.advance().await.unwrap();
        let last = feed.advance().await.unwrap().unwrap();
        assert_eq!(last.id, 2);
        assert_eq!(feed.cursor(), 1);
        assert_eq!(feed.api.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retreat_clamps_at_head() {
        let feed = controller(FakeFeed::with_pages(vec![Ok(page(1..3, None))]), five());
        feed.fetch_next_page().await.unwrap();
        assert_eq!(feed.retreat().map(|v| v.id), Some(1));
        feed.advance().await.unwrap();
        assert_eq!(feed.retreat().map(|v| v.id), Some(1));
    }

    // -- likes ----------------------------------------------------------------------

    async fn loaded_with(api: FakeFeed, cfg: ClientConfig, item: VideoItem) -> FeedController<FakeFeed> {
        api.pages.lock().unwrap().push_back(Ok(VideoPage { videos: vec![item], ..Default::default() }));
        let feed = controller(api, cfg);
        feed.fetch_next_page().await.unwrap();
        feed
    }

    #[tokio::test]
    async fn like_is_applied_before_server_answers() {
        let feed = loaded_with(FakeFeed::default().gate_likes(), five(), video(7, 3, false)).await;
        let api = Arc::clone(&feed.api);

        let (status, seen) = tokio::join!(feed.toggle_like(7), async {
            api.started.notified().await;
            let seen = feed.current().unwrap();
            api.like_gate.as_ref().unwrap().notify_one();
            seen
        });

        assert_eq!(seen.like_count, 4);
        assert!(seen.liked_by_viewer);
        assert_eq!(seen.like_status, Some(LikeStatus::Pending));
        assert_eq!(status.unwrap(), LikeStatus::Confirmed);
        assert_eq!(api.like_calls.lock().unwrap().as_slice(), &[(7, true)]);
    }

    #[tokio::test]
    async fn unlike_decrements_by_one() {
        let feed = loaded_with(FakeFeed::default(), five(), video(7, 3, true)).await;
        feed.toggle_like(7).await.unwrap();
        let v = feed.current().unwrap();
        assert_eq!(v.like_count, 2);
        assert!(!v.liked_by_viewer);
        assert_eq!(feed.api.like_calls.lock().unwrap().as_slice(), &[(7, false)]);
    }

    #[tokio::test]
    async fn success_reconciles_with_server_count() {
        let api = FakeFeed::default();
        api.likes.lock().unwrap().push_back(Ok(LikeResponse { message: None, likes_count: Some(10) }));
        let feed = loaded_with(api, five(), video(7, 3, false)).await;
        assert_eq!(feed.toggle_like(7).await.unwrap(), LikeStatus::Confirmed);
        assert_eq!(feed.current().unwrap().like_count, 10);
    }

    #[tokio::test]
    async fn failure_rolls_back_by_default() {
        let api = FakeFeed::default();
        api.likes.lock().unwrap().push_back(Err(ClientError::Connect { url: "u".into(), detail: "down".into() }));
        let feed = loaded_with(api, five(), video(7, 3, false)).await;
        assert!(feed.toggle_like(7).await.is_err());
        let v = feed.current().unwrap();
        assert_eq!((v.liked_by_viewer, v.like_count), (false, 3));
        assert_eq!(v.like_status, Some(LikeStatus::RolledBack));
    }

    #[tokio::test]
    async fn failure_keeps_change_under_keep_policy() {
        let api = FakeFeed::default();
        api.likes.lock().unwrap().push_back(Err(ClientError::Http {
            status: 500,
            url: "u".into(),
            message: "oops".into(),
        }));
        let cfg = ClientConfig { like_failure: LikeFailurePolicy::Keep, ..five() };
        let feed = loaded_with(api, cfg, video(7, 3, false)).await;
        assert!(feed.toggle_like(7).await.is_err());
        let v = feed.current().unwrap();
        assert_eq!((v.liked_by_viewer, v.like_count), (true, 4));
        assert_eq!(v.like_status, Some(LikeStatus::Unconfirmed));
    }

    #[tokio::test]
    async fn conflict_counts_as_confirmed() {
        let api = FakeFeed::default();
        api.likes.lock().unwrap().push_back(Err(ClientError::Http {
            status: 409,
            url: "u".into(),
            message: "Video already liked".into(),
        }));
        let feed = loaded_with(api, five(), video(7, 3, false)).await;
        assert_eq!(feed.toggle_like(7).await.unwrap(), LikeStatus::Confirmed);
        let v = feed.current().unwrap();
        assert!(v.liked_by_viewer);
        assert_eq!(v.like_count, 3);
    }

    #[tokio::test]
    async fn like_requires_session_and_changes_nothing() {
        let api = FakeFeed::with_pages(vec![Ok(VideoPage { videos: vec![video(7, 3, false)], ..Default::default() })]);
        let feed = FeedController::new(
            Arc::new(api),
            SessionStore::anonymous(MemoryTokenStore::default()),
            &five(),
        );
        feed.fetch_next_page().await.unwrap();
        assert!(feed.toggle_like(7).await.unwrap_err().is_auth());
        assert_eq!(feed.current().unwrap().like_count, 3);
        assert!(feed.api.like_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn like_on_unknown_video_is_error() {
        let feed = loaded_with(FakeFeed::default(), five(), video(7, 3, false)).await;
        assert!(matches!(feed.toggle_like(99).await, Err(ClientError::UnknownVideo(99))));
    }

    #[tokio::test]
    async fn toggle_while_pending_is_dropped() {
        let feed = loaded_with(FakeFeed::default().gate_likes(), five(), video(7, 3, false)).await;
        let api = Arc::clone(&feed.api);

        let (first, second) = tokio::join!(feed.toggle_like(7), async {
            api.started.notified().await;
            let second = feed.toggle_like(7).await;
            api.like_gate.as_ref().unwrap().notify_one();
            second
        });

        assert_eq!(first.unwrap(), LikeStatus::Confirmed);
        assert_eq!(second.unwrap(), LikeStatus::Pending);
        assert_eq!(api.like_calls.lock().unwrap().len(), 1);
        assert_eq!(feed.current().unwrap().like_count, 4);
    }

    // -- comments & share ---------------------------------------------------------------

    #[tokio::test]
    async fn comment_count_bump() {
        let feed = loaded_with(FakeFeed::default(), five(), video(7, 0, false)).await;
        feed.record_comment_added(7);
        feed.record_comment_added(99);
        assert_eq!(feed.current().unwrap().comment_count, 1);
    }

    #[tokio::test]
    async fn share_with_self_is_rejected() {
        let feed = loaded_with(FakeFeed::default(), five(), video(7, 0, false)).await;
        assert!(matches!(feed.share(7, 1).await, Err(ClientError::Validation(_))));
        assert_eq!(feed.share(7, 2).await.unwrap(), "shared");
    }
}
