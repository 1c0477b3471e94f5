//! Comment thread of a single video, opened from the feed.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::feed::{FeedApi, FeedController};
use crate::models::{Comment, VideoId};

pub struct CommentThread<'a, A> {
    feed: &'a FeedController<A>,
    video: VideoId,
    comments: Mutex<Vec<Comment>>,
}

impl<'a, A: FeedApi> CommentThread<'a, A> {
    pub(crate) fn new(feed: &'a FeedController<A>, video: VideoId) -> Self {
        Self {
            feed,
            video,
            comments: Mutex::new(Vec::new()),
        }
    }

    pub fn video(&self) -> VideoId {
        self.video
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Comment>> {
        self.comments.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Comments loaded so far, oldest first as the server returned them.
    pub fn comments(&self) -> Vec<Comment> {
        self.lock().clone()
    }

    /// Replace the thread with the server's current list.
    pub async fn load(&self) -> Result<Vec<Comment>> {
        let list = self.feed.api().comments(self.video).await?;
        debug!(video = self.video, count = list.comments.len(), "comments loaded");
        *self.lock() = list.comments.clone();
        Ok(list.comments)
    }

    /// Post a comment. The thread shows the server's echo when there is one,
    /// otherwise it is reloaded; the video's comment count goes up by one.
    pub async fn add(&self, text: &str) -> Result<Vec<Comment>> {
        self.feed.session().require("comment")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::Validation("comment text is required".into()));
        }

        let resp = self.feed.api().add_comment(self.video, text).await?;
        info!(video = self.video, comment_id = ?resp.comment_id, "comment added");
        self.feed.record_comment_added(self.video);

        match resp.comment {
            Some(comment) => {
                let mut comments = self.lock();
                comments.push(comment);
                Ok(comments.clone())
            }
            None => self.load().await,
        }
    }
}
