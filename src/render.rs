//! Terminal presentation of feed, comment and chat state.
//!
//! Everything here returns a `String`; printing is left to the binary.

use chrono::{DateTime, NaiveDateTime, Utc};
use colored::*;

use crate::error::{ClientError, ErrorKind};
use crate::feed::FeedState;
use crate::models::{ChatMessage, ChatPeer, Comment, LikeStatus, Profile, UserId, VideoItem};

/// Backend timestamps are either RFC 3339 or naive ISO-8601 in UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Time of day for today's timestamps, date and time otherwise. Unparseable
/// input is shown as-is.
pub fn format_timestamp(raw: &str, now: DateTime<Utc>) -> String {
    match parse_timestamp(raw) {
        Some(ts) if ts.date_naive() == now.date_naive() => ts.format("%H:%M:%S").to_string(),
        Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        None => raw.to_string(),
    }
}

/// Absolute URL for a media path such as `/uploads/clip.mp4`. Media is served
/// from the API host's root, not under the API prefix.
pub fn media_url(api_base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let root = api_base.trim_end_matches('/');
    let origin = root.strip_suffix("/api").unwrap_or(root);
    format!("{origin}/{}", path.trim_start_matches('/'))
}

fn like_marker(status: Option<LikeStatus>) -> ColoredString {
    match status {
        Some(LikeStatus::Pending) => " (saving...)".dimmed(),
        Some(LikeStatus::Unconfirmed) => " (not confirmed)".yellow(),
        Some(LikeStatus::RolledBack) => " (like failed)".red(),
        Some(LikeStatus::Confirmed) | None => "".normal(),
    }
}

pub fn video_card(item: &VideoItem, position: usize, total: usize, api_base: &str) -> String {
    let heart = if item.liked_by_viewer {
        format!("♥ {}", item.like_count).bright_red().bold()
    } else {
        format!("♡ {}", item.like_count).normal()
    };
    let mut out = format!(
        "{} {}\n",
        format!("[{}/{}]", position + 1, total).bright_black(),
        format!("@{}", item.owner_username).bright_cyan().bold()
    );
    if let Some(desc) = item.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("  {desc}\n"));
    }
    out.push_str(&format!("  {}\n", media_url(api_base, &item.media_url).underline()));
    out.push_str(&format!(
        "  {}{}   {} {}",
        heart,
        like_marker(item.like_status),
        "💬".normal(),
        item.comment_count
    ));
    if let Some(date) = item.uploaded_at.as_deref() {
        out.push_str(&format!("   {}", format_timestamp(date, Utc::now()).bright_black()));
    }
    out
}

pub fn feed_view(state: &FeedState, api_base: &str, fetching: bool) -> String {
    let mut out = match state.current() {
        Some(item) => video_card(item, state.cursor, state.len(), api_base),
        None if fetching => "Loading videos...".bright_blue().to_string(),
        None => "No videos yet.".bright_black().to_string(),
    };
    if let Some(err) = &state.last_error {
        out.push_str(&format!("\n{}", format!("  ! {err}").yellow()));
    }
    if !state.has_next() && !state.is_empty() {
        out.push_str(&format!("\n{}", "  -- end of feed --".bright_black()));
    }
    out
}

pub fn feed_help() -> String {
    format!(
        "{}",
        "[n]ext  [p]rev  [l]ike  [c]omments  [a]dd <text>  [s]hare <user id>  [r] load more  [q]uit".bright_black()
    )
}

pub fn comment_line(comment: &Comment) -> String {
    let who = comment.username.as_deref().unwrap_or("Unknown");
    let when = comment
        .created_at
        .as_deref()
        .map(|d| format!(" {}", format_timestamp(d, Utc::now()).bright_black()))
        .unwrap_or_default();
    format!("{}{}: {}", who.bright_yellow(), when, comment.text)
}

pub fn peer_line(peer: &ChatPeer, selected: Option<UserId>) -> String {
    if selected == Some(peer.id) {
        format!("> {} ({})", peer.username.bright_green().bold(), peer.id)
    } else {
        format!("  {} ({})", peer.username, peer.id)
    }
}

pub fn chat_line(msg: &ChatMessage, me: Option<UserId>, now: DateTime<Utc>) -> String {
    let who = msg.sender_username.as_deref().unwrap_or("Unknown");
    let who = if msg.sender_id.is_some() && msg.sender_id == me {
        who.bright_green()
    } else {
        who.bright_cyan()
    };
    let when = if msg.is_temp() {
        "sending...".dimmed().to_string()
    } else {
        format_timestamp(&msg.timestamp, now).bright_black().to_string()
    };
    format!("[{}] {}: {}", when, who, msg.text)
}

pub fn profile_view(profile: &Profile) -> String {
    let mut out = format!("{} (id {})", profile.username.bright_cyan().bold(), profile.id);
    if let Some(email) = &profile.email {
        out.push_str(&format!("\n  {}: {}", "Email".bright_yellow(), email));
    }
    out.push_str(&format!(
        "\n  {}: {}",
        "Bio".bright_yellow(),
        profile.bio.as_deref().filter(|b| !b.is_empty()).unwrap_or("-")
    ));
    out
}

/// One-line error for the terminal, with a hint when re-login would help.
pub fn error_line(err: &ClientError) -> String {
    let line = format!("error: {err}");
    match err.kind() {
        ErrorKind::Auth => format!("{}\n{}", line.bright_red(), "  hint: run `reelfeed login`".bright_black()),
        ErrorKind::Network => line.bright_red().to_string(),
        _ => line.yellow().to_string(),
    }
}
