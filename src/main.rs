use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{CommandFactory, Parser};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use reelfeed::api::ApiClient;
use reelfeed::chat::{ChatController, SendOutcome};
use reelfeed::cli::{Args, ChatCommand, Command};
use reelfeed::config::ClientConfig;
use reelfeed::error::{ClientError, Result};
use reelfeed::feed::{FeedController, FetchOutcome};
use reelfeed::render;
use reelfeed::session::{FileTokenStore, SessionHandle, SessionStore};

const ENV_PASSWORD: &str = "REELFEED_PASSWORD";

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("reelfeed=debug,warn"),
        _ => EnvFilter::new("reelfeed=trace,info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Command::Completions { shell } = args.command {
        clap_complete::generate(shell, &mut Args::command(), "reelfeed", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render::error_line(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(url) = args.base_url {
        config.base_url = url;
        config.validate()?;
    }

    let session = SessionStore::restore(FileTokenStore::new(&config.token_path));
    let api = Arc::new(ApiClient::from_config(&config, Arc::clone(&session))?);

    match args.command {
        Command::Register { username, email, password } => {
            let password = password_or_prompt(password)?;
            let ack = api.register(&username, &email, &password).await?;
            println!("{}", or_default(&ack.message, "Registered.").bright_green());
        }
        Command::Login { username, password } => {
            let password = password_or_prompt(password)?;
            let s = api.login(&username, &password).await?;
            println!(
                "{} {}",
                "Signed in as".bright_green(),
                s.username.as_deref().unwrap_or(&username).bright_cyan().bold()
            );
        }
        Command::Logout => {
            api.logout();
            println!("{}", "Signed out.".bright_green());
        }
        Command::Whoami => print_whoami(&session),
        Command::Profile { bio } => {
            if let Some(bio) = bio {
                api.update_profile(&bio).await?;
            }
            println!("{}", render::profile_view(&api.profile().await?));
        }
        Command::Upload { file, description } => {
            let resp = api.upload_video(&file, &description).await?;
            println!("{}", or_default(&resp.message, "Uploaded.").bright_green());
            if let Some(id) = resp.video_id {
                println!("  video id {id}");
            }
        }
        Command::Feed { interactive } => {
            let feed = FeedController::new(Arc::clone(&api), Arc::clone(&session), &config);
            if interactive {
                interactive_feed(&feed, &config).await?;
            } else {
                feed.fetch_next_page().await?;
                let state = feed.snapshot();
                if state.is_empty() {
                    println!("{}", "No videos yet.".bright_black());
                }
                for (i, item) in state.items.iter().enumerate() {
                    println!("{}\n", render::video_card(item, i, state.len(), config.api_root()));
                }
            }
        }
        Command::Like { video } => {
            session.require("like videos")?;
            let resp = api.like(video).await?;
            print_like(video, resp.likes_count, true);
        }
        Command::Unlike { video } => {
            session.require("unlike videos")?;
            let resp = api.unlike(video).await?;
            print_like(video, resp.likes_count, false);
        }
        Command::Comments { video } => {
            let feed = FeedController::new(Arc::clone(&api), Arc::clone(&session), &config);
            print_comments(&feed.open_comments(video).load().await?);
        }
        Command::Comment { video, text } => {
            let feed = FeedController::new(Arc::clone(&api), Arc::clone(&session), &config);
            print_comments(&feed.open_comments(video).add(&text).await?);
        }
        Command::Share { video, receiver } => {
            let feed = FeedController::new(Arc::clone(&api), Arc::clone(&session), &config);
            let message = feed.share(video, receiver).await?;
            println!("{}", or_default(&message, "Shared.").bright_green());
        }
        Command::Chat(cmd) => {
            let chat = ChatController::new(Arc::clone(&api), Arc::clone(&session));
            run_chat(&chat, &session, cmd).await?;
        }
        Command::Completions { .. } => {}
    }
    Ok(())
}

async fn run_chat(chat: &ChatController<ApiClient>, session: &SessionHandle, cmd: ChatCommand) -> Result<()> {
    let peers = chat.load_peers().await?;
    let me = session.user_id();
    match cmd {
        ChatCommand::Users => {
            if peers.is_empty() {
                println!("{}", "Nobody to chat with yet.".bright_black());
            }
            let selected = chat.selected();
            for peer in &peers {
                println!("{}", render::peer_line(peer, selected));
            }
        }
        ChatCommand::History { peer } => {
            let now = Utc::now();
            for msg in chat.select_peer(peer).await? {
                println!("{}", render::chat_line(&msg, me, now));
            }
        }
        ChatCommand::Send { peer, text } => {
            if chat.selected() != Some(peer) {
                chat.select_peer(peer).await?;
            }
            match chat.send(&text).await? {
                SendOutcome::Confirmed(msg) => println!("{}", render::chat_line(&msg, me, Utc::now())),
                SendOutcome::Resynced => {
                    println!("{}", "Reply not recognised; conversation reloaded:".yellow());
                    let now = Utc::now();
                    for msg in chat.messages() {
                        println!("{}", render::chat_line(&msg, me, now));
                    }
                }
            }
        }
    }
    Ok(())
}

async fn interactive_feed(feed: &FeedController<ApiClient>, config: &ClientConfig) -> Result<()> {
    let show = |feed: &FeedController<ApiClient>| {
        println!("\n{}", render::feed_view(&feed.snapshot(), config.api_root(), feed.is_fetching()));
        println!("{}", render::feed_help());
    };

    if let Err(e) = feed.fetch_next_page().await {
        eprintln!("{}", render::error_line(&e));
    }
    show(feed);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let current = feed.current().map(|v| v.id);

        let result = match (cmd, current) {
            ("q", _) => break,
            ("n", _) => feed.advance().await.map(drop),
            ("p", _) => {
                feed.retreat();
                Ok(())
            }
            ("r", _) => feed.fetch_next_page().await.map(|outcome| {
                if outcome == FetchOutcome::Exhausted {
                    println!("{}", "No more videos.".bright_black());
                }
            }),
            ("l", Some(id)) => feed.toggle_like(id).await.map(drop),
            ("c", Some(id)) => feed.open_comments(id).load().await.map(|c| print_comments(&c)),
            ("a", Some(id)) => feed.open_comments(id).add(rest).await.map(|c| print_comments(&c)),
            ("s", Some(id)) => match rest.trim().parse::<i64>() {
                Ok(receiver) => feed.share(id, receiver).await.map(|m| println!("{}", m.bright_green())),
                Err(_) => Err(ClientError::Validation("usage: s <user id>".into())),
            },
            ("l" | "c" | "a" | "s", None) => Err(ClientError::Validation("no video selected".into())),
            ("", _) => Ok(()),
            _ => Err(ClientError::Validation(format!("unknown command {cmd:?}"))),
        };
        if let Err(e) = result {
            eprintln!("{}", render::error_line(&e));
        }
        show(feed);
    }
    Ok(())
}

fn print_whoami(session: &SessionHandle) {
    match session.current() {
        Some(s) => {
            let name = s.username.as_deref().unwrap_or("(unknown)");
            let id = s.user_id.map(|id| format!(" (id {id})")).unwrap_or_default();
            println!("{}{}", name.bright_cyan().bold(), id);
            if let Some(exp) = s.expires_at {
                println!("  session expires {}", exp.format("%Y-%m-%d %H:%M UTC"));
            }
        }
        None => println!("{}", "Not signed in.".bright_black()),
    }
}

fn print_like(video: i64, count: Option<u64>, liked: bool) {
    let verb = if liked { "Liked" } else { "Unliked" };
    match count {
        Some(n) => println!("{} video {video} ({n} likes)", verb.bright_green()),
        None => println!("{} video {video}", verb.bright_green()),
    }
}

fn print_comments(comments: &[reelfeed::models::Comment]) {
    if comments.is_empty() {
        println!("{}", "No comments yet.".bright_black());
    }
    for c in comments {
        println!("{}", render::comment_line(c));
    }
}

fn or_default<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.trim().is_empty() {
        fallback
    } else {
        message
    }
}

fn password_or_prompt(given: Option<String>) -> Result<String> {
    if let Some(password) = given.or_else(|| std::env::var(ENV_PASSWORD).ok()) {
        return Ok(password);
    }
    eprint!("Password (shown as typed): ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
