use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::models::{UserId, VideoId};

#[derive(Parser, Debug)]
#[command(name = "reelfeed")]
#[command(version)]
#[command(about = "Terminal client for a short-video feed with likes, comments and chat")]
pub struct Args {
    /// Config file (defaults to ./reelfeed.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API root, e.g. http://127.0.0.1:5000/api (overrides config and env)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Log requests and state changes to stderr (-vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Create an account
    Register {
        username: String,
        email: String,
        /// Read from REELFEED_PASSWORD when omitted, else prompted for with echo on
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in and remember the session
    Login {
        username: String,
        /// Read from REELFEED_PASSWORD when omitted, else prompted for with echo on
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show who is signed in
    Whoami,
    /// Show your profile, or update the bio
    Profile {
        #[arg(long)]
        bio: Option<String>,
    },
    /// Upload a video file (16 MiB max by default)
    Upload {
        file: PathBuf,
        #[arg(long, short, default_value = "")]
        description: String,
    },
    /// Browse the feed
    Feed {
        /// Step through videos with single-letter commands
        #[arg(long, short)]
        interactive: bool,
    },
    Like { video: VideoId },
    Unlike { video: VideoId },
    /// List comments on a video
    Comments { video: VideoId },
    /// Comment on a video
    Comment { video: VideoId, text: String },
    /// Send a video to another user's chat
    Share { video: VideoId, receiver: UserId },
    #[command(subcommand)]
    Chat(ChatCommand),
    /// Print a shell completion script
    Completions { shell: Shell },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ChatCommand {
    /// People you can chat with
    Users,
    /// Conversation with a user
    History { peer: UserId },
    Send { peer: UserId, text: String },
}
