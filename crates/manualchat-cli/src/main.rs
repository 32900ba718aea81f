//! manualchat CLI - administer the conversation store

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use manualchat_core::models::{ListConversations, Message};
use manualchat_core::{Config, ConnectionManager, Database};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "manualchat",
    author,
    version,
    about = "Administer the manualchat conversation store",
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or update the schema
    Migrate,

    /// List a user's conversations, newest first
    List {
        /// Owner id
        #[arg(long)]
        user: Uuid,

        /// Maximum results
        #[arg(short, long, default_value = "20", value_parser = clap::value_parser!(u32).range(1..))]
        limit: u32,

        /// Only conversations newer than this one
        #[arg(long)]
        after: Option<Uuid>,

        /// Only conversations older than this one
        #[arg(long)]
        before: Option<Uuid>,
    },

    /// Show a conversation with its messages and votes
    Show {
        /// Conversation ID
        id: Uuid,
    },

    /// Delete a conversation with its messages and votes
    Delete {
        /// Conversation ID
        id: Uuid,
    },

    /// Count messages a user sent recently
    Usage {
        /// Owner id
        #[arg(long)]
        user: Uuid,

        /// Trailing window in hours
        #[arg(long, default_value = "24")]
        hours: i64,
    },

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Show database statistics
    Stats,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    /// Register a user
    Add {
        #[arg(long)]
        email: String,

        /// Read the password from the first line of stdin
        #[arg(long)]
        password_stdin: bool,
    },

    /// Look up users by email
    Find {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    // Load config
    let config_path = cli
        .config
        .map(|path| Config::expand_path(&path.to_string_lossy()))
        .unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)?;

    let connections = ConnectionManager::new(config.database.clone());
    connections.probe().await;
    let db = connections.database();

    let result = match cli.command {
        Command::Migrate => cmd_migrate(db).await,
        Command::List {
            user,
            limit,
            after,
            before,
        } => cmd_list(db, user, limit, after, before).await,
        Command::Show { id } => cmd_show(db, id).await,
        Command::Delete { id } => cmd_delete(db, id).await,
        Command::Usage { user, hours } => cmd_usage(db, user, hours).await,
        Command::User { command } => cmd_user(db, command).await,
        Command::Stats => cmd_stats(db).await,
    };

    connections.shutdown().await;
    result
}

async fn cmd_migrate(db: &Database) -> Result<()> {
    if !db.is_configured() {
        bail!("No database configured. Set DATABASE_URL or database.url in the config file.");
    }
    db.migrate().await?;
    println!("Schema is up to date.");
    Ok(())
}

async fn cmd_list(
    db: &Database,
    user: Uuid,
    limit: u32,
    after: Option<Uuid>,
    before: Option<Uuid>,
) -> Result<()> {
    let page = db
        .conversations()
        .list(&ListConversations {
            owner_id: user,
            limit,
            starting_after: after,
            ending_before: before,
        })
        .await?;

    if page.items.is_empty() {
        println!("No conversations found.");
        return Ok(());
    }

    for conv in &page.items {
        let date = conv.created_at.format("%Y-%m-%d %H:%M");
        println!(
            "{} | {} | {} | {}",
            conv.id,
            date,
            conv.visibility,
            truncate(&conv.title, 60)
        );
    }
    if page.has_more {
        if let Some(last) = page.items.last() {
            println!("\nMore available: --before {}", last.id);
        }
    }

    Ok(())
}

async fn cmd_show(db: &Database, id: Uuid) -> Result<()> {
    let conv = db
        .conversations()
        .get(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Conversation not found"))?;

    println!("Title: {}", conv.title);
    println!("Owner: {}", conv.user_id);
    println!("Created: {}", conv.created_at);
    println!("Visibility: {}", conv.visibility);
    println!();

    let votes = db.votes().list(id).await?;
    for msg in db.messages().list(id).await? {
        let vote = votes
            .iter()
            .find(|v| v.message_id == msg.id)
            .map_or("", |v| if v.is_upvoted { " [+1]" } else { " [-1]" });
        println!("--- {}{} ---", msg.role, vote);
        println!("{}", message_text(&msg));
        println!();
    }

    Ok(())
}

async fn cmd_delete(db: &Database, id: Uuid) -> Result<()> {
    match db.conversations().delete(id).await? {
        Some(conv) => println!("Deleted conversation: {} ({})", conv.id, conv.title),
        None => bail!("Conversation not found"),
    }
    Ok(())
}

async fn cmd_usage(db: &Database, user: Uuid, hours: i64) -> Result<()> {
    let count = db.messages().count_recent(user, hours).await?;
    println!("Messages in the last {hours}h: {count}");
    Ok(())
}

async fn cmd_user(db: &Database, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::Add {
            email,
            password_stdin,
        } => {
            if !password_stdin {
                bail!("Pass --password-stdin and pipe the password in");
            }
            let mut password = String::new();
            io::stdin()
                .lock()
                .read_line(&mut password)
                .context("Failed to read password from stdin")?;
            let password = password.trim_end_matches(['\r', '\n']);
            if password.is_empty() {
                bail!("Password must not be empty");
            }

            let user = db.users().create(&email, password).await?;
            println!("Added user: {} ({})", user.id, email);
        }
        UserCommand::Find { email } => {
            let users = db.users().get_by_email(&email).await?;
            if users.is_empty() {
                println!("No users found.");
            }
            for user in users {
                println!("{} | {}", user.id, user.email.as_deref().unwrap_or(""));
            }
        }
    }
    Ok(())
}

async fn cmd_stats(db: &Database) -> Result<()> {
    let conv_count = db.conversations().count().await?;
    let msg_count = db.messages().count().await?;

    println!("Database Statistics");
    println!("-------------------");
    println!("Conversations: {conv_count}");
    println!("Messages:      {msg_count}");

    Ok(())
}

/// Readable text of a message: its text parts joined, or the raw payload.
fn message_text(msg: &Message) -> String {
    let parts = msg
        .content
        .get("parts")
        .and_then(serde_json::Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(serde_json::Value::as_str))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if !parts.is_empty() {
        return parts.join("\n");
    }
    match msg.content.as_str() {
        Some(text) => text.to_string(),
        None => msg.content.to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_chars {
        s
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
