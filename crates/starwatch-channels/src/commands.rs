//! Bot commands: parse `/command args` and apply them to the subscription store.

use starwatch_core::error::StarwatchError;
use starwatch_core::traits::{RepoResolver, SubscriptionStore};
use starwatch_github::parse_repo_ref;
use std::sync::Arc;

use crate::templates;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// Argument is the raw text after the command; may be empty.
    Watch(String),
    Unwatch(String),
    List,
    Unknown(String),
}

impl Command {
    /// Parse a message. Returns `None` for plain text. Accepts the
    /// `/command@botname` form used in group chats.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let (head, args) = match body.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

        Some(match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "watch" | "add" => Command::Watch(args.to_string()),
            "unwatch" | "remove" => Command::Unwatch(args.to_string()),
            "list" => Command::List,
            _ => Command::Unknown(name),
        })
    }
}

/// Applies commands on behalf of a chat and renders the reply.
pub struct CommandHandler {
    store: Arc<dyn SubscriptionStore>,
    resolver: Arc<dyn RepoResolver>,
}

impl CommandHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, resolver: Arc<dyn RepoResolver>) -> Self {
        Self { store, resolver }
    }

    /// Handle one incoming message. `None` means no reply.
    pub async fn handle(&self, chat_id: i64, username: Option<&str>, text: &str) -> Option<String> {
        let command = Command::parse(text)?;
        tracing::debug!("💬 chat {chat_id}: {command:?}");

        let reply = match command {
            Command::Start => match self.store.add_subscriber(chat_id, username).await {
                Ok(()) => templates::welcome(),
                Err(e) => {
                    tracing::error!("❌ Registering chat {chat_id} failed: {e}");
                    templates::internal_error()
                }
            },
            Command::Help => templates::help(),
            Command::Watch(arg) => self.watch(chat_id, username, &arg).await,
            Command::Unwatch(arg) => self.unwatch(chat_id, &arg).await,
            Command::List => match self.store.list_subscriptions(chat_id).await {
                Ok(repos) => templates::subscription_list(&repos),
                Err(e) => {
                    tracing::error!("❌ Listing subscriptions for chat {chat_id} failed: {e}");
                    templates::internal_error()
                }
            },
            Command::Unknown(_) => templates::unknown_command(),
        };
        Some(reply)
    }

    async fn watch(&self, chat_id: i64, username: Option<&str>, arg: &str) -> String {
        if arg.is_empty() {
            return templates::usage("watch");
        }
        let full_name = match parse_repo_ref(arg) {
            Ok(name) => name,
            Err(_) => return templates::invalid_reference(arg),
        };

        let info = match self.resolver.resolve(&full_name).await {
            Ok(info) => info,
            Err(StarwatchError::NotFound(_)) => return templates::repo_not_found(&full_name),
            Err(StarwatchError::RateLimited { .. }) => return templates::rate_limited(),
            Err(e) => {
                tracing::warn!("⚠️ Resolving {full_name} failed: {e}");
                return templates::internal_error();
            }
        };

        let result = async {
            self.store.add_subscriber(chat_id, username).await?;
            let repo = self.store.upsert_repo(&info).await?;
            let created = self.store.subscribe(chat_id, repo.id).await?;
            Ok::<_, StarwatchError>((repo, created))
        }
        .await;

        match result {
            Ok((repo, true)) => {
                tracing::info!("➕ chat {chat_id} now watches {}", repo.full_name);
                templates::watching(&repo)
            }
            Ok((repo, false)) => templates::already_watching(&repo.full_name),
            Err(e) => {
                tracing::error!("❌ Subscribing chat {chat_id} to {full_name} failed: {e}");
                templates::internal_error()
            }
        }
    }

    async fn unwatch(&self, chat_id: i64, arg: &str) -> String {
        if arg.is_empty() {
            return templates::usage("unwatch");
        }
        let full_name = match parse_repo_ref(arg) {
            Ok(name) => name,
            Err(_) => return templates::invalid_reference(arg),
        };

        match self.store.unsubscribe(chat_id, &full_name).await {
            Ok(true) => {
                tracing::info!("➖ chat {chat_id} stopped watching {full_name}");
                templates::unwatched(&full_name)
            }
            Ok(false) => templates::not_watching(&full_name),
            Err(e) => {
                tracing::error!("❌ Unsubscribing chat {chat_id} from {full_name} failed: {e}");
                templates::internal_error()
            }
        }
    }
}
