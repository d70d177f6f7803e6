//! Message texts. All output uses Telegram's legacy Markdown.

use starwatch_core::types::TrackedRepo;

/// Escape the characters legacy Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn plural(n: i64, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Star gain alert. The repository link is a Markdown entity so underscores
/// in the URL are never read as italics.
pub fn star_alert(name: &str, full_name: &str, gained: i64, total: i64) -> String {
    format!(
        "⭐ *{}* gained {}!\nTotal: {total} ⭐\n\n[{}](https://github.com/{full_name})",
        escape_markdown(name),
        plural(gained, "new star", "new stars"),
        escape_markdown(full_name),
    )
}

pub fn welcome() -> String {
    format!(
        "👋 *Welcome to Starwatch!*\n\
         I'll message you whenever a repository you watch gains stars.\n\n{}",
        help()
    )
}

pub fn help() -> String {
    "*Commands*\n\
     /watch owner/repo: start watching a repository\n\
     /unwatch owner/repo: stop watching\n\
     /list: show what you watch\n\
     /help: show this message"
        .to_string()
}

pub fn watching(repo: &TrackedRepo) -> String {
    format!(
        "✅ Now watching *{}* ({} right now).",
        escape_markdown(&repo.full_name),
        plural(repo.stars, "star", "stars"),
    )
}

pub fn already_watching(full_name: &str) -> String {
    format!("ℹ️ You already watch *{}*.", escape_markdown(full_name))
}

pub fn unwatched(full_name: &str) -> String {
    format!("🗑️ Stopped watching *{}*.", escape_markdown(full_name))
}

pub fn not_watching(full_name: &str) -> String {
    format!("ℹ️ You don't watch *{}*.", escape_markdown(full_name))
}

pub fn repo_not_found(full_name: &str) -> String {
    format!(
        "❌ Repository *{}* was not found on GitHub.",
        escape_markdown(full_name)
    )
}

pub fn usage(command: &str) -> String {
    format!("Usage: /{command} owner/repo")
}

pub fn invalid_reference(input: &str) -> String {
    format!(
        "❌ `{}` doesn't look like a repository. Try owner/repo or a github.com link.",
        input.replace('`', "'")
    )
}

pub fn rate_limited() -> String {
    "⏳ GitHub is rate limiting me right now. Please try again later.".to_string()
}

pub fn unknown_command() -> String {
    format!("🤔 I don't know that command.\n\n{}", help())
}

pub fn internal_error() -> String {
    "⚠️ Something went wrong. Please try again later.".to_string()
}

pub fn subscription_list(repos: &[TrackedRepo]) -> String {
    if repos.is_empty() {
        return "📭 You aren't watching anything yet. Try /watch owner/repo".to_string();
    }
    let mut out = format!("👀 *Watching {}*\n", plural(repos.len() as i64, "repository", "repositories"));
    for repo in repos {
        out.push_str(&format!(
            "\n• [{}]({}) ⭐ {}",
            escape_markdown(&repo.full_name),
            repo.html_url(),
            repo.stars
        ));
    }
    out
}
