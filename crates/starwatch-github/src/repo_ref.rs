//! Parse user-supplied repository references into `owner/name`.

use starwatch_core::error::{Result, StarwatchError};

/// Accepts `owner/name`, `https://github.com/owner/name` (with optional
/// `www.`, trailing slash, `.git` or deeper path like `/tree/main`) and
/// `git@github.com:owner/name.git`.
pub fn parse_repo_ref(input: &str) -> Result<String> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(StarwatchError::InvalidInput("empty repository reference".into()));
    }

    let without_scheme = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"));
    let host_part = without_scheme.unwrap_or(raw);
    let host_part = host_part.strip_prefix("www.").unwrap_or(host_part);

    let rest = if let Some(path) = host_part.strip_prefix("github.com/") {
        path
    } else if let Some(path) = raw.strip_prefix("git@github.com:") {
        path
    } else if without_scheme.is_some() || raw.contains(':') || raw.starts_with("git@") {
        // some other host
        return Err(invalid(raw));
    } else {
        raw
    };

    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let (Some(owner), Some(name)) = (segments.next(), segments.next()) else {
        return Err(invalid(raw));
    };
    let name = name.strip_suffix(".git").unwrap_or(name);

    if !valid_segment(owner) || !valid_segment(name) {
        return Err(invalid(raw));
    }
    Ok(format!("{owner}/{name}"))
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn invalid(raw: &str) -> StarwatchError {
    StarwatchError::InvalidInput(format!(
        "'{raw}' is not a repository (expected owner/name or a github.com URL)"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_forms() {
        let cases = [
            "tokio-rs/tokio",
            "  tokio-rs/tokio  ",
            "https://github.com/tokio-rs/tokio",
            "https://github.com/tokio-rs/tokio/",
            "http://www.github.com/tokio-rs/tokio.git",
            "github.com/tokio-rs/tokio/tree/master/tokio",
            "git@github.com:tokio-rs/tokio.git",
        ];
        for case in cases {
            assert_eq!(parse_repo_ref(case).unwrap(), "tokio-rs/tokio", "{case}");
        }
    }

    #[test]
    fn test_dots_and_underscores_kept() {
        assert_eq!(parse_repo_ref("user_1/my.repo").unwrap(), "user_1/my.repo");
    }

    #[test]
    fn test_rejected_forms() {
        for case in [
            "",
            "tokio",
            "https://gitlab.com/a/b",
            "owner/na me",
            "owner/../x",
            "https://github.com/only-owner",
        ] {
            let err = parse_repo_ref(case).unwrap_err();
            assert!(matches!(err, StarwatchError::InvalidInput(_)), "{case}");
        }
    }
}
