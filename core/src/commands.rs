//! Stdin command parsing and dispatch for CLI

use depot_core::tasks::ArrivedItem;
use depot_core::{Depot, DepotError, RetrievalOutcome};

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `post <item> [group] [text...]`, group `-` for none
    Post {
        item: i64,
        group: Option<String>,
        text: Option<String>,
    },
    /// `start <principal> [param]`
    Start { principal: i64, param: Option<String> },
    /// `keyword <kw>`
    Keyword(String),
    /// `link <first> [last]`
    Link { first: i64, last: Option<i64> },
    Stats,
    Help,
}

pub const HELP: &str = "\
Commands:
  post <item> [group|-] [text...]   Channel post (grouped posts form an album)
  start <principal> [param]         Start request from a user
  keyword <kw>                      Keyword lookup
  link <first> [last]               Generate a retrieval link
  stats                             Usage counters
  help                              Show this help";

fn parse_id(raw: Option<&str>, what: &str) -> Result<i64, String> {
    let raw = raw.ok_or_else(|| format!("missing {}", what))?;
    raw.parse().map_err(|_| format!("invalid {}: {}", what, raw))
}

/// Parse one input line
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };

    match verb {
        "post" => {
            let item = parse_id(words.next(), "item id")?;
            let group = words.next().filter(|g| *g != "-").map(str::to_string);
            let rest: Vec<&str> = words.collect();
            let text = (!rest.is_empty()).then(|| rest.join(" "));
            Ok(Command::Post { item, group, text })
        }
        "start" => {
            let principal = parse_id(words.next(), "principal id")?;
            let param = words.next().map(str::to_string);
            Ok(Command::Start { principal, param })
        }
        "keyword" => words
            .next()
            .map(|kw| Command::Keyword(kw.to_string()))
            .ok_or_else(|| "missing keyword".to_string()),
        "link" => {
            let first = parse_id(words.next(), "first id")?;
            let last = match words.next() {
                Some(raw) => Some(parse_id(Some(raw), "last id")?),
                None => None,
            };
            Ok(Command::Link { first, last })
        }
        "stats" => Ok(Command::Stats),
        "help" => Ok(Command::Help),
        other => Err(format!("unknown command: {}", other)),
    }
}

/// Run a command, returning what to print
pub async fn execute(depot: &Depot, command: Command) -> Result<String, DepotError> {
    match command {
        Command::Post { item, group, text } => {
            let arrived = match text {
                Some(text) => ArrivedItem::with_text(item, text),
                None => ArrivedItem::new(item),
            };
            Ok(match depot.on_channel_post(group.as_deref(), arrived).await? {
                Some(share) => format!("share {} created", share.code),
                None if group.is_some() => "buffered".to_string(),
                None => "already shared".to_string(),
            })
        }
        Command::Start { principal, param } => {
            let outcome = depot.handle_start(principal, param.as_deref()).await?;
            Ok(describe_outcome(outcome))
        }
        Command::Keyword(keyword) => {
            let hits = depot.lookup_keyword(&keyword).await?;
            if hits.is_empty() {
                return Ok("no matches".to_string());
            }
            Ok(hits
                .iter()
                .map(|hit| format!("{}  {}", hit.share.title, hit.link))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Command::Link { first, last } => depot.generate_link(first, last),
        Command::Stats => {
            let mut stats: Vec<(String, i64)> = depot.stats().await?.into_iter().collect();
            stats.sort();
            Ok(stats
                .iter()
                .map(|(key, count)| format!("{}: {}", key, count))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Command::Help => Ok(HELP.to_string()),
    }
}

fn describe_outcome(outcome: RetrievalOutcome) -> String {
    match outcome {
        RetrievalOutcome::Welcome => "welcome".to_string(),
        RetrievalOutcome::Banned { reason } => format!("banned: {}", reason),
        RetrievalOutcome::JoinRequired { buttons, retry } => {
            let mut lines: Vec<String> = buttons
                .iter()
                .map(|b| format!("join first: {} {}", b.label, b.url))
                .collect();
            if let Some(retry) = retry {
                lines.push(format!("then try again: {}", retry));
            }
            lines.join("\n")
        }
        RetrievalOutcome::RateLimited { wait_secs } => {
            format!("too many requests, retry in {}s", wait_secs)
        }
        RetrievalOutcome::VerificationRequired { link } => format!("verify first: {}", link),
        RetrievalOutcome::Verified => "verified".to_string(),
        RetrievalOutcome::VerificationFailed => "verification failed".to_string(),
        RetrievalOutcome::Delivered(delivery) => format!(
            "delivered {} item(s), {} skipped{}",
            delivery.sent.len(),
            delivery.skipped,
            if delivery.auto_delete.is_some() { ", auto-delete scheduled" } else { "" }
        ),
        RetrievalOutcome::ShareEmpty => "share is empty".to_string(),
        RetrievalOutcome::ContentGone => "content no longer available".to_string(),
        RetrievalOutcome::NotFound => "not found".to_string(),
        RetrievalOutcome::RangeTooLarge { requested, max } => {
            format!("range of {} items exceeds the limit of {}", requested, max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post() {
        assert_eq!(
            parse_command("post 12 album-1 summer trip").unwrap(),
            Command::Post {
                item: 12,
                group: Some("album-1".to_string()),
                text: Some("summer trip".to_string()),
            }
        );
        assert_eq!(
            parse_command("post 12 - caption").unwrap(),
            Command::Post {
                item: 12,
                group: None,
                text: Some("caption".to_string()),
            }
        );
        assert_eq!(
            parse_command("post 12").unwrap(),
            Command::Post { item: 12, group: None, text: None }
        );
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(
            parse_command("start 5 AbCd1234").unwrap(),
            Command::Start { principal: 5, param: Some("AbCd1234".to_string()) }
        );
        assert_eq!(
            parse_command("link 3 9").unwrap(),
            Command::Link { first: 3, last: Some(9) }
        );
        assert_eq!(parse_command("keyword x").unwrap(), Command::Keyword("x".to_string()));
        assert_eq!(parse_command("stats").unwrap(), Command::Stats);
    }

    #[test]
    fn test_describe_join_prompt() {
        let text = describe_outcome(RetrievalOutcome::JoinRequired {
            buttons: vec![depot_core::LinkButton::new("Join channel 1", "https://t.me/+abc")],
            retry: Some("https://t.me/bot?start=AbCd1234".to_string()),
        });
        assert_eq!(
            text,
            "join first: Join channel 1 https://t.me/+abc\nthen try again: https://t.me/bot?start=AbCd1234"
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("").is_err());
        assert!(parse_command("post").is_err());
        assert!(parse_command("post abc").is_err());
        assert!(parse_command("link 1 x").is_err());
        assert!(parse_command("keyword").is_err());
        assert!(parse_command("fly").is_err());
    }
}
