//! Interactive session loop.
//!
//! Plain lines are questions. Lines starting with `:` are commands.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use veritas_core::Role;
use veritas_session::confirmation::is_affirmative;
use veritas_session::{GatewayClient, Session, SessionError};

use crate::{print_answer, print_job, read_uploads, AppResult};

const HELP: &str = "\
Type a question, or one of:
  :url <URL>         ingest a web page
  :files <PATH>...   upload documents
  :reset             delete everything in the knowledge base
  :evidence          show the evidence for the last answer
  :history           show the conversation so far
  :quit              leave";

#[derive(Debug, PartialEq, Eq)]
enum ChatCommand {
    Ask(String),
    Url(String),
    Files(Vec<PathBuf>),
    Reset,
    Evidence,
    History,
    Help,
    Quit,
    Unknown(String),
}

fn parse_line(line: &str) -> ChatCommand {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return ChatCommand::Ask(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "url" => ChatCommand::Url(arg.to_string()),
        "files" => ChatCommand::Files(arg.split_whitespace().map(PathBuf::from).collect()),
        "reset" => ChatCommand::Reset,
        "evidence" => ChatCommand::Evidence,
        "history" => ChatCommand::History,
        "help" => ChatCommand::Help,
        "quit" | "q" | "exit" => ChatCommand::Quit,
        other => ChatCommand::Unknown(other.to_string()),
    }
}

async fn prompt(text: &str) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await
}

/// Print a refusal and carry on; anything else ends the loop.
fn report(result: Result<(), SessionError>) -> Result<(), SessionError> {
    match result {
        Err(e @ SessionError::Busy { .. }) => {
            println!("Busy: {}", e);
            Ok(())
        }
        other => other,
    }
}

pub async fn run(session: &Session<GatewayClient>) -> AppResult<()> {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt("\n> ").await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            ChatCommand::Ask(query) => {
                let outcome = session.ask(&query).await;
                report(outcome.map(|o| print_answer(o, session)))?;
            }
            ChatCommand::Url(url) => {
                let job = session.ingest_url(&url).await;
                report(job.map(print_job))?;
            }
            ChatCommand::Files(paths) => match read_uploads(&paths).await {
                Ok(uploads) => {
                    let job = session.ingest_files(&uploads).await;
                    report(job.map(print_job))?;
                }
                Err(e) => println!("Could not read files: {}", e),
            },
            ChatCommand::Reset => {
                let request = session.request_reset();
                prompt(&format!("{} [y/N] ", request.prompt())).await?;
                let answer = lines.next_line().await?.unwrap_or_default();
                match request.answer(is_affirmative(&answer)) {
                    Some(confirmed) => {
                        let job = session.reset(confirmed).await;
                        report(job.map(|j| println!("{}", j.message)))?;
                    }
                    None => println!("Reset cancelled."),
                }
            }
            ChatCommand::Evidence => {
                let evidence = session.evidence();
                if evidence.is_empty() {
                    println!("No evidence yet.");
                }
                for (i, snippet) in evidence.snippets().iter().enumerate() {
                    println!("[{}] {}", i + 1, snippet);
                }
            }
            ChatCommand::History => {
                for turn in session.history().turns() {
                    let who = match turn.role {
                        Role::User => "you",
                        Role::Agent => "veritas",
                    };
                    println!("{:>8}: {}", who, turn.content);
                }
            }
            ChatCommand::Help => println!("{}", HELP),
            ChatCommand::Quit => break,
            ChatCommand::Unknown(name) => println!("Unknown command :{} (try :help)", name),
        }
    }

    tracing::debug!(turns = session.history().len(), "Chat session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_a_question() {
        assert_eq!(
            parse_line("  What is RAG?  "),
            ChatCommand::Ask("What is RAG?".to_string())
        );
        assert_eq!(parse_line(""), ChatCommand::Ask(String::new()));
    }

    #[test]
    fn test_url_command() {
        assert_eq!(
            parse_line(":url https://example.com "),
            ChatCommand::Url("https://example.com".to_string())
        );
        assert_eq!(parse_line(":url"), ChatCommand::Url(String::new()));
    }

    #[test]
    fn test_files_command() {
        assert_eq!(
            parse_line(":files a.pdf  docs/b.pdf"),
            ChatCommand::Files(vec![PathBuf::from("a.pdf"), PathBuf::from("docs/b.pdf")])
        );
        assert_eq!(parse_line(":files"), ChatCommand::Files(vec![]));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_line(":reset"), ChatCommand::Reset);
        assert_eq!(parse_line(":evidence"), ChatCommand::Evidence);
        assert_eq!(parse_line(":history"), ChatCommand::History);
        assert_eq!(parse_line(":help"), ChatCommand::Help);
        assert_eq!(parse_line(":quit"), ChatCommand::Quit);
        assert_eq!(parse_line(":q"), ChatCommand::Quit);
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_line(":frobnicate now"),
            ChatCommand::Unknown("frobnicate".to_string())
        );
    }

    #[test]
    fn test_busy_is_reported_not_fatal() {
        use veritas_session::{JobKind, Resource};

        let busy = Err(SessionError::Busy {
            resource: Resource::KnowledgeBase,
            kind: JobKind::Reset,
        });
        assert!(report(busy).is_ok());
    }
}
