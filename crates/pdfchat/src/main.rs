//! A terminal front end for `pdfchat`.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::path::Path;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use pdfchat::core::{RejectReason, TurnReport};
use pdfchat::extractor::HttpExtractor;
use pdfchat::store::{LogStore, MemoryLogStore, Message, Sender};
use pdfchat::{Session, SessionBuilder, TranscriptView, ViewChange, render_message};
use pdfchat_firestore_store::{FirestoreConfigBuilder, FirestoreLogStore};
use pdfchat_gemini_model::{GeminiConfigBuilder, GeminiProvider};
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("GEMINI_API_KEY") else {
        eprintln!("GEMINI_API_KEY environment variable is not set");
        return;
    };
    let Ok(model) = env::var("GEMINI_MODEL_NAME") else {
        eprintln!("GEMINI_MODEL_NAME environment variable is not set");
        return;
    };

    let mut config = GeminiConfigBuilder::with_api_key(api_key).with_model(model);
    if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    let model_provider = GeminiProvider::new(config.build());

    let extractor = env::var("PDFCHAT_EXTRACTOR_URL")
        .map_or_else(|_| HttpExtractor::default(), HttpExtractor::new);

    let session =
        SessionBuilder::new(model_provider, open_store(), Arc::new(extractor))
            .build();

    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel();
    let _subscription = session.subscribe(move |snapshot| {
        snapshot_tx.send(snapshot.to_vec()).ok();
    });
    let mut view = TranscriptView::new();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    loop {
        while let Ok(snapshot) = snapshot_rx.try_recv() {
            render_snapshot(&mut view, &snapshot);
        }

        print!("> ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let line = match parse_input(&line) {
            Input::Quit => break,
            Input::Upload(path) => {
                let progress_bar = ProgressBar::new_spinner();
                progress_bar.set_style(progress_style.clone());
                progress_bar.set_message("Extracting document...");
                progress_bar.enable_steady_tick(Duration::from_millis(100));
                let result = upload(&session, path).await;
                progress_bar.finish_and_clear();
                match result {
                    Ok(count) => println!(
                        "{}Extracted {count} segments, ask away.",
                        BAR_CHAR.bright_green()
                    ),
                    Err(err) => print_error(&err),
                }
                continue;
            }
            Input::Message(line) => line,
        };

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("Sending message...");
        let mut turn = pin!(session.send_message(line));
        let report = loop {
            progress_bar.inc(1);
            select! {
                report = &mut turn => {
                    break report;
                }
                Some(snapshot) = snapshot_rx.recv() => {
                    progress_bar.suspend(|| render_snapshot(&mut view, &snapshot));
                }
                _ = sleep(Duration::from_millis(100)) => {}
            }
        };
        progress_bar.finish_and_clear();
        print_report(&report);
    }
}

/// One line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Upload(&'a str),
    Message(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match command {
        "/quit" if rest.trim().is_empty() => Input::Quit,
        "/upload" => Input::Upload(rest.trim()),
        _ => Input::Message(line),
    }
}

fn open_store() -> Arc<dyn LogStore> {
    let Ok(project_id) = env::var("FIRESTORE_PROJECT_ID") else {
        warn!("FIRESTORE_PROJECT_ID is not set, messages are kept in memory");
        return Arc::new(MemoryLogStore::new());
    };
    let mut config = FirestoreConfigBuilder::with_project_id(project_id);
    if let Ok(api_key) = env::var("FIRESTORE_API_KEY") {
        config = config.with_api_key(api_key);
    }
    if let Ok(token) = env::var("FIRESTORE_ACCESS_TOKEN") {
        config = config.with_access_token(token);
    }
    if let Ok(collection) = env::var("FIRESTORE_COLLECTION") {
        config = config.with_collection(collection);
    }
    Arc::new(FirestoreLogStore::new(config.build()))
}

async fn upload(session: &Session, path: &str) -> Result<usize, String> {
    if path.is_empty() {
        return Err("usage: /upload <path>".to_owned());
    }
    let document = tokio::fs::read(path)
        .await
        .map_err(|err| format!("cannot read {path}: {err}"))?;
    let file_name = Path::new(path)
        .file_name()
        .map_or_else(|| path.to_owned(), |name| name.to_string_lossy().into_owned());
    session
        .upload_document(&file_name, document)
        .await
        .map_err(|err| err.to_string())
}

fn render_snapshot(view: &mut TranscriptView, snapshot: &[Message]) {
    let shown = match view.apply(snapshot) {
        ViewChange::Unchanged => return,
        ViewChange::Appended(range) => range,
        ViewChange::Replaced => {
            println!("{}", "--- conversation reloaded ---".dimmed());
            0..snapshot.len()
        }
    };
    for message in &view.messages()[shown] {
        let bar = match message.sender {
            Sender::User => BAR_CHAR.bright_green().to_string(),
            Sender::Bot => BAR_CHAR.bright_cyan().to_string(),
        };
        println!("{bar}{}", render_message(message).bright_white());
    }
}

fn print_report(report: &TurnReport) {
    match report {
        TurnReport::Rejected(RejectReason::EmptyInput) => {}
        TurnReport::Rejected(RejectReason::Busy) => {
            print_error("still busy with the previous message");
        }
        TurnReport::Rejected(RejectReason::Stopped) | TurnReport::Aborted => {
            print_error("the conversation has stopped");
        }
        TurnReport::SegmentReplay(_) | TurnReport::SingleTurn(_) => {
            for err in report.errors() {
                print_error(&err.to_string());
            }
        }
    }
}

fn print_error(message: &str) {
    eprintln!("{}{}", BAR_CHAR.bright_red(), message.red());
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("/quit\n"), Input::Quit);
        assert_eq!(
            parse_input("/upload  docs/report.pdf \n"),
            Input::Upload("docs/report.pdf")
        );
        assert_eq!(parse_input("/upload"), Input::Upload(""));
        // Only the whole word is a command.
        assert_eq!(
            parse_input("/uploadnotes.pdf"),
            Input::Message("/uploadnotes.pdf")
        );
        assert_eq!(parse_input("/quitting"), Input::Message("/quitting"));
        assert_eq!(
            parse_input("  What is this about?\n"),
            Input::Message("What is this about?")
        );
    }
}
