//! Terminal chat front end.
//!
//! ```text
//! form-concierge forms/contact.json
//! form-concierge --no-model https://forms.example/contact.yaml
//! ```
//!
//! Lines starting with `/` are commands; everything else is an answer.

use clap::Parser;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use form_concierge::adapters::{
    ChannelSurface, DefinitionLoader, DisabledLanguageModel, OpenAiLanguageModel,
};
use form_concierge::application::{ConversationSession, SessionError};
use form_concierge::config::{AiProvider, AppConfig, ConfigError, LogFormat};
use form_concierge::domain::conversation::{
    ConversationController, ConversationTurn, Sender, TurnOutcome, TurnType, UserResponse,
};
use form_concierge::domain::form::{FieldType, FormField};
use form_concierge::ports::{FormRuntimeError, ImageInput, LanguageModel, ModelError};

#[derive(Parser)]
#[command(name = "form-concierge")]
#[command(about = "Fill in a form by chatting about it")]
struct Args {
    /// Form definition: a path, file:// URL or http(s):// URL
    form_url: String,

    /// Run without a language model (one field per question, answers taken verbatim)
    #[arg(long)]
    no_model: bool,

    /// Override the number of simple fields asked together
    #[arg(long)]
    batch_size: Option<usize>,

    /// Also print system progress messages
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("language model setup failed: {0}")]
    Model(#[from] ModelError),

    #[error("form loader setup failed: {0}")]
    Loader(#[from] FormRuntimeError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn init_logging(config: &AppConfig) {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::EnvFilter;

    // RUST_LOG, when set, overrides the configured level.
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.logging.max_level()).into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let mut config = AppConfig::load()?;
    if args.no_model {
        config.ai.provider = AiProvider::Disabled;
    }
    if let Some(batch_size) = args.batch_size {
        config.conversation.batch_size = batch_size;
    }
    config.validate().map_err(ConfigError::from)?;
    init_logging(&config);

    let model: Arc<dyn LanguageModel> = match config.ai.provider {
        AiProvider::OpenAI => Arc::new(OpenAiLanguageModel::new(config.ai.openai_config())?),
        AiProvider::Disabled => Arc::new(DisabledLanguageModel),
    };
    let loader = DefinitionLoader::new(config.ai.timeout())?
        .with_root_prefix(config.conversation.root_prefix.clone());
    let (surface, mut turns) = ChannelSurface::new();

    let controller =
        ConversationController::new(model, Arc::new(loader), config.conversation.settings())
            .with_surface(Arc::new(surface));
    let session = ConversationSession::new(controller);

    tracing::info!(form_url = %args.form_url, provider = ?config.ai.provider, "starting conversation");
    let started = interruptible(&session, session.start(&args.form_url)).await;
    render(&mut turns, args.verbose);
    started?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                session.abandon();
                None
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            match run_command(command, &session, &args.form_url).await? {
                CommandResult::Quit => break,
                CommandResult::Handled => {}
                CommandResult::Unknown => {
                    report(session.respond(UserResponse::command(line)).await);
                    println!("Commands: /data /progress /history /export <path> /image <path> [text] /reset /quit");
                }
            }
            render(&mut turns, args.verbose);
            continue;
        }

        let pending = pending_widget(&session).await;
        let response = match pending.and_then(|field| widget_value(&field, line).map(|v| (field, v))) {
            Some((field, value)) => UserResponse::widget(field, value),
            None => UserResponse::text(line),
        };
        report(interruptible(&session, session.respond(response)).await);
        render(&mut turns, args.verbose);
    }

    Ok(())
}

enum CommandResult {
    Handled,
    Unknown,
    Quit,
}

async fn run_command(
    command: &str,
    session: &ConversationSession,
    form_url: &str,
) -> Result<CommandResult, CliError> {
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));

    match name {
        "quit" | "exit" => return Ok(CommandResult::Quit),
        "data" => {
            let snapshot = session.snapshot().await;
            println!("{}", pretty(&snapshot.collected_data));
        }
        "progress" => {
            let progress = session.snapshot().await.progress;
            println!(
                "{}/{} fields ({}%)",
                progress.current, progress.total, progress.percentage
            );
        }
        "history" => {
            let snapshot = session.snapshot().await;
            println!("{} turns", snapshot.turns.len());
        }
        "export" if !rest.is_empty() => {
            let snapshot = session.snapshot().await;
            match tokio::fs::write(rest, pretty(&snapshot.collected_data)).await {
                Ok(()) => println!("Saved collected data to {}", rest),
                Err(e) => println!("Could not write {}: {}", rest, e),
            }
        }
        "image" if !rest.is_empty() => {
            let (path, text) = rest
                .split_once(char::is_whitespace)
                .map(|(p, t)| (p, t.trim()))
                .unwrap_or((rest, ""));
            let data = match tokio::fs::read(path).await {
                Ok(data) => data,
                Err(e) => {
                    println!("Could not read {}: {}", path, e);
                    return Ok(CommandResult::Handled);
                }
            };
            let image = ImageInput::bytes(mime_type(Path::new(path)), data);
            let turn = session.respond(UserResponse::image(text, image));
            report(interruptible(session, turn).await);
        }
        "reset" => {
            session.reset().await;
            report(interruptible(session, session.start(form_url)).await);
        }
        _ => return Ok(CommandResult::Unknown),
    }
    Ok(CommandResult::Handled)
}

/// Runs one turn. Ctrl-C abandons the in-flight model call and waits for
/// the turn to unwind.
async fn interruptible<F>(session: &ConversationSession, turn: F) -> Result<TurnOutcome, SessionError>
where
    F: Future<Output = Result<TurnOutcome, SessionError>>,
{
    tokio::pin!(turn);
    tokio::select! {
        result = &mut turn => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, abandoning turn");
            session.abandon();
            turn.await
        }
    }
}

/// Prints recoverable turn failures; the conversation stays usable.
fn report(result: Result<TurnOutcome, SessionError>) {
    match result {
        Ok(outcome) => tracing::debug!(?outcome, "turn finished"),
        Err(SessionError::Busy) => println!("Still working on your last answer..."),
        Err(SessionError::Conversation(e)) if e.is_aborted() => {
            println!("Stopped. Answer again whenever you're ready.")
        }
        Err(e) => {
            tracing::warn!(error = %e, "turn failed");
            println!("Something went wrong: {}", e);
        }
    }
}

fn print_prompt() {
    use std::io::Write;
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn render(turns: &mut UnboundedReceiver<ConversationTurn>, verbose: bool) {
    while let Ok(turn) = turns.try_recv() {
        match turn.sender() {
            Sender::User => {}
            Sender::System if verbose => {
                println!("  · [{}] {}", turn.created_at().clock_time(), turn.content())
            }
            Sender::System => {}
            Sender::Assistant => {
                println!("{}", turn.content());
                if let Some(field) = turn.field() {
                    if let Some(hint) = widget_hint(turn.turn_type(), field) {
                        println!("  {}", hint);
                    }
                }
            }
        }
    }
}

/// The field a widget question is waiting on, if the last question was one.
async fn pending_widget(session: &ConversationSession) -> Option<FormField> {
    let snapshot = session.snapshot().await;
    let last = snapshot
        .turns
        .iter()
        .rev()
        .find(|t| t.sender() == Sender::Assistant)?;
    match last.turn_type() {
        TurnType::Boolean | TurnType::Choice | TurnType::Field => last.field().cloned(),
        _ => None,
    }
}

fn widget_hint(turn_type: TurnType, field: &FormField) -> Option<String> {
    match turn_type {
        TurnType::Boolean => Some("(yes/no)".to_string()),
        TurnType::Choice => {
            let options: Vec<String> = field
                .enum_values
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    let label = field
                        .enum_labels
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| display(value));
                    format!("{}) {}", i + 1, label)
                })
                .collect();
            let hint = options.join("  ");
            if field.field_type == FieldType::CheckboxGroup {
                Some(format!("{}  (numbers, comma separated)", hint))
            } else {
                Some(hint)
            }
        }
        TurnType::Field => match field.field_type {
            FieldType::DateInput => Some("(YYYY-MM-DD)".to_string()),
            FieldType::DatetimeInput => Some("(YYYY-MM-DDTHH:MM)".to_string()),
            _ => None,
        },
        _ => None,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Maps a typed line onto a widget value; `None` falls back to a text reply.
fn widget_value(field: &FormField, input: &str) -> Option<Value> {
    if field.field_type == FieldType::Checkbox && field.enum_values.is_empty() {
        return match input.to_lowercase().as_str() {
            "yes" | "y" | "true" => Some(Value::Bool(true)),
            "no" | "n" | "false" => Some(Value::Bool(false)),
            _ => None,
        };
    }

    if !field.enum_values.is_empty() {
        let pick = |token: &str| -> Option<Value> {
            let token = token.trim();
            if let Ok(index) = token.parse::<usize>() {
                return field.enum_values.get(index.checked_sub(1)?).cloned();
            }
            field
                .enum_values
                .iter()
                .enumerate()
                .find(|(i, value)| {
                    display(value).eq_ignore_ascii_case(token)
                        || field
                            .enum_labels
                            .get(*i)
                            .is_some_and(|label| label.eq_ignore_ascii_case(token))
                })
                .map(|(_, value)| value.clone())
        };
        if field.field_type == FieldType::CheckboxGroup {
            let picked: Option<Vec<Value>> = input.split(',').map(pick).collect();
            return picked.map(Value::Array);
        }
        return pick(input);
    }

    match field.field_type {
        FieldType::DateInput | FieldType::DatetimeInput | FieldType::Color => {
            Some(Value::String(input.to_string()))
        }
        FieldType::Range => input.parse::<f64>().ok().map(Value::from),
        _ => None,
    }
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
