//! Purpose: `sqlitekvs` CLI entry point.
//! Role: Binary crate root; parses args, opens the store, emits JSON on stdout.
//! Invariants: Commands emit JSON on stdout (pretty on a terminal, compact otherwise).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All store access goes through `api::Store`.
#![allow(clippy::result_large_err)]

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::error::ErrorKind as ClapErrorKind;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::aot::Shell;
use serde_json::{Map, Value as JsonValue, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod store_paths;

use sqlitekvs::api::{
    Error, ErrorKind, JournalMode, RowControl, Store, StoreOptions, Value, to_exit_code,
};
use store_paths::{default_store_path, ensure_parent_dir};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `sqlitekvs --help`."));
            }
        },
    };

    let target = StoreTarget {
        path: cli.db,
        options: store_options(cli.busy_timeout_ms, cli.journal_mode),
    };
    command_dispatch::dispatch_command(cli.command, &target)
        .map_err(add_busy_hint)
        .map_err(add_corrupt_hint)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "sqlitekvs",
    version,
    about = "Persistent key-value store in a single SQLite file",
    long_about = None,
    after_help = r#"EXAMPLES
  $ sqlitekvs set greeting hello
  $ sqlitekvs get greeting
  $ sqlitekvs set --type int retries 3
  $ sqlitekvs --db ./app.db keys --prefix user.
  $ sqlitekvs sql "SELECT key, typeof(value) FROM KeyValueStore"

The default store is ~/.sqlitekvs/store.db. Set RUST_LOG=debug for engine diagnostics."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Store file (default: ~/.sqlitekvs/store.db)",
        value_hint = ValueHint::FilePath
    )]
    db: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Wait up to this many milliseconds when the store is locked"
    )]
    busy_timeout_ms: Option<u64>,
    #[arg(long, global = true, value_enum, help = "Journal mode applied on open")]
    journal_mode: Option<JournalModeCli>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum JournalModeCli {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl From<JournalModeCli> for JournalMode {
    fn from(mode: JournalModeCli) -> Self {
        match mode {
            JournalModeCli::Delete => JournalMode::Delete,
            JournalModeCli::Truncate => JournalMode::Truncate,
            JournalModeCli::Persist => JournalMode::Persist,
            JournalModeCli::Memory => JournalMode::Memory,
            JournalModeCli::Wal => JournalMode::Wal,
            JournalModeCli::Off => JournalMode::Off,
        }
    }
}

/// Logical type used to encode `set` input and decode `get` output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ValueType {
    Auto,
    Int,
    Double,
    Text,
    Bytes,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Read one value")]
    Get {
        #[arg(help = "Key to read")]
        key: String,
        #[arg(
            long = "type",
            value_enum,
            default_value = "auto",
            help = "Expected type; auto reports whatever is stored"
        )]
        value_type: ValueType,
    },
    #[command(
        about = "Write one value",
        after_help = r#"EXAMPLES
  $ sqlitekvs set name "Ada"
  $ sqlitekvs set --type double ratio 0.75
  $ sqlitekvs set --type bytes blob AAEC"#
    )]
    Set {
        #[arg(help = "Key to write")]
        key: String,
        #[arg(help = "Value; base64 when --type bytes", allow_hyphen_values = true)]
        value: String,
        #[arg(
            long = "type",
            value_enum,
            default_value = "text",
            help = "How to store the value"
        )]
        value_type: ValueType,
    },
    #[command(about = "Report whether a key exists")]
    Has {
        #[arg(help = "Key to check")]
        key: String,
    },
    #[command(about = "Delete keys; absent keys are not an error")]
    Delete {
        #[arg(required = true, help = "Keys to delete")]
        keys: Vec<String>,
    },
    #[command(about = "Delete every key")]
    Clear,
    #[command(about = "List keys in sorted order")]
    Keys {
        #[arg(long, help = "Only keys starting with this prefix")]
        prefix: Option<String>,
    },
    #[command(about = "Run arbitrary SQL and print result rows")]
    Sql {
        #[arg(help = "One or more SQL statements")]
        sql: String,
    },
    #[command(about = "Run a single pragma and print its values")]
    Pragma {
        #[arg(help = "Pragma body, e.g. `user_version` or `page_size = 4096`")]
        pragma: String,
    },
    #[command(about = "Rebuild the store file to reclaim space")]
    Vacuum,
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
    #[command(about = "Print version information")]
    Version,
}

struct StoreTarget {
    path: Option<PathBuf>,
    options: StoreOptions,
}

impl StoreTarget {
    fn open(&self) -> Result<Store, Error> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => {
                let path = default_store_path();
                ensure_parent_dir(&path)?;
                path
            }
        };
        Store::open_with(&path, &self.options)
    }
}

fn store_options(busy_timeout_ms: Option<u64>, journal_mode: Option<JournalModeCli>) -> StoreOptions {
    let mut options = StoreOptions::new();
    if let Some(ms) = busy_timeout_ms {
        options = options.with_busy_timeout(Duration::from_millis(ms));
    }
    if let Some(mode) = journal_mode {
        options = options.with_journal_mode(mode.into());
    }
    options
}

fn parse_value(input: &str, value_type: ValueType) -> Result<Value, Error> {
    match value_type {
        ValueType::Text | ValueType::Auto => Ok(Value::Text(input.to_string())),
        ValueType::Int => input.trim().parse::<i64>().map(Value::Int).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid int value: {input}"))
                .with_hint("Pass a base-10 integer such as 42 or -7.")
                .with_source(err)
        }),
        ValueType::Double => input.trim().parse::<f64>().map(Value::Double).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid double value: {input}"))
                .with_source(err)
        }),
        ValueType::Bytes => BASE64.decode(input.trim()).map(Value::Bytes).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid base64 for --type bytes")
                .with_source(err)
        }),
    }
}

fn read_value(store: &mut Store, key: &str, value_type: ValueType) -> Result<Option<Value>, Error> {
    Ok(match value_type {
        ValueType::Auto => store.try_get(key)?,
        ValueType::Int => store.try_get_int(key)?.map(Value::Int),
        ValueType::Double => store.try_get_double(key)?.map(Value::Double),
        ValueType::Text => store.try_get_text(key)?.map(Value::Text),
        ValueType::Bytes => store.try_get_bytes(key)?.map(Value::Bytes),
    })
}

fn value_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Int(int) => json!(int),
        Value::Double(double) => json!(double),
        Value::Text(text) => json!(text),
        Value::Bytes(bytes) => json!(BASE64.encode(bytes)),
    }
}

fn list_keys(store: &mut Store, prefix: Option<&str>) -> Result<Vec<String>, Error> {
    let mut keys = Vec::new();
    store.run_sql("SELECT key FROM KeyValueStore ORDER BY key", |row| {
        if let Some(key) = row.get("key") {
            if prefix.is_none_or(|prefix| key.starts_with(prefix)) {
                keys.push(key.to_string());
            }
        }
        RowControl::Continue
    })?;
    Ok(keys)
}

fn run_sql_json(store: &mut Store, sql: &str) -> Result<JsonValue, Error> {
    let mut rows = Vec::new();
    let summary = store.run_sql(sql, |row| {
        let mut object = Map::new();
        for (column, value) in row.columns().iter().zip(row.values()) {
            object.insert(column.clone(), json!(value));
        }
        rows.push(JsonValue::Object(object));
        RowControl::Continue
    })?;
    Ok(json!({
        "statements": summary.statements,
        "rows": rows,
    }))
}

fn emit_json(value: JsonValue) {
    let pretty = io::stdout().is_terminal();
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("sqlitekvs {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "sqlitekvs",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn add_busy_hint(err: Error) -> Error {
    if err.kind() == ErrorKind::Busy && err.hint().is_none() {
        return err.with_hint("Another process holds the store lock; retry or pass --busy-timeout-ms.");
    }
    err
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() == ErrorKind::Corrupt && err.hint().is_none() {
        return err.with_hint("The file is not a readable SQLite database; check the --db path.");
    }
    err
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Open => "failed to open store".to_string(),
        ErrorKind::Schema => "failed to create store table".to_string(),
        ErrorKind::Engine => "engine error".to_string(),
        ErrorKind::Busy => "store is busy".to_string(),
        ErrorKind::Misuse => "statement misuse".to_string(),
        ErrorKind::TypeMismatch => "stored value has a different type".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> JsonValue {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(key) = err.key() {
        inner.insert("key".to_string(), json!(key));
    }
    if let Some(code) = err.extended_code() {
        inner.insert("code".to_string(), json!(code));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), JsonValue::Object(inner));
    JsonValue::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(key) = err.key() {
        lines.push(format!("key: {key}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", display_path(path)));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn display_path(path: &Path) -> String {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match home.as_deref().and_then(|home| path.strip_prefix(home).ok()) {
        Some(rest) => format!("~/{}", rest.display()),
        None => path.display().to_string(),
    }
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
