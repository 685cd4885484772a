//! Purpose: Hold top-level CLI command dispatch for `sqlitekvs`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Each command opens the store once and closes it before returning.
//! Invariants: Multi-key writes run inside one transaction.

use super::*;

pub(super) fn dispatch_command(command: Command, target: &StoreTarget) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "sqlitekvs", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Get { key, value_type } => {
            let mut store = target.open()?;
            let value = read_value(&mut store, &key, value_type)?;
            store.close()?;
            match value {
                Some(value) => emit_json(json!({
                    "key": key,
                    "found": true,
                    "type": value.kind().as_str(),
                    "value": value_json(&value),
                })),
                None => emit_json(json!({
                    "key": key,
                    "found": false,
                })),
            }
            Ok(RunOutcome::ok())
        }
        Command::Set {
            key,
            value,
            value_type,
        } => {
            let value = parse_value(&value, value_type)?;
            let mut store = target.open()?;
            store.set(&key, &value)?;
            store.close()?;
            emit_json(json!({
                "key": key,
                "type": value.kind().as_str(),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Has { key } => {
            let mut store = target.open()?;
            let exists = store.has_key(&key)?;
            store.close()?;
            emit_json(json!({ "key": key, "exists": exists }));
            Ok(RunOutcome::ok())
        }
        Command::Delete { keys } => {
            let mut store = target.open()?;
            store.ensure_transaction()?;
            let mut deleted = 0;
            for key in &keys {
                deleted += store.delete_key(key)?;
            }
            store.flush()?;
            store.close()?;
            emit_json(json!({ "deleted": deleted }));
            Ok(RunOutcome::ok())
        }
        Command::Clear => {
            let mut store = target.open()?;
            let deleted = store.delete_all()?;
            store.close()?;
            emit_json(json!({ "deleted": deleted }));
            Ok(RunOutcome::ok())
        }
        Command::Keys { prefix } => {
            let mut store = target.open()?;
            let keys = list_keys(&mut store, prefix.as_deref())?;
            store.close()?;
            emit_json(json!({ "keys": keys }));
            Ok(RunOutcome::ok())
        }
        Command::Sql { sql } => {
            let mut store = target.open()?;
            let output = run_sql_json(&mut store, &sql)?;
            store.close()?;
            emit_json(output);
            Ok(RunOutcome::ok())
        }
        Command::Pragma { pragma } => {
            let mut store = target.open()?;
            let values = store.pragma(&pragma)?;
            store.close()?;
            emit_json(json!({ "values": values }));
            Ok(RunOutcome::ok())
        }
        Command::Vacuum => {
            let mut store = target.open()?;
            store.vacuum()?;
            let path = store.path().display().to_string();
            store.close()?;
            emit_json(json!({ "vacuumed": path }));
            Ok(RunOutcome::ok())
        }
    }
}
