// CLI integration tests for the basic key-value flows.
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_sqlitekvs");
    Command::new(exe)
}

fn run(db: &Path, args: &[&str]) -> Output {
    cmd()
        .arg("--db")
        .arg(db)
        .args(args)
        .output()
        .expect("run sqlitekvs")
}

fn parse_json(output: &[u8]) -> Value {
    let text = std::str::from_utf8(output).expect("utf8");
    serde_json::from_str(text.trim()).expect("valid json")
}

#[test]
fn set_get_has_delete_flow() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("kv.db");

    let set = run(&db, &["set", "greeting", "hello"]);
    assert!(set.status.success());
    let set_json = parse_json(&set.stdout);
    assert_eq!(set_json["type"], "text");

    let get = run(&db, &["get", "greeting"]);
    assert!(get.status.success());
    let get_json = parse_json(&get.stdout);
    assert_eq!(get_json["found"], true);
    assert_eq!(get_json["value"], "hello");

    let has = run(&db, &["has", "greeting"]);
    assert_eq!(parse_json(&has.stdout)["exists"], true);

    let delete = run(&db, &["delete", "greeting", "never-set"]);
    assert!(delete.status.success());
    assert_eq!(parse_json(&delete.stdout)["deleted"], 1);

    let get = run(&db, &["get", "greeting"]);
    assert!(get.status.success());
    assert_eq!(parse_json(&get.stdout)["found"], false);
}

#[test]
fn typed_values_and_bytes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("kv.db");

    assert!(run(&db, &["set", "--type", "int", "n", "-5"]).status.success());
    assert!(run(&db, &["set", "--type", "double", "ratio", "0.25"]).status.success());
    assert!(run(&db, &["set", "--type", "bytes", "blob", "AAEC"]).status.success());

    let n = parse_json(&run(&db, &["get", "n"]).stdout);
    assert_eq!(n["type"], "int");
    assert_eq!(n["value"], -5);

    let ratio = parse_json(&run(&db, &["get", "--type", "double", "ratio"]).stdout);
    assert_eq!(ratio["value"], 0.25);

    let blob = parse_json(&run(&db, &["get", "blob"]).stdout);
    assert_eq!(blob["type"], "bytes");
    assert_eq!(blob["value"], "AAEC");
}

#[test]
fn keys_are_case_sensitive_and_listed_in_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("kv.db");

    for (key, value) in [("user.b", "2"), ("Key", "upper"), ("key", "lower"), ("user.a", "1")] {
        assert!(run(&db, &["set", key, value]).status.success());
    }

    let upper = parse_json(&run(&db, &["get", "Key"]).stdout);
    let lower = parse_json(&run(&db, &["get", "key"]).stdout);
    assert_eq!(upper["value"], "upper");
    assert_eq!(lower["value"], "lower");

    let keys = parse_json(&run(&db, &["keys", "--prefix", "user."]).stdout);
    assert_eq!(keys["keys"], serde_json::json!(["user.a", "user.b"]));

    let clear = run(&db, &["clear"]);
    assert_eq!(parse_json(&clear.stdout)["deleted"], 4);
    let keys = parse_json(&run(&db, &["keys"]).stdout);
    assert_eq!(keys["keys"], serde_json::json!([]));
}

#[test]
fn sql_and_pragma_commands() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("kv.db");
    assert!(run(&db, &["set", "--type", "int", "a", "1"]).status.success());

    let sql = run(
        &db,
        &["sql", "SELECT key, typeof(value) AS kind FROM KeyValueStore"],
    );
    assert!(sql.status.success());
    let sql_json = parse_json(&sql.stdout);
    assert_eq!(sql_json["rows"][0]["key"], "a");
    assert_eq!(sql_json["rows"][0]["kind"], "integer");

    let pragma = parse_json(&run(&db, &["pragma", "encoding"]).stdout);
    assert_eq!(pragma["values"][0], "UTF-16le");

    assert!(run(&db, &["vacuum"]).status.success());
}

#[test]
fn engine_errors_are_json_on_stderr() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("kv.db");

    let bad = run(&db, &["sql", "SELECT * FROM missing_table"]);
    assert_eq!(bad.status.code().unwrap(), 5);
    let err = parse_json(&bad.stderr);
    assert_eq!(err["error"]["kind"], "Engine");
    assert!(
        err["error"]["message"]
            .as_str()
            .unwrap()
            .contains("no such table")
    );
}

#[test]
fn type_mismatch_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("kv.db");
    assert!(run(&db, &["set", "name", "Ada"]).status.success());

    let get = run(&db, &["get", "--type", "int", "name"]);
    assert_eq!(get.status.code().unwrap(), 8);
    let err = parse_json(&get.stderr);
    assert_eq!(err["error"]["kind"], "TypeMismatch");
    assert_eq!(err["error"]["key"], "name");
}

#[test]
fn usage_exit_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db = temp.path().join("kv.db");

    let bad_int = run(&db, &["set", "--type", "int", "n", "four"]);
    assert_eq!(bad_int.status.code().unwrap(), 2);

    let semicolon = run(&db, &["pragma", "user_version; VACUUM"]);
    assert_eq!(semicolon.status.code().unwrap(), 2);

    let missing_arg = cmd().args(["get"]).output().expect("get");
    assert_eq!(missing_arg.status.code().unwrap(), 2);
}

#[test]
fn default_store_lives_under_home() {
    let temp = tempfile::tempdir().expect("tempdir");
    let set = cmd()
        .env("HOME", temp.path())
        .args(["set", "k", "v"])
        .output()
        .expect("set");
    assert!(set.status.success());
    assert!(temp.path().join(".sqlitekvs").join("store.db").is_file());
}
