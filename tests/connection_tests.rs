//! End-to-end tests running the public API against real SQLite databases.

use indexmap::IndexMap;
use std::sync::{Arc, Mutex};
use sweetsql::{
    sql, ConnectOptions, Connection, Event, EventArgs, EventResult, EventSink, Params, Query, SweetError, Value,
};
use tempfile::NamedTempFile;

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn open_test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute("CREATE TABLE test (id TEXT)", ()).unwrap();
    conn
}

#[test]
fn test_insert_then_read_back() {
    let conn = open_test_db();

    let mut fields = IndexMap::new();
    fields.insert("id".to_string(), text("abc"));
    assert_eq!(conn.execute(sql::insert("test", fields), ()).unwrap(), 1);

    let value = conn.get_one_value("SELECT id FROM test WHERE id=?", vec![text("abc")]).unwrap();
    assert_eq!(value, Some(text("abc")));

    let row = conn
        .get_one_row("SELECT id FROM test WHERE id=?", vec![text("abc")])
        .unwrap()
        .expect("row should exist");
    assert_eq!(row.get("id").unwrap(), &text("abc"));
    match row.get("nonexistent") {
        Err(SweetError::FieldAccess(name)) => assert_eq!(name, "nonexistent"),
        other => panic!("Expected FieldAccess error, got {:?}", other),
    }
}

#[test]
fn test_update_and_replace_helpers() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", ()).unwrap();

    let mut fields = IndexMap::new();
    fields.insert("id".to_string(), Value::Integer(1));
    fields.insert("name".to_string(), text("Ann"));
    conn.execute(sql::insert("users", fields.clone()), ()).unwrap();

    fields.insert("name".to_string(), text("Anna"));
    conn.execute(sql::replace("users", fields), ()).unwrap();
    assert_eq!(
        conn.get_one_value("SELECT name FROM users WHERE id = 1", ()).unwrap(),
        Some(text("Anna"))
    );

    let mut changes = IndexMap::new();
    changes.insert("name".to_string(), text("Bea"));
    let affected = conn.execute(sql::update("users", changes, Some("id = 1")), ()).unwrap();
    assert_eq!(affected, 1);
    assert_eq!(conn.get_one_value("SELECT COUNT(*) FROM users", ()).unwrap(), Some(Value::Integer(1)));
}

#[test]
fn test_recordset_lifecycle() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute("CREATE TABLE nums (n INTEGER)", ()).unwrap();
    for n in 1..=4i64 {
        conn.execute("INSERT INTO nums VALUES (?)", n).unwrap();
    }

    let mut rs = conn.select("SELECT n FROM nums WHERE n > ? ORDER BY n", 1i64).unwrap();
    assert_eq!(rs.row_count(), 0);
    let after_creation = rs.current().cloned();

    let mut seen = Vec::new();
    while rs.advance().unwrap().is_some() {
        seen.push(rs.current().unwrap().try_get::<i64>("n").unwrap());
        assert!(rs.is_valid());
    }
    assert_eq!(seen, vec![2, 3, 4]);
    assert_eq!(rs.row_count(), 3);
    assert!(!rs.is_valid());

    rs.restart().unwrap();
    assert_eq!(rs.position(), 0);
    assert_eq!(rs.current().cloned(), after_creation);

    let collected: Vec<i64> = rs.map(|row| row.unwrap().try_get("n").unwrap()).collect();
    assert_eq!(collected, vec![2, 3, 4]);
}

#[test]
fn test_usage_errors() {
    let conn = open_test_db();

    let packed = Query::from(("SELECT id FROM test WHERE id = ?", "abc"));
    assert!(matches!(conn.select(packed.clone(), "other"), Err(SweetError::Usage(_))));
    assert!(matches!(conn.get_one_row(packed.clone(), "other"), Err(SweetError::Usage(_))));
    assert!(conn.get_one_row(packed, Params::none()).unwrap().is_none());

    let short = Query::from_parts(vec![text("SELECT 1")]);
    assert!(matches!(short, Err(SweetError::Usage(_))));
}

#[test]
fn test_packed_parts_bind_only_the_second_element() {
    let conn = Connection::open_in_memory().unwrap();
    let query = Query::from_parts(vec![text("SELECT ?"), Value::Integer(7), Value::Integer(99)]).unwrap();
    assert_eq!(conn.get_one_value(query, ()).unwrap(), Some(Value::Integer(7)));
}

#[test]
fn test_file_database_persists_between_connections() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    {
        let mut conn = Connection::open(&format!("sqlite:{}", path), "", "", ConnectOptions::default(), None).unwrap();
        conn.execute("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)", ()).unwrap();
        conn.execute("INSERT INTO kv VALUES (:k, :v)", {
            let mut named = IndexMap::new();
            named.insert("k".to_string(), text("a"));
            named.insert("v".to_string(), text("1"));
            Params::Named(named)
        })
        .unwrap();
        conn.close().unwrap();
    }

    let mut options = ConnectOptions::default();
    options.read_only = true;
    let conn = Connection::open(&path, "", "", options, None).unwrap();
    assert_eq!(conn.get_one_value("SELECT v FROM kv WHERE k = ?", "a").unwrap(), Some(text("1")));
    assert!(matches!(conn.execute("DELETE FROM kv", ()), Err(SweetError::Database(_))));
}

#[test]
fn test_event_sink_sees_connect_arguments() {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&captured);
    let sink: Arc<dyn EventSink> = Arc::new(move |event: &mut Event<'_>| {
        if let EventArgs::Connect {
            connection_string,
            username,
            ..
        } = &event.args
        {
            let handle = match event.result {
                Some(EventResult::Connected(handle)) => format!("autocommit={}", handle.is_autocommit()),
                _ => "no handle".to_string(),
            };
            recorder
                .lock()
                .unwrap()
                .push(format!("{} {} {} {}", event.name(), connection_string, username, handle));
        }
    });

    let _conn = Connection::open("sqlite::memory:", "alice", "pw", ConnectOptions::default(), Some(sink)).unwrap();
    assert_eq!(
        *captured.lock().unwrap(),
        vec![
            "sweetsql.connect.started sqlite::memory: alice no handle",
            "sweetsql.connect.finished sqlite::memory: alice autocommit=true",
        ]
    );
}

#[test]
fn test_unsupported_driver_is_connection_error() {
    let result = Connection::open("mysql:dbname=testdb;host=127.0.0.1", "root", "", ConnectOptions::default(), None);
    match result {
        Err(SweetError::Connection(msg)) => assert!(msg.contains("mysql")),
        other => panic!("Expected Connection error, got {:?}", other),
    }
}

#[test]
fn test_select_reports_late_row_failure_on_advance() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute("CREATE TABLE docs (id INTEGER PRIMARY KEY, body TEXT)", ()).unwrap();
    for body in ["[1]", "[2]", "not json"] {
        conn.execute("INSERT INTO docs (body) VALUES (?)", body).unwrap();
    }

    let mut rs = conn.select("SELECT id, json(body) AS body FROM docs ORDER BY id", ()).unwrap();
    let first = rs.next().unwrap().unwrap();
    let second = rs.next().unwrap().unwrap();
    assert_eq!(first.get("body").unwrap(), &text("[1]"));
    assert_eq!(second.get("body").unwrap(), &text("[2]"));

    match rs.next() {
        Some(Err(SweetError::Database(db))) => assert!(db.driver_message().contains("malformed JSON")),
        other => panic!("Expected Database error, got {:?}", other),
    }
    assert!(rs.next().is_none());
}
