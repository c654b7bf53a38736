use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_edusyncd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn edusyncd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
}

#[test]
fn department_create_search_update_flow() {
    let workspace = temp_dir("edusync-records-crud");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "records.create",
        json!({ "kind": "faculty", "attrs": { "name": "Engineering" } }),
    );

    // Faculty names flow into the department form's select options.
    let listing = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "records.list",
        json!({ "kind": "department" }),
    );
    let fields = listing.get("fields").and_then(|v| v.as_array()).expect("fields");
    let faculty_field = fields
        .iter()
        .find(|f| f.get("name").and_then(|n| n.as_str()) == Some("academicFaculty"))
        .expect("academicFaculty field");
    assert_eq!(
        faculty_field.get("kind").and_then(|k| k.as_str()),
        Some("select")
    );
    assert_eq!(
        faculty_field.get("options"),
        Some(&json!(["Engineering"]))
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "records.create",
        json!({
            "kind": "department",
            "attrs": { "name": "Computer Science", "academicFaculty": "Engineering" }
        }),
    );
    let dept_id = created
        .get("id")
        .and_then(|v| v.as_str())
        .expect("created id")
        .to_string();

    // Case-insensitive partial search matches; a miss returns nothing.
    let hit = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "records.list",
        json!({ "kind": "department", "search": "comput" }),
    );
    let items = hit.get("items").and_then(|v| v.as_array()).expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].get("name").and_then(|v| v.as_str()),
        Some("Computer Science")
    );

    let miss = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "records.list",
        json!({ "kind": "department", "search": "xyz" }),
    );
    assert_eq!(
        miss.get("items").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    // Update sends only the name; the faculty attribute must round-trip.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "records.update",
        json!({
            "kind": "department",
            "id": dept_id,
            "attrs": { "name": "Software Engineering" }
        }),
    );
    let after = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "records.list",
        json!({ "kind": "department", "search": "software" }),
    );
    let items = after.get("items").and_then(|v| v.as_array()).expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].get("academicFaculty").and_then(|v| v.as_str()),
        Some("Engineering")
    );
}

#[test]
fn records_reject_bad_input_at_the_boundary() {
    let workspace = temp_dir("edusync-records-validation");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let no_workspace = request(
        &mut stdin,
        &mut reader,
        "1",
        "records.list",
        json!({ "kind": "faculty" }),
    );
    assert_eq!(error_code(&no_workspace), "no_workspace");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let unknown_kind = request(
        &mut stdin,
        &mut reader,
        "3",
        "records.list",
        json!({ "kind": "timetable" }),
    );
    assert_eq!(error_code(&unknown_kind), "bad_params");

    let unknown_field = request(
        &mut stdin,
        &mut reader,
        "4",
        "records.create",
        json!({ "kind": "faculty", "attrs": { "dean": "Dr. Rahman" } }),
    );
    assert_eq!(error_code(&unknown_field), "unknown_field");

    let bad_option = request(
        &mut stdin,
        &mut reader,
        "5",
        "records.create",
        json!({ "kind": "semester", "attrs": { "name": "Winter", "year": "2025" } }),
    );
    assert_eq!(error_code(&bad_option), "bad_option");

    let missing = request(
        &mut stdin,
        &mut reader,
        "6",
        "records.update",
        json!({ "kind": "faculty", "id": "no-such-id", "attrs": { "name": "Science" } }),
    );
    assert_eq!(error_code(&missing), "not_found");
}
