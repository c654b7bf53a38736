use crate::db::{self, SqliteRecords};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::records::{RecordPage, StoredRecord, Submitted};
use crate::schema::{self, EntitySchema};
use rusqlite::Connection;
use serde_json::json;

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Select options for a department's faculty come from the live faculty
/// records, mirroring how the admin screens feed one resource into the
/// next form.
fn faculty_names(conn: &Connection, req: &Request) -> Result<Vec<String>, serde_json::Value> {
    let faculties = db::records_list(conn, "faculty")
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    Ok(faculties
        .iter()
        .filter_map(|r| r.attrs.get("name"))
        .filter(|n| !n.trim().is_empty())
        .cloned()
        .collect())
}

fn load_schema(
    conn: &Connection,
    req: &Request,
    kind: &str,
) -> Result<EntitySchema, serde_json::Value> {
    let names = faculty_names(conn, req)?;
    match schema::schema_for(kind, &names) {
        Ok(Some(s)) => Ok(s),
        Ok(None) => Err(err(
            &req.id,
            "bad_params",
            format!("unknown record kind: {}", kind),
            Some(json!({ "knownKinds": schema::known_kinds() })),
        )),
        Err(v) => Err(err(&req.id, v.code, v.message, None)),
    }
}

fn parse_attrs(req: &Request) -> Result<Vec<(String, String)>, serde_json::Value> {
    let Some(obj) = req.params.get("attrs").and_then(|v| v.as_object()) else {
        return Err(err(&req.id, "bad_params", "attrs must be an object", None));
    };
    let mut out = Vec::with_capacity(obj.len());
    for (k, v) in obj {
        let Some(s) = v.as_str() else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("attrs.{} must be a string", k),
                None,
            ));
        };
        out.push((k.clone(), s.to_string()));
    }
    Ok(out)
}

fn handle_records_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let kind = match required_str(req, "kind") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let schema = match load_schema(conn, req, &kind) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let items = match db::records_list(conn, &kind) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let search = req
        .params
        .get("search")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let page = RecordPage::new(schema, items);
    let filtered: Vec<&StoredRecord> = page.search(search);

    ok(
        &req.id,
        json!({
            "kind": kind,
            "title": page.schema().title,
            "subtitle": page.schema().subtitle,
            "fields": page.schema().fields,
            "items": filtered,
        }),
    )
}

fn handle_records_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let kind = match required_str(req, "kind") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let schema = match load_schema(conn, req, &kind) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let attrs = match parse_attrs(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut page = RecordPage::new(schema, Vec::new());
    page.open_create();
    for (name, value) in &attrs {
        if let Err(e) = page.set_field(name, value) {
            return err(&req.id, &e.code, e.message, None);
        }
    }

    let mut store = SqliteRecords { conn };
    match page.submit(&mut store) {
        Ok(Submitted::Created(id)) => ok(&req.id, json!({ "id": id })),
        Ok(Submitted::Updated) => err(&req.id, "internal", "create produced an update", None),
        Err(e) => err(&req.id, &e.code, e.message, None),
    }
}

fn handle_records_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let kind = match required_str(req, "kind") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let schema = match load_schema(conn, req, &kind) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let attrs = match parse_attrs(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let existing = match db::records_get(conn, &kind, &id) {
        Ok(Some(r)) => r,
        Ok(None) => return err(&req.id, "not_found", "record not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Open-edit copies the full stored attribute set first, so fields the
    // caller did not send survive the update payload.
    let mut page = RecordPage::new(schema, Vec::new());
    page.open_edit(&existing);
    for (name, value) in &attrs {
        if let Err(e) = page.set_field(name, value) {
            return err(&req.id, &e.code, e.message, None);
        }
    }

    let mut store = SqliteRecords { conn };
    match page.submit(&mut store) {
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, &e.code, e.message, None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.list" => Some(handle_records_list(state, req)),
        "records.create" => Some(handle_records_create(state, req)),
        "records.update" => Some(handle_records_update(state, req)),
        _ => None,
    }
}
