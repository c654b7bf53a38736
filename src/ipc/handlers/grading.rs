use crate::calc::{self, ClassBand, GradeBand, GradeScale};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

const MARK_SCALE_KEY: &str = "grading.markScale";
const CLASSIFICATION_KEY: &str = "grading.classification";

/// Effective faculty mark scale: per-workspace override when a valid one is
/// stored, built-in default otherwise. Malformed historical values must not
/// block grading, so they fall back rather than error.
pub fn load_mark_scale(conn: &Connection) -> GradeScale {
    if let Ok(Some(raw)) = db::settings_get_json(conn, MARK_SCALE_KEY) {
        if let Ok(bands) = serde_json::from_value::<Vec<GradeBand>>(raw) {
            if let Ok(scale) = GradeScale::new(bands) {
                return scale;
            }
        }
    }
    calc::default_mark_scale()
}

pub fn load_classification(conn: &Connection) -> Vec<ClassBand> {
    if let Ok(Some(raw)) = db::settings_get_json(conn, CLASSIFICATION_KEY) {
        if let Ok(bands) = serde_json::from_value::<Vec<ClassBand>>(raw) {
            if !bands.is_empty() {
                return bands;
            }
        }
    }
    calc::default_classification()
}

fn handle_grading_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let scale = load_mark_scale(conn);
    let classification = load_classification(conn);
    let maxima: Vec<serde_json::Value> = calc::COMPONENT_MAXIMA
        .iter()
        .map(|(name, max)| json!({ "component": name, "max": max }))
        .collect();
    ok(
        &req.id,
        json!({
            "markScale": scale.bands(),
            "classification": classification,
            "componentMaxima": maxima
        }),
    )
}

fn handle_grading_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw) = req.params.get("markScale") else {
        return err(&req.id, "bad_params", "missing markScale", None);
    };
    let bands: Vec<GradeBand> = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let scale = match GradeScale::new(bands) {
        Ok(s) => s,
        Err(e) => return err(&req.id, &e.code, e.message, e.details),
    };
    if let Err(e) = db::settings_set_json(conn, MARK_SCALE_KEY, &json!(scale.bands())) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grading.get" => Some(handle_grading_get(state, req)),
        "grading.update" => Some(handle_grading_update(state, req)),
        _ => None,
    }
}
