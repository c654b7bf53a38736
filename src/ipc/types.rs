use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One newline-delimited request. `params` defaults to JSON null so
/// parameterless methods can omit it entirely.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Mutable daemon state. Both fields stay `None` until a workspace is
/// selected; handlers that need the database guard on `db` themselves.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
