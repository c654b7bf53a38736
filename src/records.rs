use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{EntitySchema, SchemaViolation};

/// Transient edit buffer for the open dialog. Keyed by field name; cleared
/// on a successful submit or an explicit cancel, retained on failure so the
/// user can correct and resubmit.
pub type FormDraft = BTreeMap<String, String>;

/// A record as held by the store. The manager keeps a non-authoritative
/// local copy of the current query result for rendering and filtering; the
/// store owns the truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(flatten)]
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreError {
    pub code: String,
    pub message: String,
}

impl StoreError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<SchemaViolation> for StoreError {
    fn from(v: SchemaViolation) -> Self {
        Self {
            code: v.code.to_string(),
            message: v.message,
        }
    }
}

/// Injected persistence contract. The manager never fetches or refreshes
/// the item list itself; that stays the caller's responsibility.
pub trait RecordStore {
    fn create(&mut self, kind: &str, draft: &FormDraft) -> Result<String, StoreError>;
    fn update(&mut self, kind: &str, id: &str, draft: &FormDraft) -> Result<(), StoreError>;
}

/// Dialog lifecycle. `Failed` keeps the draft in place for correction
/// instead of discarding it with the dialog.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogState {
    Idle,
    Editing,
    Submitting,
    Failed(StoreError),
}

/// Outcome of a successful submit: the created id, or `Updated` when an
/// edit target was set.
#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
    Created(String),
    Updated,
}

/// Table-plus-dialog record manager driven entirely by an entity schema.
/// One instance per screen; Department, Faculty and Semester management all
/// go through this with nothing but different field lists.
pub struct RecordPage {
    schema: EntitySchema,
    items: Vec<StoredRecord>,
    draft: FormDraft,
    edit_target: Option<String>,
    state: DialogState,
}

impl RecordPage {
    pub fn new(schema: EntitySchema, items: Vec<StoredRecord>) -> Self {
        Self {
            schema,
            items,
            draft: FormDraft::new(),
            edit_target: None,
            state: DialogState::Idle,
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn state(&self) -> &DialogState {
        &self.state
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    /// Replace the local item copy after the caller refetched.
    pub fn set_items(&mut self, items: Vec<StoredRecord>) {
        self.items = items;
    }

    /// Case-insensitive substring filter over every attribute value (id
    /// included). An empty term matches everything; a record missing some
    /// attribute simply cannot match on that attribute.
    pub fn search(&self, term: &str) -> Vec<&StoredRecord> {
        let needle = term.trim().to_lowercase();
        self.items
            .iter()
            .filter(|r| {
                if needle.is_empty() {
                    return true;
                }
                r.id.to_lowercase().contains(&needle)
                    || r.attrs.values().any(|v| v.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn open_create(&mut self) {
        self.draft.clear();
        self.edit_target = None;
        self.state = DialogState::Editing;
    }

    /// Copies every attribute into the draft, displayed or not, so an
    /// update round-trips fields the form does not show.
    pub fn open_edit(&mut self, record: &StoredRecord) {
        self.draft = record.attrs.clone();
        self.edit_target = Some(record.id.clone());
        self.state = DialogState::Editing;
    }

    pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), StoreError> {
        match self.state {
            DialogState::Editing | DialogState::Failed(_) => {
                self.draft.insert(name.to_string(), value.to_string());
                self.state = DialogState::Editing;
                Ok(())
            }
            _ => Err(StoreError::new("dialog_closed", "open the dialog first")),
        }
    }

    pub fn cancel(&mut self) {
        self.draft.clear();
        self.edit_target = None;
        self.state = DialogState::Idle;
    }

    /// Validates the draft against the schema, then delegates to the store:
    /// update when an edit target is set, create otherwise. Success closes
    /// the dialog and clears the draft; failure parks in `Failed` with the
    /// draft intact. A submit while one is in flight is rejected.
    pub fn submit(&mut self, store: &mut dyn RecordStore) -> Result<Submitted, StoreError> {
        match self.state {
            DialogState::Editing | DialogState::Failed(_) => {}
            DialogState::Submitting => {
                return Err(StoreError::new("in_flight", "a submit is already in progress"));
            }
            DialogState::Idle => {
                return Err(StoreError::new("dialog_closed", "open the dialog first"));
            }
        }

        if let Err(v) = self.schema.validate_draft(&self.draft) {
            let e = StoreError::from(v);
            self.state = DialogState::Failed(e.clone());
            return Err(e);
        }

        self.state = DialogState::Submitting;
        let outcome = match &self.edit_target {
            Some(id) => store
                .update(&self.schema.kind, id, &self.draft)
                .map(|()| Submitted::Updated),
            None => store
                .create(&self.schema.kind, &self.draft)
                .map(Submitted::Created),
        };

        match outcome {
            Ok(done) => {
                self.draft.clear();
                self.edit_target = None;
                self.state = DialogState::Idle;
                Ok(done)
            }
            Err(e) => {
                self.state = DialogState::Failed(e.clone());
                Err(e)
            }
        }
    }
}
