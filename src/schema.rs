use serde::{Deserialize, Serialize};

/// Closed set of form-field kinds. Parsing a descriptor with any other
/// `kind` tag fails at construction time; there is no untyped fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Select { options: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Text,
        }
    }

    pub fn select(name: &str, options: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Select { options },
        }
    }
}

/// Field metadata for one managed entity kind. Fixed for the lifetime of a
/// page instance; the record manager renders columns and the dialog form
/// from this list alone.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    pub kind: String,
    pub title: String,
    pub subtitle: String,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone)]
pub struct SchemaViolation {
    pub code: &'static str,
    pub message: String,
}

impl EntitySchema {
    pub fn new(
        kind: &str,
        title: &str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self, SchemaViolation> {
        if fields.is_empty() {
            return Err(SchemaViolation {
                code: "bad_schema",
                message: format!("{}: field list must not be empty", kind),
            });
        }
        for (i, f) in fields.iter().enumerate() {
            if f.name.trim().is_empty() {
                return Err(SchemaViolation {
                    code: "bad_schema",
                    message: format!("{}: field names must not be empty", kind),
                });
            }
            if fields[..i].iter().any(|prev| prev.name == f.name) {
                return Err(SchemaViolation {
                    code: "bad_schema",
                    message: format!("{}: duplicate field name {}", kind, f.name),
                });
            }
            if let FieldKind::Select { options } = &f.kind {
                if options.is_empty() {
                    return Err(SchemaViolation {
                        code: "bad_schema",
                        message: format!("{}: select field {} needs options", kind, f.name),
                    });
                }
            }
        }
        Ok(Self {
            kind: kind.to_string(),
            title: title.to_string(),
            subtitle: format!("Interactive real-time {} management", title),
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Boundary validation for an incoming draft: attribute names must be a
    /// subset of the declared fields, and select values must be one of the
    /// declared options or empty (the implicit placeholder choice).
    pub fn validate_draft<'a, I>(&self, draft: I) -> Result<(), SchemaViolation>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (name, value) in draft {
            let Some(field) = self.field(name) else {
                return Err(SchemaViolation {
                    code: "unknown_field",
                    message: format!("{} has no field named {}", self.kind, name),
                });
            };
            if let FieldKind::Select { options } = &field.kind {
                if !value.is_empty() && !options.iter().any(|o| o == value) {
                    return Err(SchemaViolation {
                        code: "bad_option",
                        message: format!("{} is not an option for {}", value, name),
                    });
                }
            }
        }
        Ok(())
    }
}

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Registry of managed entity kinds. Department's faculty choices follow the
/// current faculty records, so the caller supplies them per request, the way
/// the admin screens feed one resource's names into another's form.
pub fn schema_for(kind: &str, faculty_names: &[String]) -> Result<Option<EntitySchema>, SchemaViolation> {
    let schema = match kind {
        "faculty" => EntitySchema::new(
            "faculty",
            "Academic Faculty",
            vec![FieldDescriptor::text("name")],
        )?,
        "department" => {
            let faculty_field = if faculty_names.is_empty() {
                FieldDescriptor::text("academicFaculty")
            } else {
                FieldDescriptor::select("academicFaculty", faculty_names.to_vec())
            };
            EntitySchema::new(
                "department",
                "Academic Department",
                vec![FieldDescriptor::text("name"), faculty_field],
            )?
        }
        "semester" => EntitySchema::new(
            "semester",
            "Academic Semester",
            vec![
                FieldDescriptor::select("name", strings(&["Autumn", "Summer", "Fall"])),
                FieldDescriptor::text("year"),
                FieldDescriptor::select("code", strings(&["01", "02", "03"])),
                FieldDescriptor::select("startMonth", strings(&MONTHS)),
                FieldDescriptor::select("endMonth", strings(&MONTHS)),
            ],
        )?,
        "course" => EntitySchema::new(
            "course",
            "Course",
            vec![
                FieldDescriptor::text("code"),
                FieldDescriptor::text("name"),
                FieldDescriptor::text("credits"),
                FieldDescriptor::text("semester"),
            ],
        )?,
        "student" => EntitySchema::new(
            "student",
            "Student",
            vec![
                FieldDescriptor::text("studentId"),
                FieldDescriptor::text("name"),
            ],
        )?,
        _ => return Ok(None),
    };
    Ok(Some(schema))
}

pub fn known_kinds() -> [&'static str; 5] {
    ["faculty", "department", "semester", "course", "student"]
}
