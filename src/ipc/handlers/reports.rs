use crate::ipc::error::{err, ok};
use crate::ipc::handlers::cgpa;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const REPORT_COLUMNS: [&str; 6] = [
    "Course Code",
    "Course Name",
    "Credits",
    "Total Marks",
    "Grade",
    "GPA",
];

/// Data model for the CGPA report: a fixed header plus one table per
/// semester. A downstream renderer handles layout and pagination; the
/// field names and row shape here are the binding contract.
fn handle_reports_cgpa(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };

    let (summaries, cumulative) = match cgpa::student_summaries(conn, student_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let student_name = summaries
        .first()
        .and_then(|s| s.courses.first())
        .map(|m| m.student_name.clone())
        .unwrap_or_default();

    let semesters: Vec<serde_json::Value> = summaries
        .iter()
        .map(|s| {
            let rows: Vec<serde_json::Value> = s
                .courses
                .iter()
                .map(|m| {
                    json!([
                        m.course_code,
                        m.course_name,
                        m.credits.to_string(),
                        m.total_marks.to_string(),
                        m.letter_grade,
                        format!("{:.2}", m.grade_point)
                    ])
                })
                .collect();
            json!({
                "semesterId": s.semester_id,
                "gpa": s.gpa,
                "totalCredits": s.total_credits,
                "rows": rows
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "header": {
                "title": "CGPA Report",
                "studentId": student_id,
                "studentName": student_name,
                "cgpa": cumulative.cgpa,
                "classification": cumulative.classification,
                "totalCredits": cumulative.cumulative_credits,
                "generatedAt": chrono::Utc::now().to_rfc3339()
            },
            "columns": REPORT_COLUMNS,
            "semesters": semesters
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.cgpa" => Some(handle_reports_cgpa(state, req)),
        _ => None,
    }
}
