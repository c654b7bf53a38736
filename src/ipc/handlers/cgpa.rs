use crate::calc::{self, CumulativeRecord, SemesterSummary};
use crate::db::{self, MarkFilter};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::grading;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

/// Semester summaries for one student, in explicit chronological order
/// (sorted by the caller-supplied semester sequence key), plus the
/// cumulative roll-up. Recomputed from the mark collection on every call;
/// nothing here is stored.
pub fn student_summaries(
    conn: &Connection,
    student_id: &str,
) -> anyhow::Result<(Vec<SemesterSummary>, CumulativeRecord)> {
    let marks = db::list_course_marks(
        conn,
        &MarkFilter {
            student_id: Some(student_id),
            ..MarkFilter::default()
        },
    )?;

    let mut groups: Vec<(String, i64, Vec<calc::CourseMark>)> = Vec::new();
    for mark in marks {
        match groups.iter_mut().find(|(id, _, _)| *id == mark.semester_id) {
            Some((_, seq, bucket)) => {
                // A resave may move the semester's sequence key; the latest
                // write wins, matching the replace-by-key mark lifecycle.
                *seq = mark.semester_seq;
                bucket.push(mark);
            }
            None => groups.push((mark.semester_id.clone(), mark.semester_seq, vec![mark])),
        }
    }
    groups.sort_by_key(|(_, seq, _)| *seq);

    let summaries: Vec<SemesterSummary> = groups
        .iter()
        .map(|(id, seq, bucket)| calc::aggregate_semester(id, *seq, bucket))
        .collect();
    let cumulative = calc::aggregate_cumulative(&summaries, &grading::load_classification(conn));
    Ok((summaries, cumulative))
}

fn handle_cgpa_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };

    let (summaries, cumulative) = match student_summaries(conn, student_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let student_name = summaries
        .first()
        .and_then(|s| s.courses.first())
        .map(|m| m.student_name.clone());

    ok(
        &req.id,
        json!({
            "studentId": student_id,
            "studentName": student_name,
            "semesters": summaries,
            "cumulative": cumulative
        }),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalculatorCourse {
    course_name: String,
    credit_hours: i64,
    letter_grade: String,
}

/// Manual self-service calculator: letters map through the calculator's
/// own grade table, never the faculty mark scale.
fn handle_cgpa_calculator(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw) = req.params.get("courses") else {
        return err(&req.id, "bad_params", "missing courses[]", None);
    };
    let courses: Vec<CalculatorCourse> = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    let mut rows: Vec<serde_json::Value> = Vec::with_capacity(courses.len());
    let mut total_credit_hours: i64 = 0;
    let mut total_quality_points: f64 = 0.0;
    for (i, c) in courses.iter().enumerate() {
        if c.credit_hours <= 0 {
            return err(
                &req.id,
                "bad_params",
                format!("courses[{}].creditHours must be positive", i),
                None,
            );
        }
        let Some(grade_point) = calc::calculator_grade_point(&c.letter_grade) else {
            return err(
                &req.id,
                "bad_params",
                format!("unknown letter grade: {}", c.letter_grade),
                Some(json!({ "index": i })),
            );
        };
        total_credit_hours += c.credit_hours;
        total_quality_points += grade_point * c.credit_hours as f64;
        rows.push(json!({
            "courseName": c.course_name,
            "creditHours": c.credit_hours,
            "letterGrade": c.letter_grade,
            "gradePoint": grade_point
        }));
    }

    let cgpa = if total_credit_hours > 0 {
        total_quality_points / total_credit_hours as f64
    } else {
        0.0
    };
    let classification =
        calc::classification_for(&grading::load_classification(conn), cgpa);

    ok(
        &req.id,
        json!({
            "courses": rows,
            "totalCreditHours": total_credit_hours,
            "totalQualityPoints": total_quality_points,
            "cgpa": cgpa,
            "classification": classification
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cgpa.student" => Some(handle_cgpa_student(state, req)),
        "cgpa.calculator" => Some(handle_cgpa_calculator(state, req)),
        _ => None,
    }
}
