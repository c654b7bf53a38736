use crate::calc::{self, ComponentScores, CourseMark};
use crate::db::{self, MarkFilter};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::grading;
use crate::ipc::types::{AppState, Request};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveMarksParams {
    student_id: String,
    student_name: String,
    course_code: String,
    course_name: String,
    semester_id: String,
    semester_seq: i64,
    credits: i64,
    #[serde(flatten)]
    components: ComponentScores,
}

/// Full replace-by-key save: validate first, write nothing on violation,
/// then grade and upsert so a resave for the same (student, course,
/// semester) supersedes the prior entry.
fn handle_marks_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let params: SaveMarksParams = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if params.credits <= 0 {
        return err(
            &req.id,
            "bad_params",
            "credits must be a positive integer",
            Some(json!({ "credits": params.credits })),
        );
    }
    for (key, value) in [
        ("studentId", &params.student_id),
        ("courseCode", &params.course_code),
        ("semesterId", &params.semester_id),
    ] {
        if value.trim().is_empty() {
            return err(&req.id, "bad_params", format!("missing {}", key), None);
        }
    }

    if let Err(e) = calc::validate_components(&params.components) {
        return err(&req.id, &e.code, e.message, e.details);
    }

    let total_marks = calc::compute_total(&params.components);
    let scale = grading::load_mark_scale(conn);
    let band = calc::grade_from_total(&scale, total_marks);

    let mark = CourseMark {
        student_id: params.student_id,
        student_name: params.student_name,
        course_code: params.course_code,
        course_name: params.course_name,
        semester_id: params.semester_id,
        semester_seq: params.semester_seq,
        credits: params.credits,
        components: params.components,
        total_marks,
        grade_point: band.grade_point,
        letter_grade: band.letter.clone(),
    };

    if let Err(e) = db::upsert_course_mark(conn, &mark) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "bestClassTest": calc::best_of_two_class_tests(
                mark.components.class_test_1,
                mark.components.class_test_2
            ),
            "totalMarks": mark.total_marks,
            "gradePoint": mark.grade_point,
            "letterGrade": mark.letter_grade
        }),
    )
}

fn handle_marks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = req.params.get("studentId").and_then(|v| v.as_str());
    let semester_id = req.params.get("semesterId").and_then(|v| v.as_str());
    let course_code = req.params.get("courseCode").and_then(|v| v.as_str());
    let filter = MarkFilter {
        student_id,
        semester_id,
        course_code,
    };

    match db::list_course_marks(conn, &filter) {
        Ok(marks) => ok(&req.id, json!({ "marks": marks })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.save" => Some(handle_marks_save(state, req)),
        "marks.list" => Some(handle_marks_list(state, req)),
        _ => None,
    }
}
