use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: &str, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: Some(details),
        }
    }
}

/// One threshold row of a grade scale: a total at or above `min_total`
/// earns `letter` worth `grade_point`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub min_total: f64,
    pub grade_point: f64,
    pub letter: String,
}

/// Ordered threshold table, evaluated highest-first. The lowest band is the
/// catch-all: any finite total that clears no floor lands there, so lookup
/// is total for every input including negatives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeScale(Vec<GradeBand>);

impl GradeScale {
    pub fn new(bands: Vec<GradeBand>) -> Result<Self, CalcError> {
        if bands.is_empty() {
            return Err(CalcError::new("bad_scale", "grade scale must not be empty"));
        }
        for pair in bands.windows(2) {
            if pair[1].min_total >= pair[0].min_total {
                return Err(CalcError::with_details(
                    "bad_scale",
                    "grade scale thresholds must be strictly descending",
                    serde_json::json!({
                        "upper": pair[0].min_total,
                        "lower": pair[1].min_total
                    }),
                ));
            }
        }
        for b in &bands {
            if !b.min_total.is_finite() {
                return Err(CalcError::new("bad_scale", "thresholds must be finite"));
            }
            if !(0.0..=4.0).contains(&b.grade_point) {
                return Err(CalcError::with_details(
                    "bad_scale",
                    "grade points must be within 0.0..=4.0",
                    serde_json::json!({ "letter": b.letter, "gradePoint": b.grade_point }),
                ));
            }
            if b.letter.trim().is_empty() {
                return Err(CalcError::new("bad_scale", "letters must not be empty"));
            }
        }
        Ok(Self(bands))
    }

    pub fn bands(&self) -> &[GradeBand] {
        &self.0
    }
}

/// Highest-first threshold walk. Falls through to the lowest band, which
/// accepts everything the floors above it rejected.
pub fn grade_from_total(scale: &GradeScale, total: f64) -> &GradeBand {
    let bands = scale.bands();
    for b in bands {
        if total >= b.min_total {
            return b;
        }
    }
    &bands[bands.len() - 1]
}

/// Composite-mark scale used by the faculty entry panel.
pub fn default_mark_scale() -> GradeScale {
    let band = |min_total: f64, grade_point: f64, letter: &str| GradeBand {
        min_total,
        grade_point,
        letter: letter.to_string(),
    };
    GradeScale(vec![
        band(80.0, 4.0, "A+"),
        band(75.0, 3.75, "A"),
        band(70.0, 3.5, "A-"),
        band(65.0, 3.25, "B+"),
        band(60.0, 3.0, "B"),
        band(55.0, 2.75, "B-"),
        band(50.0, 2.5, "C+"),
        band(45.0, 2.25, "C"),
        band(40.0, 2.0, "D"),
        band(0.0, 0.0, "F"),
    ])
}

/// CGPA classification row; same threshold-table shape and evaluation rule
/// as the mark scale, but over grade points rather than raw totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassBand {
    pub min_cgpa: f64,
    pub label: String,
}

pub fn default_classification() -> Vec<ClassBand> {
    let band = |min_cgpa: f64, label: &str| ClassBand {
        min_cgpa,
        label: label.to_string(),
    };
    vec![
        band(3.75, "First Class"),
        band(3.5, "Second Class (Upper)"),
        band(3.0, "Second Class (Lower)"),
        band(2.5, "Third Class"),
        band(0.0, "Pass/Fail"),
    ]
}

pub fn classification_for(table: &[ClassBand], cgpa: f64) -> String {
    for b in table {
        if cgpa >= b.min_cgpa {
            return b.label.clone();
        }
    }
    table
        .last()
        .map(|b| b.label.clone())
        .unwrap_or_else(|| "Pass/Fail".to_string())
}

/// Letter-to-point map for the manual self-service calculator. Separate from
/// the faculty mark scale; the two carry different values and must not be
/// conflated.
pub const CALCULATOR_GRADE_POINTS: [(&str, f64); 12] = [
    ("A+", 4.0),
    ("A", 3.75),
    ("A-", 3.5),
    ("B+", 3.25),
    ("B", 3.0),
    ("B-", 2.75),
    ("C+", 2.5),
    ("C", 2.25),
    ("C-", 2.0),
    ("D+", 1.75),
    ("D", 1.5),
    ("F", 0.0),
];

pub fn calculator_grade_point(letter: &str) -> Option<f64> {
    CALCULATOR_GRADE_POINTS
        .iter()
        .find(|(l, _)| *l == letter)
        .map(|(_, p)| *p)
}

/// Raw component scores for one course entry. Each has a fixed maximum;
/// enforcement happens in `validate_components`, never by clamping here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentScores {
    pub class_test_1: f64,
    pub class_test_2: f64,
    pub attendance: f64,
    pub assessment: f64,
    pub final_exam: f64,
}

pub const COMPONENT_MAXIMA: [(&str, f64); 5] = [
    ("classTest1", 20.0),
    ("classTest2", 20.0),
    ("attendance", 5.0),
    ("assessment", 5.0),
    ("finalExam", 70.0),
];

/// Precondition for `compute_total`: every component within 0..=max.
/// Violations abort the save; nothing is written and nothing is clamped.
pub fn validate_components(c: &ComponentScores) -> Result<(), CalcError> {
    let values = [
        c.class_test_1,
        c.class_test_2,
        c.attendance,
        c.assessment,
        c.final_exam,
    ];
    let mut violations: Vec<serde_json::Value> = Vec::new();
    for ((name, max), value) in COMPONENT_MAXIMA.iter().zip(values) {
        if !value.is_finite() || value < 0.0 || value > *max {
            violations.push(serde_json::json!({
                "component": name,
                "value": value,
                "max": max
            }));
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(CalcError::with_details(
            "validation_failed",
            "component scores exceed declared maxima",
            serde_json::json!({ "violations": violations }),
        ))
    }
}

/// The better of two class-test attempts counts; the other is dropped.
pub fn best_of_two_class_tests(t1: f64, t2: f64) -> f64 {
    t1.max(t2)
}

pub fn compute_total(c: &ComponentScores) -> f64 {
    best_of_two_class_tests(c.class_test_1, c.class_test_2)
        + c.attendance
        + c.assessment
        + c.final_exam
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMark {
    pub student_id: String,
    pub student_name: String,
    pub course_code: String,
    pub course_name: String,
    pub semester_id: String,
    /// Sortable chronological key supplied by the caller; cumulative
    /// aggregation orders semesters by this, never by name.
    pub semester_seq: i64,
    pub credits: i64,
    #[serde(flatten)]
    pub components: ComponentScores,
    pub total_marks: f64,
    pub grade_point: f64,
    pub letter_grade: String,
}

/// Derived view over one semester's marks; recomputed on every read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterSummary {
    pub semester_id: String,
    pub semester_seq: i64,
    pub courses: Vec<CourseMark>,
    pub total_credits: i64,
    pub total_quality_points: f64,
    pub gpa: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeRecord {
    pub cumulative_credits: i64,
    pub cumulative_quality_points: f64,
    pub cgpa: f64,
    pub classification: String,
}

/// Credit-weighted semester roll-up. Course order follows input order; a
/// semester with zero credits yields gpa 0.0 rather than an error.
pub fn aggregate_semester(
    semester_id: &str,
    semester_seq: i64,
    marks: &[CourseMark],
) -> SemesterSummary {
    let total_credits: i64 = marks.iter().map(|m| m.credits).sum();
    let total_quality_points: f64 = marks
        .iter()
        .map(|m| m.grade_point * m.credits as f64)
        .sum();
    let gpa = if total_credits > 0 {
        total_quality_points / total_credits as f64
    } else {
        0.0
    };
    SemesterSummary {
        semester_id: semester_id.to_string(),
        semester_seq,
        courses: marks.to_vec(),
        total_credits,
        total_quality_points,
        gpa,
    }
}

/// Prefix sums over the summaries in the given order. Callers must pass
/// semesters in chronological order (sorted by `semester_seq`).
pub fn aggregate_cumulative(
    summaries: &[SemesterSummary],
    classification: &[ClassBand],
) -> CumulativeRecord {
    let cumulative_credits: i64 = summaries.iter().map(|s| s.total_credits).sum();
    let cumulative_quality_points: f64 = summaries.iter().map(|s| s.total_quality_points).sum();
    let cgpa = if cumulative_credits > 0 {
        cumulative_quality_points / cumulative_credits as f64
    } else {
        0.0
    };
    CumulativeRecord {
        cumulative_credits,
        cumulative_quality_points,
        cgpa,
        classification: classification_for(classification, cgpa),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(course: &str, credits: i64, grade_point: f64) -> CourseMark {
        CourseMark {
            student_id: "2025010001".to_string(),
            student_name: "Test Student".to_string(),
            course_code: course.to_string(),
            course_name: course.to_string(),
            semester_id: "Autumn 2025".to_string(),
            semester_seq: 1,
            credits,
            components: ComponentScores::default(),
            total_marks: 0.0,
            grade_point,
            letter_grade: "B".to_string(),
        }
    }

    #[test]
    fn mark_scale_matches_faculty_panel() {
        let scale = default_mark_scale();
        let expect = [(62.0, "B", 3.0), (80.0, "A+", 4.0), (38.0, "F", 0.0)];
        for (total, letter, point) in expect {
            let band = grade_from_total(&scale, total);
            assert_eq!(band.letter, letter, "total {}", total);
            assert_eq!(band.grade_point, point, "total {}", total);
        }
    }

    #[test]
    fn grade_lookup_is_exhaustive() {
        let scale = default_mark_scale();
        for total in [-50.0, -0.1, 0.0, 39.999, 100.0, 250.0, f64::MAX] {
            let band = grade_from_total(&scale, total);
            assert!(!band.letter.is_empty());
        }
        assert_eq!(grade_from_total(&scale, -10.0).letter, "F");
        assert_eq!(grade_from_total(&scale, 1_000.0).letter, "A+");
    }

    #[test]
    fn grade_points_are_monotonic_in_total() {
        let scale = default_mark_scale();
        let mut prev = grade_from_total(&scale, -5.0).grade_point;
        let mut t = -5.0;
        while t <= 105.0 {
            let gp = grade_from_total(&scale, t).grade_point;
            assert!(gp >= prev, "grade point dropped at total {}", t);
            prev = gp;
            t += 0.25;
        }
    }

    #[test]
    fn best_of_two_is_symmetric() {
        assert_eq!(best_of_two_class_tests(15.0, 18.0), 18.0);
        assert_eq!(best_of_two_class_tests(18.0, 15.0), 18.0);
        assert_eq!(best_of_two_class_tests(12.0, 12.0), 12.0);
    }

    #[test]
    fn total_uses_best_class_test() {
        let c = ComponentScores {
            class_test_1: 15.0,
            class_test_2: 18.0,
            attendance: 5.0,
            assessment: 4.0,
            final_exam: 50.0,
        };
        assert!(validate_components(&c).is_ok());
        assert_eq!(compute_total(&c), 77.0);
        let scale = default_mark_scale();
        let band = grade_from_total(&scale, compute_total(&c));
        assert!(band.grade_point >= 3.75, "77 should grade A or better");
    }

    #[test]
    fn validation_rejects_out_of_range_components() {
        let c = ComponentScores {
            class_test_1: 21.0,
            class_test_2: 10.0,
            attendance: 6.0,
            assessment: 5.0,
            final_exam: -1.0,
        };
        let e = validate_components(&c).expect_err("over-maximum must fail");
        assert_eq!(e.code, "validation_failed");
        let violations = e
            .details
            .as_ref()
            .and_then(|d| d.get("violations"))
            .and_then(|v| v.as_array())
            .expect("violations array");
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn semester_gpa_is_credit_weighted() {
        let marks = vec![mark("CSE101", 3, 4.0), mark("CSE302", 2, 3.0)];
        let s = aggregate_semester("Autumn 2025", 1, &marks);
        assert_eq!(s.total_credits, 5);
        assert_eq!(s.total_quality_points, 18.0);
        assert!((s.gpa - 3.6).abs() < 1e-12);
        // Single-course identity: the gpa is exactly the course's grade point.
        let single = aggregate_semester("Autumn 2025", 1, &[mark("CSE101", 3, 3.25)]);
        assert_eq!(single.gpa, 3.25);
    }

    #[test]
    fn empty_semester_yields_zero_gpa() {
        let s = aggregate_semester("Summer 2025", 2, &[]);
        assert_eq!(s.total_credits, 0);
        assert_eq!(s.gpa, 0.0);
    }

    #[test]
    fn cumulative_sums_prefix_totals() {
        let s1 = aggregate_semester(
            "Autumn 2025",
            1,
            &[mark("CSE101", 3, 4.0), mark("CSE302", 2, 3.0)],
        );
        let s2 = aggregate_semester("Summer 2025", 2, &[mark("CSE201", 4, 3.0)]);
        let table = default_classification();
        let cum = aggregate_cumulative(&[s1, s2], &table);
        assert_eq!(cum.cumulative_credits, 9);
        assert_eq!(cum.cumulative_quality_points, 30.0);
        assert!((cum.cgpa - 30.0 / 9.0).abs() < 1e-12);
        assert_eq!(cum.classification, "Second Class (Lower)");
    }

    #[test]
    fn cumulative_with_no_semesters_is_zero() {
        let cum = aggregate_cumulative(&[], &default_classification());
        assert_eq!(cum.cumulative_credits, 0);
        assert_eq!(cum.cgpa, 0.0);
        assert_eq!(cum.classification, "Pass/Fail");
    }

    #[test]
    fn classification_thresholds_match_calculator() {
        let t = default_classification();
        assert_eq!(classification_for(&t, 3.9), "First Class");
        assert_eq!(classification_for(&t, 3.6), "Second Class (Upper)");
        assert_eq!(classification_for(&t, 3.1), "Second Class (Lower)");
        assert_eq!(classification_for(&t, 2.6), "Third Class");
        assert_eq!(classification_for(&t, 1.0), "Pass/Fail");
    }

    #[test]
    fn calculator_letter_map_is_independent_of_mark_scale() {
        assert_eq!(calculator_grade_point("A"), Some(3.75));
        assert_eq!(calculator_grade_point("D"), Some(1.5));
        assert_eq!(calculator_grade_point("D+"), Some(1.75));
        assert_eq!(calculator_grade_point("E"), None);
        // The mark scale has no C-/D+ bands; the calculator map does.
        let scale = default_mark_scale();
        assert!(scale.bands().iter().all(|b| b.letter != "C-"));
    }

    #[test]
    fn scale_construction_rejects_bad_tables() {
        let band = |min_total: f64, grade_point: f64, letter: &str| GradeBand {
            min_total,
            grade_point,
            letter: letter.to_string(),
        };
        assert!(GradeScale::new(vec![]).is_err());
        assert!(GradeScale::new(vec![band(50.0, 2.5, "C"), band(60.0, 3.0, "B")]).is_err());
        assert!(GradeScale::new(vec![band(80.0, 4.5, "A+"), band(0.0, 0.0, "F")]).is_err());
        assert!(GradeScale::new(vec![band(80.0, 4.0, "A+"), band(0.0, 0.0, "F")]).is_ok());
    }
}
