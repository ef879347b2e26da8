use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ritlens_core::classifier::{benchmark_distribution, BenchmarkThresholds};
use ritlens_core::cohort::track_cohort;
use ritlens_core::growth::{analyze_growth, NormTable};
use ritlens_core::model::{AssessmentRecord, Course, JoinedRecord, ProficiencyLevel, StudentProfile};
use ritlens_core::parser::rit_decile;
use ritlens_core::term::TermKey;
use ritlens_core::transition::transition_matrix;

const TERMS: [&str; 6] = [
    "Fall 2023-2024",
    "Spring 2023-2024",
    "Fall 2024-2025",
    "Spring 2024-2025",
    "Fall 2025-2026",
    "Spring 2025-2026",
];

fn generate_records(students: usize) -> Vec<JoinedRecord> {
    let mut records = Vec::with_capacity(students * TERMS.len() * 2);
    for s in 0..students {
        let student_id = format!("{}{:04}", 2019 + s % 3, s);
        let level = ProficiencyLevel::ALL[s % 3];
        for (t, label) in TERMS.iter().enumerate() {
            let term = TermKey::parse(label).expect("valid term");
            let grade = 3 + (t / 2) as u8;
            for course in Course::ALL {
                let rit = (180 + (s % 40) + t * 4) as u16;
                records.push(JoinedRecord {
                    record: AssessmentRecord {
                        student_id: student_id.clone(),
                        grade,
                        course,
                        term_name: label.to_string(),
                        term,
                        rit_score: rit,
                        rit_range: rit_decile(rit),
                        standard_error: Some(3.2),
                        percentile: Some(50),
                        achievement_quintile: None,
                        percent_correct: None,
                        rapid_guessing_percent: Some((s % 35) as f64),
                        test_date: None,
                        duration_minutes: None,
                        lexile_score: None,
                        lexile_range: None,
                        fall_to_spring: None,
                        fall_to_fall: None,
                        goals: vec![],
                        projected_proficiency: vec![],
                    },
                    student: StudentProfile {
                        student_id: student_id.clone(),
                        name: None,
                        grade: 5,
                        level: Some(level),
                        active: true,
                    },
                });
            }
        }
    }
    records
}

fn bench_analyzers(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyzers");
    let records = generate_records(2_000);
    let thresholds = BenchmarkThresholds::default();
    let norms = NormTable::default();
    let spring = TermKey::parse("Spring 2024-2025").expect("valid term");
    let fall = TermKey::parse("Fall 2024-2025").expect("valid term");

    group.bench_function("benchmark_distribution", |b| {
        b.iter(|| benchmark_distribution(black_box(&records), spring, Some(4), &thresholds))
    });

    group.bench_function("transition_matrix", |b| {
        b.iter(|| transition_matrix(black_box(&records), 4, fall, spring, &thresholds))
    });

    group.bench_function("analyze_growth", |b| {
        b.iter(|| analyze_growth(black_box(&records), 2024, 4, Course::Reading, &norms))
    });

    group.bench_function("track_cohort", |b| {
        b.iter(|| track_cohort(black_box(&records), "2019", &norms))
    });

    group.finish();
}

criterion_group!(benches, bench_analyzers);
criterion_main!(benches);
