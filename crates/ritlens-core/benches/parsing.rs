use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ritlens_core::parser::{parse_export, ParserConfig};
use ritlens_core::term::sort_labels;

const HEADER: &str = "StudentID,Grade,Course,TermName,TestRITScore,TestStandardError,TestPercentile,RapidGuessingPercentage,TestStartDate,LexileScore,FallToSpringProjectedGrowth,FallToSpringObservedGrowth,FallToSpringMetProjectedGrowth,Goal1Name,Goal1RitScore,Goal1Range,Goal2Name,Goal2RitScore,Goal2Range,Goal3Name,Goal3RitScore,Goal3Range";

fn generate_export(rows: usize, malformed_every: usize) -> String {
    let mut s = String::from(HEADER);
    for i in 0..rows {
        let (course, goals) = if i % 2 == 0 {
            ("Reading", ["Literary Text: Key Ideas and Details", "Informational Text: Key Ideas and Details", "Vocabulary: Acquisition and Use"])
        } else {
            ("Language Usage", ["Grammar and Usage", "Mechanics", "Writing: Write, Revise Texts for Purpose and Audience"])
        };
        let rit = if malformed_every > 0 && i % malformed_every == 0 {
            999
        } else {
            180 + (i % 50)
        };
        s.push_str(&format!(
            "\n{id},4,{course},Spring 2025-2026,{rit},3.1,55,{rg},4/15/2026,{lex}L,8,9,Yes,\"{g0}\",{rit},{lo}-{hi},\"{g1}\",{rit},{lo}-{hi},\"{g2}\",{rit},{lo}-{hi}",
            id = 20190000 + i / 2,
            rg = i % 40,
            lex = 400 + (i % 60) * 10,
            g0 = goals[0],
            g1 = goals[1],
            g2 = goals[2],
            lo = rit - 5,
            hi = rit + 5,
        ));
    }
    s
}

fn bench_parse_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_export");
    let config = ParserConfig::default();

    let small = generate_export(100, 0);
    let large = generate_export(5_000, 0);
    let dirty = generate_export(5_000, 10);

    group.bench_function("100_rows", |b| {
        b.iter(|| parse_export(black_box(&small), &config))
    });

    group.bench_function("5000_rows", |b| {
        b.iter(|| parse_export(black_box(&large), &config))
    });

    group.bench_function("5000_rows_10pct_invalid", |b| {
        b.iter(|| parse_export(black_box(&dirty), &config))
    });

    group.finish();
}

fn bench_term_sort(c: &mut Criterion) {
    let labels: Vec<String> = (2015..2030)
        .rev()
        .flat_map(|y| {
            ["Spring", "Winter", "Fall"]
                .into_iter()
                .map(move |s| format!("{s} {y}-{}", y + 1))
        })
        .collect();

    c.bench_function("sort_term_labels", |b| {
        b.iter(|| {
            let mut labels = labels.clone();
            sort_labels(black_box(&mut labels));
            labels
        })
    });
}

criterion_group!(benches, bench_parse_export, bench_term_sort);
criterion_main!(benches);
