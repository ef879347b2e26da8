//! The `ritlens init` command.

use std::path::Path;

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    // Create ritlens.toml
    if Path::new("ritlens.toml").exists() {
        println!("ritlens.toml already exists, skipping.");
    } else {
        std::fs::write("ritlens.toml", SAMPLE_CONFIG).context("failed to write ritlens.toml")?;
        println!("Created ritlens.toml");
    }

    // Create a sample norm table
    std::fs::create_dir_all("norms").context("failed to create norms/")?;
    let norms_path = Path::new("norms/sample-norms.csv");
    if norms_path.exists() {
        println!("norms/sample-norms.csv already exists, skipping.");
    } else {
        std::fs::write(norms_path, SAMPLE_NORMS).context("failed to write sample norms")?;
        println!("Created norms/sample-norms.csv");
    }

    println!("\nNext steps:");
    println!("  1. Replace norms/sample-norms.csv with your published norm table");
    println!("  2. Run: ritlens validate --input <export.csv>");
    println!("  3. Run: ritlens ingest --input <export.csv>");
    println!("  4. Run: ritlens report --term \"Spring 2025-2026\" --grade 4");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# ritlens configuration

norms_path = "norms/sample-norms.csv"
store_dir = "./ritlens-store"

[parser]
max_goals = 8
max_projected_proficiency = 4
grade_min = 0
grade_max = 12
student_id_pattern = "^[0-9]{6,10}$"
delimiter = ","

[analytics]
row_cap = 50000
rapid_guess_threshold = 30.0
parallelism = 4

# Override benchmark cutoffs per grade ("K" for kindergarten).
# [thresholds.4]
# e1_min = 210.0
# e2_min = 196.0
"#;

const SAMPLE_NORMS: &str = "AcademicYear,Grade,Term,Course,ExpectedRIT,ExpectedGrowth
2025-2026,3,Fall,Reading,188.3,
2025-2026,3,Winter,Reading,194.2,
2025-2026,3,Spring,Reading,198.6,10.3
2025-2026,3,Fall,Language Usage,189.0,
2025-2026,3,Winter,Language Usage,195.1,
2025-2026,3,Spring,Language Usage,199.5,10.5
2025-2026,4,Fall,Reading,197.1,
2025-2026,4,Winter,Reading,201.4,
2025-2026,4,Spring,Reading,204.8,7.7
2025-2026,4,Fall,Language Usage,197.5,
2025-2026,4,Winter,Language Usage,202.0,
2025-2026,4,Spring,Language Usage,205.5,8.0
2025-2026,5,Fall,Reading,203.6,
2025-2026,5,Winter,Reading,207.0,
2025-2026,5,Spring,Reading,209.8,6.2
2025-2026,5,Fall,Language Usage,204.0,
2025-2026,5,Winter,Language Usage,207.7,
2025-2026,5,Spring,Language Usage,210.6,6.6
";
