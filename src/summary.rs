use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;

// encode the template HTML file at compile time as a string literal
const TEMPLATE_HTML: &str = include_str!("summary_template.html");

/// Renders the statistics report of a merging run as an HTML page.
///
/// # Arguments
///
/// * `stats` - Path of the `merge_stats.json` written by a run.
/// * `output` - Path of the HTML file to write.
pub fn summarize(stats: &Path, output: &Path) -> Result<()> {
    info!("Summarising run statistics at {stats:?}");
    let file =
        std::fs::File::open(stats).with_context(|| format!("Unable to open file {stats:?}"))?;
    let mut data: serde_json::Value =
        serde_json::from_reader(file).context("Could not parse statistics report")?;

    let counts = &data["counts"];
    let total: u64 = ["merged", "chimera", "too_short"]
        .iter()
        .filter_map(|k| counts[k].as_u64())
        .sum();

    // percentages, rounded to 2dp
    let pct = |k: &str| -> String {
        let n = counts[k].as_u64().unwrap_or(0);
        if total == 0 {
            String::from("0.00")
        } else {
            format!("{:.2}", 100.0 * n as f64 / total as f64)
        }
    };
    let percentages = json!({
        "merged": pct("merged"),
        "chimera": pct("chimera"),
        "too_short": pct("too_short"),
    });

    let config_json = serde_json::to_string_pretty(&data["config"])?;
    data["total"] = json!(total);
    data["percentages"] = percentages;
    data["config_json"] = json!(config_json);

    let file = std::fs::File::create(output)
        .with_context(|| format!("Unable to create file {output:?}"))?;
    let reg = handlebars::Handlebars::new();
    reg.render_template_to_write(TEMPLATE_HTML, &data, file)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_counts() {
        let dir = tempfile::tempdir().unwrap();
        let stats = dir.path().join("merge_stats.json");
        std::fs::write(
            &stats,
            r#"{"version": "0.1.0", "date": "2024-01-01T00:00:00+00:00",
                "forward": "R1.fastq", "reverse": "R2.fastq", "elapsed_secs": 1.5,
                "stages": ["naive"],
                "counts": {"merged": 3, "chimera": 1, "too_short": 0, "tool_failures": 0},
                "config": {"min_overlap": 11}}"#,
        )
        .unwrap();

        let out = dir.path().join("summary.html");
        summarize(&stats, &out).unwrap();

        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains("75.00"));
        assert!(html.contains("R1.fastq"));
    }
}
