//! `check`: validate a config file and summarize its policies.

use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use logwheel_config::RotationPolicy;

/// Printable view of one validated policy.
#[derive(Debug, Serialize)]
pub struct PolicySummary {
    pub name: String,
    pub directory: String,
    pub file_pattern: String,
    pub keep_files: i64,
    pub timer: String,
    pub min_age_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_compress: Option<u32>,
    pub simulation: bool,
}

impl From<&RotationPolicy> for PolicySummary {
    fn from(policy: &RotationPolicy) -> Self {
        Self {
            name: policy.name.clone(),
            directory: policy.directory.display().to_string(),
            file_pattern: policy.file_pattern.clone(),
            keep_files: policy.retention.keep_files(),
            timer: policy.schedule.expression().to_string(),
            min_age_secs: policy.min_age,
            first_compress: policy.first_compress,
            simulation: policy.simulation,
        }
    }
}

pub fn run_check(config: &Path, json: bool) -> anyhow::Result<()> {
    let policies = logwheel_config::load_policies(config)
        .with_context(|| format!("Invalid config {}", config.display()))?;
    let summaries: Vec<PolicySummary> = policies.iter().map(PolicySummary::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        println!("{} is valid", config.display());
        print!("{}", render_text(&summaries));
    }
    Ok(())
}

fn render_text(summaries: &[PolicySummary]) -> String {
    let mut out = String::new();
    for s in summaries {
        let _ = writeln!(out, "[{}]", s.name);
        let _ = writeln!(out, "  directory:  {}", s.directory);
        let _ = writeln!(out, "  pattern:    {}", s.file_pattern);
        let _ = writeln!(out, "  keep files: {}", s.keep_files);
        let _ = writeln!(out, "  timer:      {}", s.timer);
        let _ = writeln!(out, "  min age:    {}s", s.min_age_secs);
        if let Some(n) = s.first_compress {
            let _ = writeln!(out, "  compress:   from generation {n}");
        }
        if s.simulation {
            let _ = writeln!(out, "  simulation: on");
        }
    }
    out
}
