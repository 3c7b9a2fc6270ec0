use anyhow::{bail, Result};
use authz::pattern::normalize_path;
use authz::types::AccessDecision;
use colored::*;
use serde_json::json;

use crate::config::GateConfig;

/// Print the decision the filter chain makes for `path`
pub fn execute(config: &GateConfig, path: &str, format: &str) -> Result<()> {
    let chain = config.filter_chain()?;
    let decision = chain.evaluate(path);
    let rule = chain.matching_rule(path).map(|rule| rule.to_string());

    match format {
        "json" => {
            let output = json!({
                "path": path,
                "normalized": normalize_path(path),
                "rule": rule,
                "decision": decision,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "text" => {
            let label = decision.to_string();
            let label = match decision {
                AccessDecision::Allow => label.green(),
                AccessDecision::TriggerLogout => label.cyan(),
                _ => label.yellow(),
            };
            println!("{} -> {}", path, label.bold());
            match rule {
                Some(rule) => println!("  matched rule: {}", rule),
                None => println!("  matched rule: none"),
            }
        }
        other => bail!("Unknown format: {} (expected json or text)", other),
    }
    Ok(())
}
