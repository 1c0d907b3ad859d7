use serde::Serialize;

use revlens_core::{load_config, WebTarget};

use crate::{Cli, OutputFormat, Result};

#[derive(Debug, Serialize)]
struct TargetSummary {
    title: String,
    provider: String,
    url: String,
    active: bool,
}

impl From<&WebTarget> for TargetSummary {
    fn from(target: &WebTarget) -> Self {
        Self {
            title: target.title.clone(),
            provider: target.provider().tag().to_string(),
            url: target.url.clone(),
            active: target.activate,
        }
    }
}

pub fn execute(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let summaries: Vec<TargetSummary> = config.webs.iter().map(TargetSummary::from).collect();

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Text => {
            for summary in &summaries {
                let marker = if summary.active { "*" } else { " " };
                println!(
                    "{marker} {} [{}] {}",
                    summary.title, summary.provider, summary.url
                );
            }
        }
    }
    Ok(())
}
