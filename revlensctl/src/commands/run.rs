use std::fs;
use std::path::Path;

use revlens_core::browser::BrowserLauncher;
use revlens_core::scraper::{scrape_targets, CdpDriverFactory};
use revlens_core::trace::{
    standard_format, EchoFormatter, ErrorOnlyFormatter, StandardFormatter, TraceLog, Tracer,
};
use revlens_core::{load_config, Review};

use crate::{Cli, Result, RunArgs};

/// Scrapes every active target. Per-target failures are recorded in the
/// diagnostic log and do not fail the command; only configuration, launch
/// and output errors do.
pub fn execute(cli: &Cli, args: RunArgs) -> Result<()> {
    let config = load_config(&cli.config)?;

    let log = TraceLog::new();
    let (tracer, loop_tracer) = if args.final_log {
        (
            Tracer::new(StandardFormatter, log.clone()),
            Tracer::new(ErrorOnlyFormatter, log.clone()),
        )
    } else {
        (
            Tracer::new(EchoFormatter::new(StandardFormatter), log.clone()),
            Tracer::new(EchoFormatter::new(ErrorOnlyFormatter), log.clone()),
        )
    };

    let mut browser = config.browser.clone();
    if args.headed {
        browser.headless = false;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let reviews: Vec<Review> = runtime.block_on(async {
        let automation = BrowserLauncher::new(browser).launch().await?;
        let drivers = CdpDriverFactory::new(&automation);
        let reviews = scrape_targets(&tracer, &loop_tracer, &drivers, &config.webs).await;
        automation.shutdown().await?;
        Ok::<_, crate::AppError>(reviews)
    })?;

    if args.final_log {
        println!("{}", standard_format(&log.entries()));
    }
    write_outputs(&args.out, &log, &reviews)?;
    println!("{} reviews collected", reviews.len());
    Ok(())
}

/// Writes the reconstructed diagnostic log and, when any review survived
/// filtering, the serialized review list.
pub fn write_outputs(directory: &Path, log: &TraceLog, reviews: &[Review]) -> Result<()> {
    fs::create_dir_all(directory)?;
    fs::write(
        directory.join("reviews.last.log"),
        standard_format(&log.entries()),
    )?;
    if !reviews.is_empty() {
        let serialized = serde_json::to_string_pretty(reviews)?;
        fs::write(directory.join("reviews.json"), serialized)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use revlens_core::trace::{StandardFormatter, TraceLog, Tracer};

    fn sample_review(author_name: &str) -> Review {
        Review {
            provider: "google".to_string(),
            author_name: author_name.to_string(),
            rating: 5,
            content: "Great service here".to_string(),
        }
    }

    #[tokio::test]
    async fn outputs_include_log_and_reviews() {
        let log = TraceLog::new();
        let tracer = Tracer::new(StandardFormatter, log.clone());
        tracer
            .trace("a step", async { Ok::<_, String>(()) })
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let reviews = vec![sample_review("Jane Foe")];
        write_outputs(dir.path(), &log, &reviews).unwrap();

        let written_log = fs::read_to_string(dir.path().join("reviews.last.log")).unwrap();
        assert!(written_log.contains("Start: a step"));
        assert!(written_log.contains("Finish: a step"));

        let written_reviews = fs::read_to_string(dir.path().join("reviews.json")).unwrap();
        let parsed: Vec<Review> = serde_json::from_str(&written_reviews).unwrap();
        assert_eq!(parsed, reviews);
    }

    #[tokio::test]
    async fn empty_review_list_writes_no_json() {
        let log = TraceLog::new();
        let dir = tempfile::tempdir().unwrap();
        write_outputs(dir.path(), &log, &[]).unwrap();

        assert!(dir.path().join("reviews.last.log").exists());
        assert!(!dir.path().join("reviews.json").exists());
    }
}
