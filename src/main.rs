use anyhow::{Context as AnyhowContext, Result};
use apk_crypto_detect::logging::{self, Verbosity, LOG_FILE_NAME};
use apk_crypto_detect::output::ReportSinks;
use apk_crypto_detect::{cli, BatchRunner, Detector, RuleSet};
use clap::Parser;
use tracing::info;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    args.validate().context("Invalid arguments")?;

    std::fs::create_dir_all(&args.output).with_context(|| {
        format!("Cannot create output directory: {}", args.output.display())
    })?;

    let verbosity = Verbosity::from_flags(args.verbose, args.quiet);
    logging::init(verbosity, Some(&args.output.join(LOG_FILE_NAME)))
        .context("Cannot open log file")?;

    let rules = match &args.rules {
        Some(path) => RuleSet::from_bundled_with_user_rules(path),
        None => RuleSet::from_bundled(),
    }
    .context("Cannot load rules")?;

    let apps = args.collect_apps()?;
    if apps.is_empty() {
        info!("no applications found");
        return Ok(());
    }

    let sinks = ReportSinks::create(&args.output, !args.native_only)
        .context("Cannot create output files")?;
    let runner = BatchRunner::new(Detector::new(rules), args.batch_config())?.with_sinks(sinks);

    let summary = runner.run(&apps);
    info!(
        apps = summary.total(),
        completed = summary.completed,
        output = %args.output.display(),
        "done"
    );

    Ok(())
}
