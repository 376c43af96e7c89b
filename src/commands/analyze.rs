//! Analyze command handler
//!
//! Runs the whole pipeline:
//! 1. Load config and apply CLI overrides
//! 2. Build the provider (fails fast on bad type or missing credential)
//! 3. Discover files
//! 4. Load the cache (or clear it with --no-cache)
//! 5. Process files in parallel and print the run summary

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use codelens::analyzer::{
    create_provider, discover_files, AnalysisCache, DiscoveryOptions, FileOrchestrator,
    OrchestratorSettings, ProgressReporter, PromptTemplates, Provider, ReportWriter, RunProgress,
    RunSummary, StaticAnalyzer, StopSignal,
};
use codelens::cli::AnalyzeArgs;
use codelens::Config;

/// Apply command line overrides on top of the loaded config.
pub fn apply_overrides(config: &mut Config, args: &AnalyzeArgs) {
    if let Some(dir) = &args.input_dir {
        config.input_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(format) = args.format {
        config.report_format = format;
    }
    if args.workers.is_some() {
        config.workers = args.workers;
    }
    if args.static_analysis {
        config.static_analysis = true;
    }
    if let Some(provider) = &args.provider {
        config.provider.kind = provider.clone();
    }
    if let Some(model) = &args.model {
        config.provider.model = Some(model.clone());
    }
}

/// Analyze the configured source tree.
///
/// Returns the run summary; per-file failures are reported there rather
/// than as an error.
#[cfg(not(tarpaulin_include))]
pub fn handle(
    config_path: Option<&Path>,
    args: &AnalyzeArgs,
    quiet: bool,
    stop: StopSignal,
) -> Result<RunSummary> {
    let mut config = super::load_config(config_path)?;
    apply_overrides(&mut config, args);
    config.validate()?;

    let templates = PromptTemplates::from_config(&config)?;
    let provider = create_provider(&config.provider, config.context_window, templates)?;
    let provider: Arc<dyn Provider> = Arc::from(provider);

    let input_dir = config.input_dir();
    if !input_dir.is_dir() {
        anyhow::bail!("Input directory not found: {}", input_dir.display());
    }
    let options = DiscoveryOptions::from_config(&config)?;
    let files = discover_files(&input_dir, &options)
        .with_context(|| format!("Failed to scan {}", input_dir.display()))?;

    // The cache is only dropped once discovery has succeeded
    let cache_path = config.cache_path();
    let cache = if args.no_cache {
        let cache = AnalysisCache::new(&cache_path);
        cache
            .clear()
            .with_context(|| format!("Failed to clear cache {}", cache_path.display()))?;
        cache
    } else {
        AnalysisCache::load(&cache_path)
    };

    let reports = ReportWriter::new(config.output_dir(), config.report_format);
    let mut orchestrator = FileOrchestrator::new(
        provider,
        Arc::new(cache),
        reports,
        OrchestratorSettings::from_config(&config),
    )
    .with_stop_signal(stop);

    if config.static_analysis {
        let analyzer = StaticAnalyzer::detect(std::time::Duration::from_secs(config.provider.timeout));
        if analyzer.is_available() {
            orchestrator = orchestrator.with_findings(Arc::new(analyzer));
        }
    }

    let progress = Arc::new(RunProgress::new(!quiet));
    progress.start(
        files.len(),
        orchestrator.worker_count(files.len()),
        &config.provider.kind,
    );
    let reporter = {
        let progress = Arc::clone(&progress);
        ProgressReporter::with_callback(files.len(), move |done, total| {
            progress.update(done, total)
        })
    };

    let summary = orchestrator.run(files, reporter);
    progress.finish();
    Ok(summary)
}
