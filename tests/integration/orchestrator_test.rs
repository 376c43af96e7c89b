//! End-to-end pipeline tests with a scripted provider

use std::fs;
use std::sync::Arc;

use serde_json::Value;

use codelens::analyzer::fingerprint::{fingerprint_bytes, fingerprint_file};
use codelens::analyzer::{
    AnalysisCache, FailureReason, FileStatus, ProgressReporter, ProviderError, SkipReason,
};
use codelens::config::ReportFormat;

use super::helpers::{
    fixed_width_lines, python_source, sample_record, server_error, ScriptedProvider, Workspace,
};

fn run(
    ws: &Workspace,
    provider: &Arc<ScriptedProvider>,
    format: ReportFormat,
) -> codelens::RunSummary {
    let files = ws.discover();
    let total = files.len();
    ws.orchestrator(provider.clone(), format)
        .run(files, ProgressReporter::new(total))
}

#[test]
fn small_file_is_analyzed_in_one_call_and_cached() {
    let ws = Workspace::new();
    let path = ws.write_source("main.py", &python_source(50));
    let record = sample_record("Computes totals");
    let provider = Arc::new(ScriptedProvider::fixed(1_000, record.clone()));

    let summary = run(&ws, &provider, ReportFormat::Json);

    assert_eq!(summary.analyzed, 1);
    assert!(!summary.has_failures());
    assert_eq!(provider.analyze_count(), 1);
    assert_eq!(provider.summarize_count(), 0);

    let report_path = ws.output_dir().join("main.py.json");
    let doc: Value = serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(doc["analysis"], Value::Object(record));
    assert_eq!(doc["synthesized"], Value::Bool(false));
    assert_eq!(doc["file"], "main.py");

    let cache = AnalysisCache::load(ws.cache_path());
    assert_eq!(cache.len(), 1);
    let entry = cache.lookup("main.py").unwrap();
    assert_eq!(entry.fingerprint, fingerprint_file(&path));
    assert_eq!(entry.report_path, report_path);
}

#[test]
fn oversized_file_is_chunked_and_synthesized() {
    let ws = Workspace::new();
    // 1200 chars = 300 estimated tokens against a 100 token window
    ws.write_source("big.py", &fixed_width_lines(120));
    let provider = Arc::new(ScriptedProvider::fixed(100, sample_record("Big module")));

    let summary = run(&ws, &provider, ReportFormat::Markdown);

    assert_eq!(summary.analyzed, 1);
    assert_eq!(summary.synthesized, 1);
    let chunks = match &summary.outcome("big.py").unwrap().status {
        FileStatus::Analyzed {
            synthesized,
            chunks,
            ..
        } => {
            assert!(*synthesized);
            *chunks
        }
        other => panic!("unexpected status {:?}", other),
    };
    assert!(chunks >= 2);
    assert_eq!(provider.analyze_count(), chunks);
    assert_eq!(provider.summarize_count(), 1);
    assert_eq!(provider.summarize_calls.lock().unwrap()[0].len(), chunks);

    let report = fs::read_to_string(ws.output_dir().join("big.py.md")).unwrap();
    assert!(report.contains(&format!("Synthesized from {} of {} chunks", chunks, chunks)));
    assert!(report.contains("```mermaid"));

    // Every chunk fits the content budget
    for call in provider.analyze_calls.lock().unwrap().iter() {
        assert!(call.code.chars().count() <= 400);
    }
}

#[test]
fn unchanged_file_is_skipped_without_provider_calls() {
    let ws = Workspace::new();
    ws.write_source("main.py", &python_source(20));

    let first = Arc::new(ScriptedProvider::fixed(1_000, sample_record("v1")));
    assert_eq!(run(&ws, &first, ReportFormat::Json).analyzed, 1);

    let second = Arc::new(ScriptedProvider::fixed(1_000, sample_record("v2")));
    let summary = run(&ws, &second, ReportFormat::Json);

    assert_eq!(second.total_attempts(), 0);
    assert_eq!(summary.skipped_unchanged, 1);
    assert_eq!(summary.analyzed, 0);
    assert_eq!(
        summary.outcome("main.py").unwrap().status,
        FileStatus::Skipped(SkipReason::Unchanged)
    );
}

#[test]
fn failed_chunk_is_left_out_of_synthesis() {
    let ws = Workspace::new();
    // Three chunks of forty lines; the second one carries the failure marker
    let mut text = fixed_width_lines(120);
    text = text.replacen("000000045\n", "FAILCHUNK\n", 1);
    ws.write_source("mixed.py", &text);

    let provider = Arc::new(ScriptedProvider::new(
        100,
        |code, _| {
            if code.contains("FAILCHUNK") {
                Err(server_error())
            } else {
                Ok(sample_record("chunk"))
            }
        },
        |_| Ok(sample_record("merged")),
    ));

    let summary = run(&ws, &provider, ReportFormat::Json);

    assert!(!summary.has_failures());
    assert_eq!(summary.analyzed, 1);
    assert_eq!(summary.failed_chunks, 1);
    match &summary.outcome("mixed.py").unwrap().status {
        FileStatus::Analyzed {
            chunks,
            failed_chunks,
            ..
        } => {
            assert_eq!(*chunks, 3);
            assert_eq!(*failed_chunks, 1);
        }
        other => panic!("unexpected status {:?}", other),
    }
    // 2 good chunks + 3 attempts on the bad one
    assert_eq!(provider.analyze_count(), 5);
    let merged = provider.summarize_calls.lock().unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].len(), 2);

    let usage = summary.outcome("mixed.py").unwrap().usage;
    assert_eq!(usage.calls, 4);
    assert_eq!(usage.attempts, 6);
    assert_eq!(usage.chunks, 3);
}

#[test]
fn all_chunks_failing_is_a_synthesis_error() {
    let ws = Workspace::new();
    ws.write_source("broken.py", &fixed_width_lines(120));
    let provider = Arc::new(ScriptedProvider::new(
        100,
        |_, _| Err(server_error()),
        |_| Ok(sample_record("never")),
    ));

    let summary = run(&ws, &provider, ReportFormat::Json);

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].1.reason, FailureReason::SynthesisError);
    assert_eq!(provider.summarize_count(), 0);
    assert!(AnalysisCache::load(ws.cache_path()).is_empty());
    assert!(!ws.output_dir().join("broken.py.json").exists());
}

#[test]
fn failing_synthesis_call_fails_the_file() {
    let ws = Workspace::new();
    ws.write_source("big.py", &fixed_width_lines(120));
    let provider = Arc::new(ScriptedProvider::new(
        100,
        |_, _| Ok(sample_record("chunk")),
        |_| Err(server_error()),
    ));

    let summary = run(&ws, &provider, ReportFormat::Json);

    assert_eq!(summary.failures[0].1.reason, FailureReason::SynthesisError);
    assert_eq!(provider.summarize_count(), 3);
}

#[test]
fn blocked_response_is_not_retried() {
    let ws = Workspace::new();
    ws.write_source("main.py", &python_source(10));
    let provider = Arc::new(ScriptedProvider::new(
        1_000,
        |_, _| Err(ProviderError::Blocked("SAFETY".to_string())),
        |_| Ok(sample_record("never")),
    ));

    let summary = run(&ws, &provider, ReportFormat::Json);

    assert_eq!(provider.total_attempts(), 1);
    assert_eq!(summary.failures[0].1.reason, FailureReason::ProviderBlocked);
}

#[test]
fn transient_errors_are_retried_until_success() {
    let ws = Workspace::new();
    ws.write_source("main.py", &python_source(10));
    let calls = std::sync::atomic::AtomicUsize::new(0);
    let provider = Arc::new(ScriptedProvider::new(
        1_000,
        move |_, _| {
            if calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < 2 {
                Err(server_error())
            } else {
                Ok(sample_record("third time"))
            }
        },
        |_| Ok(sample_record("never")),
    ));

    let summary = run(&ws, &provider, ReportFormat::Json);

    assert_eq!(summary.analyzed, 1);
    assert_eq!(provider.total_attempts(), 3);
    assert_eq!(summary.usage.attempts, 3);
    assert_eq!(summary.usage.calls, 1);
}

#[test]
fn empty_file_fails_with_no_content() {
    let ws = Workspace::new();
    ws.write_source("empty.py", "  \n\n");
    ws.write_source("ok.py", &python_source(5));
    let provider = Arc::new(ScriptedProvider::fixed(1_000, sample_record("ok")));

    let summary = run(&ws, &provider, ReportFormat::Text);

    assert_eq!(summary.analyzed, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, "empty.py");
    assert_eq!(summary.failures[0].1.reason, FailureReason::NoContent);
    assert_eq!(provider.analyze_count(), 1);
    assert!(ws.output_dir().join("ok.py.txt").exists());
}

#[test]
fn nul_byte_past_the_sniff_window_is_a_decode_error() {
    let ws = Workspace::new();
    let mut text = python_source(200).into_bytes();
    text.push(0);
    fs::write(ws.input_dir().join("odd.py"), &text).unwrap();
    let provider = Arc::new(ScriptedProvider::fixed(100_000, sample_record("x")));

    let summary = run(&ws, &provider, ReportFormat::Json);

    assert_eq!(summary.failures[0].1.reason, FailureReason::DecodeError);
    assert_eq!(provider.total_attempts(), 0);
}

#[test]
fn deleted_report_forces_reanalysis() {
    let ws = Workspace::new();
    ws.write_source("main.py", &python_source(10));
    let provider = Arc::new(ScriptedProvider::fixed(1_000, sample_record("v1")));
    run(&ws, &provider, ReportFormat::Json);

    fs::remove_file(ws.output_dir().join("main.py.json")).unwrap();
    let again = Arc::new(ScriptedProvider::fixed(1_000, sample_record("v2")));
    let summary = run(&ws, &again, ReportFormat::Json);

    assert_eq!(summary.analyzed, 1);
    assert_eq!(again.analyze_count(), 1);
}

#[test]
fn changed_file_is_reanalyzed() {
    let ws = Workspace::new();
    ws.write_source("main.py", &python_source(10));
    let provider = Arc::new(ScriptedProvider::fixed(1_000, sample_record("v1")));
    run(&ws, &provider, ReportFormat::Json);

    ws.write_source("main.py", &python_source(11));
    let again = Arc::new(ScriptedProvider::fixed(1_000, sample_record("v2")));
    let summary = run(&ws, &again, ReportFormat::Json);

    assert_eq!(summary.analyzed, 1);
    let doc: Value = serde_json::from_str(
        &fs::read_to_string(ws.output_dir().join("main.py.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(doc["analysis"]["overview"], "v2");
}

#[test]
fn cached_fingerprint_matches_the_analyzed_bytes() {
    let ws = Workspace::new();
    let original = python_source(10);
    let path = ws.write_source("main.py", &original);
    let edited = python_source(12);

    // The file is edited while its analysis is in flight
    let provider = {
        let path = path.clone();
        let edited = edited.clone();
        Arc::new(ScriptedProvider::new(
            1_000,
            move |_, _| {
                fs::write(&path, &edited).unwrap();
                Ok(sample_record("v1"))
            },
            |_| Ok(sample_record("never")),
        ))
    };
    run(&ws, &provider, ReportFormat::Json);

    assert_eq!(provider.analyze_calls.lock().unwrap()[0].code, original);
    let entry = AnalysisCache::load(ws.cache_path()).lookup("main.py").unwrap();
    assert_eq!(entry.fingerprint, fingerprint_bytes(original.as_bytes()));

    // The edit is picked up on the next run
    let again = Arc::new(ScriptedProvider::fixed(1_000, sample_record("v2")));
    let summary = run(&ws, &again, ReportFormat::Json);
    assert_eq!(summary.analyzed, 1);
    assert_eq!(again.analyze_calls.lock().unwrap()[0].code, edited);
}

#[test]
fn report_write_failure_leaves_cache_untouched() {
    let ws = Workspace::new();
    ws.write_source("main.py", &python_source(10));
    // A regular file where the report directory should be
    fs::write(ws.output_dir(), "not a directory").unwrap();
    let provider = Arc::new(ScriptedProvider::fixed(1_000, sample_record("x")));

    let summary = run(&ws, &provider, ReportFormat::Json);

    assert_eq!(summary.failures[0].1.reason, FailureReason::ReportWriteError);
    assert!(AnalysisCache::load(ws.cache_path()).is_empty());
}

#[test]
fn stopped_run_reports_files_as_cancelled() {
    let ws = Workspace::new();
    for name in ["a.py", "b.py", "c.py"] {
        ws.write_source(name, &python_source(5));
    }
    let provider = Arc::new(ScriptedProvider::fixed(1_000, sample_record("x")));
    let files = ws.discover();
    let orchestrator = ws.orchestrator(provider.clone(), ReportFormat::Json);
    orchestrator.stop_signal().stop();

    let summary = orchestrator.run(files, ProgressReporter::new(3));

    assert_eq!(summary.cancelled, 3);
    assert_eq!(summary.analyzed, 0);
    assert_eq!(provider.total_attempts(), 0);
}

#[test]
fn findings_go_to_the_first_chunk_only() {
    struct FixedFindings;
    impl codelens::analyzer::FindingsSource for FixedFindings {
        fn findings(&self, _path: &std::path::Path) -> Option<String> {
            Some("W0612 unused variable".to_string())
        }
    }

    let ws = Workspace::new();
    ws.write_source("big.py", &fixed_width_lines(120));
    let provider = Arc::new(ScriptedProvider::fixed(100, sample_record("x")));
    let files = ws.discover();
    ws.orchestrator(provider.clone(), ReportFormat::Json)
        .with_findings(Arc::new(FixedFindings))
        .run(files, ProgressReporter::new(1));

    let calls = provider.analyze_calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].findings.as_deref(), Some("W0612 unused variable"));
    assert!(calls[1..].iter().all(|c| c.findings.is_none()));
}

#[test]
fn progress_callback_sees_every_file() {
    let ws = Workspace::new();
    for name in ["a.py", "b.py", "pkg/c.py", "pkg/d.py"] {
        ws.write_source(name, &python_source(5));
    }
    let provider = Arc::new(ScriptedProvider::fixed(1_000, sample_record("x")));
    let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let reporter = {
        let seen = Arc::clone(&seen);
        ProgressReporter::with_callback(4, move |_, _| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
    };

    let summary = ws
        .orchestrator(provider.clone(), ReportFormat::Markdown)
        .run(ws.discover(), reporter);

    assert_eq!(summary.analyzed, 4);
    assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 4);
    assert!(ws.output_dir().join("pkg").join("c.py.md").exists());
    assert_eq!(AnalysisCache::load(ws.cache_path()).len(), 4);
}
