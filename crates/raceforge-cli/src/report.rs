use colored::Colorize;
use raceforge_core::metrics::Metrics;
use raceforge_core::orchestrator::{StepOutcome, Trace};

/// Prints a terse per-state trace summary, followed by a metrics report when
/// metrics are enabled (§4.11 / §4.8 — no-op and silent when disabled).
pub fn print(trace: &Trace, metrics: &Metrics) {
	for step in &trace.steps {
		match &step.outcome {
			StepOutcome::Request { status, elapsed_ms } => {
				println!("{} [{}] {} -> {} ({}ms)", "state".dimmed(), step.iteration, step.state, colorize_status(*status), elapsed_ms);
			}
			StepOutcome::Race { results } => {
				println!("{} [{}] {} -> race of {} workers", "state".dimmed(), step.iteration, step.state, results.len());
				for r in results {
					match r.status {
						Some(status) => println!("    worker {} ({}) {} rel={}ns", r.worker_id, r.group, colorize_status(status), r.relative_start_ns),
						None => println!("    worker {} ({}) {} rel={}ns", r.worker_id, r.group, "failed".red(), r.relative_start_ns),
					}
				}
			}
		}
	}

	if !metrics.is_enabled() {
		return;
	}
	let report = metrics.report();
	if report.counters.is_empty() && report.timers.is_empty() {
		return;
	}
	println!("\n{}", "metrics:".bold());
	for (label, count) in &report.counters {
		println!("  {label}: {count}");
	}
	for (label, timer) in &report.timers {
		println!("  {label}: {} samples, {}ns mean", timer.samples, timer.mean_ns);
	}
}

fn colorize_status(status: u16) -> String {
	let text = status.to_string();
	match status {
		200..=299 => text.green().to_string(),
		300..=399 => text.yellow().to_string(),
		_ => text.red().to_string(),
	}
}
