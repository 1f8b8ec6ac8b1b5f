use crate::http::Response;
use crate::race::RaceResult;

/// Picks the response whose extracted values feed the variable context after
/// a race burst: the first 2xx response by `relative_start_ns`, or — if none
/// succeeded — the first response by `worker_id` (SPEC_FULL.md §9).
pub fn designated_response<'a>(results: &'a [RaceResult], relative_start_ns: &[u64]) -> Option<(usize, &'a Response)> {
	let mut best: Option<(u64, usize, &Response)> = None;
	for (result, &rel) in results.iter().zip(relative_start_ns.iter()) {
		let Ok(response) = &result.outcome else { continue };
		if !response.is_success() {
			continue;
		}
		if best.as_ref().is_none_or(|(best_rel, _, _)| rel < *best_rel) {
			best = Some((rel, result.worker_id, response));
		}
	}
	if let Some((_, worker_id, response)) = best {
		return Some((worker_id, response));
	}

	results.iter().min_by_key(|r| r.worker_id).and_then(|r| r.outcome.as_ref().ok().map(|resp| (r.worker_id, resp)))
}
