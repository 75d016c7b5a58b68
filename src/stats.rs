use crate::pipeline::SourceStats;

/// Statistic keys in report order. Rows where any source lacks a value
/// (or has only zeros) are skipped, so reserved counters like `goodtags`
/// and `reqs_err` stay out of the report until something populates them.
const STAT_KEYS: &[&str] = &[
    "reqs_err",
    "reqs_web",
    "reqs_cache",
    "results",
    "results_none",
    "results_many",
    "results/req",
    "tags",
    "tags/result",
    "goodtags",
    "goodtags/tag",
    "time_resp_avg",
    "time_wait_avg",
];

/// Render the per-source statistics table shown after a run.
pub fn render(stats: &[SourceStats]) -> String {
    let mut out = String::new();
    out.push_str("Source stats  ");
    for source in stats {
        out.push_str(&format!("| {:<8} ", source.id));
    }
    out.push('\n');
    out.push_str(&"-".repeat(14));
    for _ in stats {
        out.push('+');
        out.push_str(&"-".repeat(10));
    }
    out.push('\n');

    for key in STAT_KEYS {
        let values: Vec<Option<f64>> = stats.iter().map(|s| stat_value(s, key)).collect();
        if !values.iter().all(|v| matches!(v, Some(x) if *x != 0.0)) {
            continue;
        }
        out.push_str(&format!("{key:<13} "));
        for value in values.into_iter().flatten() {
            if value.fract() == 0.0 {
                out.push_str(&format!("| {value:>8.0} "));
            } else {
                out.push_str(&format!("| {value:>8.2} "));
            }
        }
        out.push('\n');
    }
    out
}

/// Resolve one statistic for one source, including derived rates.
/// Returns None when the denominator of a derived rate is zero.
fn stat_value(stats: &SourceStats, key: &str) -> Option<f64> {
    let client = &stats.client;
    let counters = &stats.counters;
    let value = match key {
        "reqs_err" => client.requests_err as f64,
        "reqs_web" => client.requests_web as f64,
        "reqs_cache" => client.requests_cache as f64,
        "results" => counters.results as f64,
        "results_none" => counters.results_none as f64,
        "results_many" => counters.results_many as f64,
        "results/req" => {
            let total = (client.requests_web + client.requests_cache) as f64;
            if total == 0.0 {
                return None;
            }
            counters.results as f64 / total
        }
        "tags" => counters.tags as f64,
        "tags/result" => {
            if counters.results == 0 {
                return None;
            }
            counters.tags as f64 / counters.results as f64
        }
        "goodtags" => counters.goodtags as f64,
        "goodtags/tag" => {
            if counters.tags == 0 {
                return None;
            }
            counters.goodtags as f64 / counters.tags as f64
        }
        "time_resp_avg" => {
            if client.requests_web == 0 {
                return None;
            }
            client.time_resp / client.requests_web as f64
        }
        "time_wait_avg" => {
            if client.requests_web == 0 {
                return None;
            }
            client.time_wait / client.requests_web as f64
        }
        _ => return None,
    };
    Some(value)
}
