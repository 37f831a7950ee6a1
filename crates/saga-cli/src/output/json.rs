use serde_json::json as value;

use super::RunReport;

pub(crate) fn json(report: &RunReport<'_>) -> serde_json::Result<String> {
    let outcome = report.outcome;
    serde_json::to_string_pretty(&value!({
        "saga": outcome.kind.name(),
        "status": outcome.instance.status(),
        "succeeded": outcome.succeeded(),
        "instance": outcome.instance,
        "output": outcome.output,
        "error": outcome.error,
        "decisions": report.decisions,
        "review": report.review_items,
        "accounts": outcome.accounts,
        "operations": outcome.operations,
        "events": outcome.events,
    }))
}
