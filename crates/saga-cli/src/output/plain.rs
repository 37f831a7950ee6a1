use std::fmt::Write;

use super::RunReport;

pub(crate) fn plain(report: &RunReport<'_>) -> String {
    let outcome = report.outcome;
    let instance = &outcome.instance;
    let mut output = instance.summary();
    output.push('\n');

    if let Some(error) = &outcome.error {
        let _ = writeln!(output, "\nError: {error}");
    }

    let compensated = instance.compensated_steps();
    if !compensated.is_empty() {
        let _ = writeln!(output, "Compensated: {}", compensated.join(", "));
    }
    let failed = instance.failed_compensations();
    if !failed.is_empty() {
        let _ = writeln!(output, "Failed compensations: {}", failed.join(", "));
    }

    if !report.review_items.is_empty() {
        output.push_str("\nNeeds review:\n");
        for item in &report.review_items {
            let _ = writeln!(
                output,
                "  {}: {} ({})",
                item.step, item.description, item.error
            );
        }
    }

    for decision in &report.decisions {
        let _ = writeln!(
            output,
            "\nDecision: {} (confidence {:.2})",
            decision.decision, decision.confidence
        );
    }

    if !outcome.accounts.is_empty() {
        output.push_str("\nBalances:\n");
        for account in &outcome.accounts {
            let balances: Vec<_> = account
                .balances
                .iter()
                .map(|(asset, balance)| {
                    if balance.locked.is_zero() {
                        format!("{asset} {}", balance.total)
                    } else {
                        format!("{asset} {} ({} locked)", balance.total, balance.locked)
                    }
                })
                .collect();
            let _ = writeln!(output, "  {}: {}", account.id, balances.join(", "));
        }
    }

    output
}
