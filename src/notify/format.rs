use std::fmt::Write as _;

use crate::engine::cycle::TierOutcome;
use crate::engine::types::{CycleOutcome, VenueRef};

/// Contract block for a DEX leg: the token address on its network.
fn contract_block(token: &str, venue: &VenueRef, buy_leg: bool) -> Option<String> {
    let VenueRef::Dex(dex) = venue else {
        return None;
    };
    let address = if buy_leg {
        &dex.output_token.address
    } else {
        &dex.input_token.address
    };
    Some(format!("{} [{}]\n```\n{address}\n```", token.to_uppercase(), dex.network))
}

/// Renders a confirmed cycle as an alert message.
///
/// # Arguments
///
/// * `outcome` - the confirmed cycle
///
/// # Returns
///
/// Multi-line text with profit, legs, route, DEX contracts, check links and
/// bridge links
#[must_use]
pub fn alert(outcome: &CycleOutcome) -> String {
    let mut msg = format!("{} - spread alert!\n", outcome.token);
    if let Some(network) = &outcome.network {
        let _ = writeln!(msg, "Network: {network}");
    }
    let _ = writeln!(
        msg,
        "Profit: {:.2} USDT ({:.2}%, first pass {:.2}%)\n",
        outcome.profit, outcome.profit_percent, outcome.first_pass_percent
    );
    let _ = writeln!(
        msg,
        "Buy: {:.2} USDT -> {:.2} {}",
        outcome.amount_in, outcome.tokens_acquired, outcome.token
    );
    for (index, step) in outcome.step_trace.iter().enumerate() {
        let _ = writeln!(
            msg,
            "Swap-{}: {:.4} {} -> {:.4} {} ({})",
            index + 1,
            step.qty_in,
            step.symbol_in,
            step.qty_out,
            step.symbol_out,
            step.out_contract
        );
    }
    let _ = writeln!(msg, "Received: {:.2} USDT\n", outcome.usdt_received);

    let _ = writeln!(msg, "Buy on: {}", outcome.buy_venue);
    for (index, step) in outcome.step_trace.iter().enumerate() {
        let _ = writeln!(msg, "Swap-{}: {} ({})", index + 1, step.venue, step.network);
    }
    let _ = writeln!(msg, "Sell on: {}", outcome.sell_venue);

    let contracts: Vec<String> = [
        contract_block(&outcome.token, &outcome.buy_venue, true),
        contract_block(&outcome.token, &outcome.sell_venue, false),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !contracts.is_empty() {
        let _ = writeln!(msg, "\n{}", contracts.join("\n\n"));
    }

    let checks: Vec<(&String, &String)> = outcome.check.iter().filter_map(|entry| entry.iter().next()).collect();
    if !checks.is_empty() {
        msg.push_str("\n-- TRANSACTION CHECKING --\n");
        for (label, url) in checks {
            let _ = writeln!(msg, "{label}\n{url}");
        }
    }

    if !outcome.bridge.is_empty() {
        msg.push('\n');
        for button in &outcome.bridge {
            let _ = writeln!(msg, "{}: {}", button.text, button.url);
        }
    }

    msg
}

/// One summary line for a tier, as collected into the log batch.
#[must_use]
pub fn tier_line(scenario: &str, amount: f64, token: &str, outcome: &TierOutcome) -> String {
    let head = format!("Scenario {scenario} {amount:.0} USDT");
    match outcome {
        TierOutcome::Reported(report) => format!(
            "{head} | {:.2} $ | {:.2}% | bought {:.2} {token} on {} | sold {:.2} USDT on {} | REPORTED",
            report.profit,
            report.profit_percent,
            report.tokens_acquired,
            report.buy_venue,
            report.usdt_received,
            report.sell_venue
        ),
        TierOutcome::BelowThreshold(pass) => format!(
            "{head} | {:.2} $ | {:.2}% | bought {:.2} {token} on {} | sold {:.2} USDT on {}",
            pass.profit(),
            pass.profit_percent(),
            pass.tokens_acquired(),
            pass.buy().venue,
            pass.usdt_received(),
            pass.sell().venue
        ),
        TierOutcome::PhantomSpread {
            first,
            confirm_percent: Some(confirm),
        } => format!(
            "{head} | PHANTOM was {:.2}% now {confirm:.2}%",
            first.profit_percent()
        ),
        TierOutcome::PhantomSpread {
            first,
            confirm_percent: None,
        } => format!(
            "{head} | PHANTOM was {:.2}%, confirmation failed",
            first.profit_percent()
        ),
        TierOutcome::BuyFailed => format!("{head} | BUY FAIL"),
        TierOutcome::StepChainBroken { step, venue } => {
            format!("{head} | STEP CHAIN BROKEN at step {step} ({venue})")
        }
        TierOutcome::SellFailed => format!("{head} | SELL FAIL"),
    }
}
