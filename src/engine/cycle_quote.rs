use super::types::{QuoteResult, StepTrace};

/// Profit percent of spending `spent` and receiving `received`.
/// Zero when nothing was spent.
#[must_use]
pub fn profit_percent(spent: f64, received: f64) -> f64 {
    if spent == 0.0 {
        return 0.0;
    }
    (received - spent) / spent * 100.0
}

/// Represents one full pass through a scenario at a fixed amount: the best
/// buy, the step chain that followed it and the best sell of what was left.
///
/// A `CycleQuote` only exists for passes where every leg produced something;
/// failed passes never get this far.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleQuote {
    /// USDT put into the buy leg
    amount_in: f64,
    /// Winning buy quote
    buy: QuoteResult,
    /// Executed steps, empty without step swaps
    step_trace: Vec<StepTrace>,
    /// Tokens handed to the sell leg
    tokens_after_steps: f64,
    /// Winning sell quote
    sell: QuoteResult,
}

impl CycleQuote {
    /// Assembles a pass.
    ///
    /// # Arguments
    ///
    /// * `amount_in` - USDT spent
    /// * `buy` - best buy quote
    /// * `step_trace` - steps run between the legs
    /// * `tokens_after_steps` - input of the sell leg
    /// * `sell` - best sell quote
    #[must_use]
    pub const fn new(
        amount_in: f64,
        buy: QuoteResult,
        step_trace: Vec<StepTrace>,
        tokens_after_steps: f64,
        sell: QuoteResult,
    ) -> Self {
        Self {
            amount_in,
            buy,
            step_trace,
            tokens_after_steps,
            sell,
        }
    }

    /// USDT spent
    #[must_use]
    pub const fn amount_in(&self) -> f64 {
        self.amount_in
    }

    /// Winning buy quote
    #[must_use]
    pub const fn buy(&self) -> &QuoteResult {
        &self.buy
    }

    /// Winning sell quote
    #[must_use]
    pub const fn sell(&self) -> &QuoteResult {
        &self.sell
    }

    /// Tokens received on the buy leg
    #[must_use]
    pub const fn tokens_acquired(&self) -> f64 {
        self.buy.amount_out
    }

    /// Tokens sold on the sell leg
    #[must_use]
    pub const fn tokens_after_steps(&self) -> f64 {
        self.tokens_after_steps
    }

    /// USDT received on the sell leg
    #[must_use]
    pub const fn usdt_received(&self) -> f64 {
        self.sell.amount_out
    }

    /// Executed steps
    #[must_use]
    pub fn step_trace(&self) -> &[StepTrace] {
        &self.step_trace
    }

    /// Consumes the quote, returning the step trace
    #[must_use]
    pub fn into_step_trace(self) -> Vec<StepTrace> {
        self.step_trace
    }

    /// Calculates the profit of this pass in USDT.
    ///
    /// # Returns
    ///
    /// The profit, negative when the pass loses money
    #[must_use]
    pub fn profit(&self) -> f64 {
        self.usdt_received() - self.amount_in
    }

    /// Profit as a percentage of the amount spent.
    #[must_use]
    pub fn profit_percent(&self) -> f64 {
        profit_percent(self.amount_in, self.usdt_received())
    }

    /// Whether the pass is profitable enough to report at `threshold_percent`.
    #[must_use]
    pub fn clears(&self, threshold_percent: f64) -> bool {
        self.profit_percent() >= threshold_percent
    }
}
