use derive_more::Display;

use super::types::VenueClass;

/// Failures the engine distinguishes. All but `ConfigLoad` are recovered
/// locally: they skip a venue, a leg or a single amount tier.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum EngineError {
    /// A single attempt outlived its deadline; its result is discarded
    #[display("Timeout after {millis} ms")]
    Timeout {
        /// Deadline that elapsed
        millis: u64,
    },
    /// No identity had quota left before the acquisition deadline
    #[display("Acquire timeout ({class}/{venue})")]
    AcquireTimeout {
        /// Counter the request would have charged
        class: VenueClass,
        /// Venue the request was for
        venue: String,
    },
    /// Quote failed after retries and the direct fallback
    #[display("Venue {venue} unavailable: {reason}")]
    VenueUnavailable {
        /// Venue name
        venue: String,
        /// Last error seen
        reason: String,
    },
    /// A step swap returned nothing, the chain cannot continue
    #[display("Step chain broken at step {step} ({venue})")]
    StepChainBroken {
        /// 1-based step index
        step: usize,
        /// Venue of the failing step
        venue: String,
    },
    /// The scenario snapshot could not be read; the whole cycle is abandoned
    #[display("Config load failure: {reason}")]
    ConfigLoad {
        /// Underlying error
        reason: String,
    },
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = EngineError::AcquireTimeout {
            class: VenueClass::Dex,
            venue: "Odos".to_string(),
        };
        assert_eq!(err.to_string(), "Acquire timeout (DEX/Odos)");

        let err = EngineError::StepChainBroken {
            step: 2,
            venue: "Relay".to_string(),
        };
        assert_eq!(err.to_string(), "Step chain broken at step 2 (Relay)");
    }

    #[test]
    fn test_downcast_through_eyre() {
        let report = eyre::Report::new(EngineError::Timeout { millis: 15 });
        assert_eq!(
            report.downcast_ref::<EngineError>(),
            Some(&EngineError::Timeout { millis: 15 })
        );
    }
}
