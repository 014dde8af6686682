//! Outcome event model
//!
//! The reason strings are a stable contract: operators filter the cluster
//! event stream on them.

use std::fmt;

/// Severity of an outcome event, mapped onto the Kubernetes event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    /// Routine outcome
    Normal,
    /// Failed outcome that needs operator attention
    Warning,
}

impl EventSeverity {
    /// Kubernetes event type string
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSeverity::Normal => "Normal",
            EventSeverity::Warning => "Warning",
        }
    }
}

/// Reason code attached to an outcome event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeReason {
    /// The Service allow-list was rewritten
    EnforcementSuccessful,
    /// The ConfigMap could not be read or the Service could not be updated
    EnforcementFailed,
}

impl OutcomeReason {
    /// Reason string published on the event
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeReason::EnforcementSuccessful => "SourceRangesEnforcementSuccessful",
            OutcomeReason::EnforcementFailed => "SourceRangesEnforcementFailed",
        }
    }
}

/// A human readable record of one enforcement outcome, attached to a Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeEvent {
    /// Normal or Warning
    pub severity: EventSeverity,
    /// Stable reason code
    pub reason: OutcomeReason,
    /// Free-text note shown to operators
    pub message: String,
}

impl OutcomeEvent {
    /// Successful allow-list rewrite.
    pub fn successful(message: impl Into<String>) -> Self {
        Self {
            severity: EventSeverity::Normal,
            reason: OutcomeReason::EnforcementSuccessful,
            message: message.into(),
        }
    }

    /// Failed lookup or update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            severity: EventSeverity::Warning,
            reason: OutcomeReason::EnforcementFailed,
            message: message.into(),
        }
    }
}

/// Renders as `<Severity> <Reason> <message>`, the same shape `kubectl get events` shows.
impl fmt::Display for OutcomeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.severity.as_str(), self.reason.as_str(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_stable() {
        assert_eq!(OutcomeReason::EnforcementSuccessful.as_str(), "SourceRangesEnforcementSuccessful");
        assert_eq!(OutcomeReason::EnforcementFailed.as_str(), "SourceRangesEnforcementFailed");
    }

    #[test]
    fn test_event_display() {
        let event = OutcomeEvent::failed("could not read ConfigMap edge: boom");
        assert_eq!(
            event.to_string(),
            "Warning SourceRangesEnforcementFailed could not read ConfigMap edge: boom"
        );
    }
}
