use serde::{Deserialize, Serialize};
use std::fmt;

/// Steps of one bet submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStep {
    Idle,
    Selecting,
    Confirming,
    Processing,
    /// Placement acknowledged. Not the same as the bet being resolved.
    Settled,
    Error,
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowStep::Idle => write!(f, "idle"),
            FlowStep::Selecting => write!(f, "selecting"),
            FlowStep::Confirming => write!(f, "confirming"),
            FlowStep::Processing => write!(f, "processing"),
            FlowStep::Settled => write!(f, "settled"),
            FlowStep::Error => write!(f, "error"),
        }
    }
}

/// Inputs that drive the step machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowAction {
    SelectEvent,
    SelectOutcome,
    SetAmount,
    EditSlip,
    Confirm,
    Submit,
    PlacementSucceeded,
    PlacementFailed,
    Fail,
    Reset,
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowAction::SelectEvent => "select an event",
            FlowAction::SelectOutcome => "select an outcome",
            FlowAction::SetAmount => "set the stake",
            FlowAction::EditSlip => "edit the bet slip",
            FlowAction::Confirm => "confirm",
            FlowAction::Submit => "submit",
            FlowAction::PlacementSucceeded => "complete placement",
            FlowAction::PlacementFailed => "fail placement",
            FlowAction::Fail => "fail",
            FlowAction::Reset => "reset",
        };
        write!(f, "{s}")
    }
}

/// The transition table. `None` means the action is not allowed from `from`.
pub fn transition(from: FlowStep, action: FlowAction) -> Option<FlowStep> {
    use FlowAction as A;
    use FlowStep as S;

    match (from, action) {
        (_, A::Reset) => Some(S::Idle),

        (S::Idle | S::Selecting | S::Confirming | S::Error, A::SelectEvent) => Some(S::Selecting),

        (S::Selecting | S::Confirming | S::Error, A::SelectOutcome) => Some(S::Selecting),

        (S::Selecting, A::SetAmount) => Some(S::Selecting),
        (S::Confirming, A::SetAmount) => Some(S::Confirming),
        (S::Error, A::SetAmount) => Some(S::Selecting),

        (S::Idle | S::Selecting | S::Confirming | S::Error, A::EditSlip) => Some(from),

        (S::Selecting | S::Error, A::Confirm) => Some(S::Confirming),

        (S::Selecting | S::Confirming | S::Error, A::Submit) => Some(S::Processing),

        (S::Processing, A::PlacementSucceeded) => Some(S::Settled),
        (S::Processing, A::PlacementFailed) => Some(S::Error),

        (S::Selecting | S::Confirming | S::Processing | S::Error, A::Fail) => Some(S::Error),

        _ => None,
    }
}
