/// Digest authentication state machine - Stateright model
/// Verifies the REGISTER flow: Unchallenged -> Challenged -> terminal,
/// with at most one authenticated retry.
///
/// Run with: cargo test --release auth_model -- --nocapture
use stateright::*;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum AuthPhase {
    AwaitingFirst,
    Challenged,
    AwaitingRetry,
    Authenticated,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum FlowAction {
    Receive200,
    ReceiveChallenge,
    ReceiveOther,
    SendAuthRetry,
    Timeout,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct FlowState {
    pub phase: AuthPhase,
    pub requests_sent: u8,
    pub challenge_seen: bool,
}

#[derive(Clone, Default)]
pub struct RegisterFlowChecker;

impl Model for RegisterFlowChecker {
    type State = FlowState;
    type Action = FlowAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![FlowState {
            phase: AuthPhase::AwaitingFirst,
            requests_sent: 1,
            challenge_seen: false,
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        match state.phase {
            AuthPhase::AwaitingFirst => {
                actions.push(FlowAction::Receive200);
                actions.push(FlowAction::ReceiveChallenge);
                actions.push(FlowAction::ReceiveOther);
                actions.push(FlowAction::Timeout);
            }
            AuthPhase::Challenged => {
                actions.push(FlowAction::SendAuthRetry);
            }
            AuthPhase::AwaitingRetry => {
                actions.push(FlowAction::Receive200);
                actions.push(FlowAction::ReceiveChallenge);
                actions.push(FlowAction::ReceiveOther);
                actions.push(FlowAction::Timeout);
            }
            AuthPhase::Authenticated | AuthPhase::Rejected | AuthPhase::Failed => {}
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();
        match (state.phase.clone(), action) {
            (AuthPhase::AwaitingFirst, FlowAction::Receive200) => {
                next.phase = AuthPhase::Authenticated;
            }
            (AuthPhase::AwaitingFirst, FlowAction::ReceiveChallenge) => {
                next.phase = AuthPhase::Challenged;
                next.challenge_seen = true;
            }
            (AuthPhase::AwaitingFirst, FlowAction::ReceiveOther)
            | (AuthPhase::AwaitingFirst, FlowAction::Timeout) => {
                next.phase = AuthPhase::Failed;
            }
            (AuthPhase::Challenged, FlowAction::SendAuthRetry) => {
                next.phase = AuthPhase::AwaitingRetry;
                next.requests_sent = state.requests_sent.saturating_add(1);
            }
            (AuthPhase::AwaitingRetry, FlowAction::Receive200) => {
                next.phase = AuthPhase::Authenticated;
            }
            // second challenge means wrong credentials: terminal, no third try
            (AuthPhase::AwaitingRetry, FlowAction::ReceiveChallenge)
            | (AuthPhase::AwaitingRetry, FlowAction::ReceiveOther) => {
                next.phase = AuthPhase::Rejected;
            }
            (AuthPhase::AwaitingRetry, FlowAction::Timeout) => {
                next.phase = AuthPhase::Failed;
            }
            _ => return None,
        }
        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            // Safety: never more than the initial request plus one retry
            Property::always("at_most_one_retry", |_, state: &FlowState| {
                state.requests_sent <= 2
            }),
            // Safety: a retry implies a challenge was seen
            Property::always("retry_only_after_challenge", |_, state: &FlowState| {
                state.requests_sent < 2 || state.challenge_seen
            }),
            // Safety: rejection only happens on the challenged path
            Property::always("rejected_implies_challenged", |_, state: &FlowState| {
                state.phase != AuthPhase::Rejected || state.challenge_seen
            }),
            // Liveness: the flow always reaches a terminal phase
            Property::eventually("flow_terminates", |_, state: &FlowState| {
                matches!(
                    state.phase,
                    AuthPhase::Authenticated | AuthPhase::Rejected | AuthPhase::Failed
                )
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    #[test]
    fn auth_model_check_properties() {
        let checker = RegisterFlowChecker.checker().spawn_bfs().join();
        println!("states explored: {}", checker.unique_state_count());
        checker.assert_properties();
    }

    #[test]
    fn auth_model_happy_path() {
        let model = RegisterFlowChecker;
        let mut state = model.init_states()[0].clone();
        assert_eq!(state.phase, AuthPhase::AwaitingFirst);

        state = model
            .next_state(&state, FlowAction::ReceiveChallenge)
            .unwrap();
        assert_eq!(state.phase, AuthPhase::Challenged);

        state = model.next_state(&state, FlowAction::SendAuthRetry).unwrap();
        assert_eq!(state.phase, AuthPhase::AwaitingRetry);
        assert_eq!(state.requests_sent, 2);

        state = model.next_state(&state, FlowAction::Receive200).unwrap();
        assert_eq!(state.phase, AuthPhase::Authenticated);
    }

    #[test]
    fn auth_model_rejected_path_is_terminal() {
        let model = RegisterFlowChecker;
        let mut state = model.init_states()[0].clone();
        state = model
            .next_state(&state, FlowAction::ReceiveChallenge)
            .unwrap();
        state = model.next_state(&state, FlowAction::SendAuthRetry).unwrap();
        state = model
            .next_state(&state, FlowAction::ReceiveChallenge)
            .unwrap();
        assert_eq!(state.phase, AuthPhase::Rejected);

        // no actions available from the terminal phase
        let mut actions = Vec::new();
        model.actions(&state, &mut actions);
        assert!(actions.is_empty());
    }
}
