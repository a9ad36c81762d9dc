//! Turn routing

use confab_provider::Message;

/// Where a turn goes after a message has been committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// No turn in progress; the last message is the final reply
    Idle,
    /// The model is due to produce the next assistant message
    ModelTurn,
    /// The last assistant message has invocations waiting to run
    ToolTurn,
}

/// Decide the next state from the last committed message
pub fn next_state(last: &Message) -> TurnState {
    match last {
        Message::Assistant { invocations, .. } if !invocations.is_empty() => TurnState::ToolTurn,
        Message::Assistant { .. } => TurnState::Idle,
        Message::User { .. } | Message::ToolResult { .. } | Message::System { .. } => {
            TurnState::ModelTurn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_provider::Invocation;
    use serde_json::json;

    #[test]
    fn test_routing() {
        let call = Invocation::new("call_1", "p1_search", json!({}));

        assert_eq!(next_state(&Message::user("hi")), TurnState::ModelTurn);
        assert_eq!(next_state(&Message::assistant("done")), TurnState::Idle);
        assert_eq!(
            next_state(&Message::assistant_with_invocations("", vec![call.clone()])),
            TurnState::ToolTurn
        );
        assert_eq!(
            next_state(&Message::tool_result(&call, "ok")),
            TurnState::ModelTurn
        );
        assert_eq!(next_state(&Message::system("s")), TurnState::ModelTurn);
    }

    #[test]
    fn test_assistant_with_empty_invocations_is_final() {
        let msg = Message::assistant_with_invocations("text", Vec::new());
        assert_eq!(next_state(&msg), TurnState::Idle);
    }
}
