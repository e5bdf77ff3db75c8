//! Turn history and the request handed to a decision engine.

use std::slice;

use retrace_core_types::LiveStateSnapshot;
use trace_compactor::ReferenceTrace;

/// One round of the replay loop: the live state the client reported.
#[derive(Clone, Debug, PartialEq)]
pub struct Turn {
    /// Zero-based position in the session.
    pub index: usize,
    pub snapshot: LiveStateSnapshot,
}

/// Ordered, append-only record of the turns of one session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TurnHistory {
    turns: Vec<Turn>,
}

impl TurnHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot and return the turn it became.
    pub fn push(&mut self, snapshot: LiveStateSnapshot) -> &Turn {
        let index = self.turns.len();
        self.turns.push(Turn { index, snapshot });
        &self.turns[index]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn iter(&self) -> slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

impl<'a> IntoIterator for &'a TurnHistory {
    type Item = &'a Turn;
    type IntoIter = slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

/// Everything a decision engine sees for one turn.
#[derive(Clone, Copy, Debug)]
pub struct DecisionRequest<'a> {
    pub foundation: &'a ReferenceTrace,
    pub history: &'a TurnHistory,
    pub user_prompt: Option<&'a str>,
}

impl<'a> DecisionRequest<'a> {
    pub fn new(foundation: &'a ReferenceTrace, history: &'a TurnHistory) -> Self {
        Self {
            foundation,
            history,
            user_prompt: None,
        }
    }

    pub fn with_user_prompt(mut self, prompt: Option<&'a str>) -> Self {
        self.user_prompt = prompt.map(str::trim).filter(|prompt| !prompt.is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_append_only_and_ordered() {
        let mut history = TurnHistory::new();
        for step in 0..3u8 {
            let snapshot = LiveStateSnapshot::new(format!("{{\"step\":{step}}}"), vec![step]);
            let turn = history.push(snapshot);
            assert_eq!(turn.index, step as usize);
        }
        assert_eq!(history.len(), 3);
        let indices: Vec<usize> = history.iter().map(|turn| turn.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(history.last().map(|turn| turn.snapshot.preview_image.clone()), Some(vec![2]));
    }

    #[test]
    fn blank_user_prompt_is_dropped() {
        let trace = ReferenceTrace::empty();
        let history = TurnHistory::new();
        let request = DecisionRequest::new(&trace, &history).with_user_prompt(Some("   "));
        assert!(request.user_prompt.is_none());
        let request = request.with_user_prompt(Some(" buy socks "));
        assert_eq!(request.user_prompt, Some("buy socks"));
    }
}
