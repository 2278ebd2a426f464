//! Per-turn answer accumulation.

use super::sse::{self, LineBuffer, StreamEvent};

/// Progress of a turn as seen by the host.
///
/// `text` is the whole answer so far, not the latest fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnUpdate {
    pub text: String,
    pub done: bool,
}

impl TurnUpdate {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    pub fn done(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: true,
        }
    }
}

/// Folds body chunks into a growing answer.
///
/// Finishes either on the `[DONE]` sentinel ([`Turn::feed`]) or on end of
/// body ([`Turn::close`]), whichever comes first; at most one `done` update
/// is ever produced and nothing follows it.
#[derive(Debug, Default)]
pub struct Turn {
    lines: LineBuffer,
    text: String,
    finished: bool,
}

impl Turn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one body chunk. Input after the sentinel is discarded.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<TurnUpdate> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        for line in self.lines.push(chunk) {
            self.process_line(&line, &mut out);
            if self.finished {
                break;
            }
        }
        out
    }

    /// The body ended. Flushes an unterminated last line, then finishes the
    /// turn if the sentinel never arrived.
    ///
    /// Always ends with exactly one `done` update, even for an empty answer.
    pub fn close(&mut self) -> Vec<TurnUpdate> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        if let Some(rest) = self.lines.take_rest() {
            self.process_line(&rest, &mut out);
        }
        if !self.finished {
            self.finished = true;
            out.push(TurnUpdate::done(self.text.clone()));
        }
        out
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn process_line(&mut self, line: &[u8], out: &mut Vec<TurnUpdate>) {
        match sse::decode_line(line) {
            None => {}
            Some(Ok(StreamEvent::Terminator)) => {
                self.finished = true;
                out.push(TurnUpdate::done(self.text.clone()));
            }
            Some(Ok(StreamEvent::Delta(delta))) => {
                if !delta.is_empty() {
                    self.text.push_str(&delta);
                    out.push(TurnUpdate::partial(self.text.clone()));
                }
            }
            Some(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    line = %String::from_utf8_lossy(line),
                    "skipping malformed stream event"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": text}}]})
        )
    }

    fn body() -> String {
        let mut s = String::new();
        s.push_str(": ping\n");
        s.push_str(&delta("Hi"));
        s.push('\n');
        s.push_str(&delta(" there, "));
        s.push_str(&delta("señor 👋"));
        s.push_str("data: [DONE]\n");
        s
    }

    fn run(chunks: &[&[u8]]) -> (Vec<TurnUpdate>, Turn) {
        let mut turn = Turn::new();
        let mut updates = Vec::new();
        for c in chunks {
            updates.extend(turn.feed(c));
        }
        updates.extend(turn.close());
        (updates, turn)
    }

    #[test]
    fn sentinel_scenario() {
        let input = format!("{}{}data: [DONE]\n", delta("Hi"), delta(" there"));
        let (updates, turn) = run(&[input.as_bytes()]);
        assert_eq!(
            updates,
            vec![
                TurnUpdate::partial("Hi"),
                TurnUpdate::partial("Hi there"),
                TurnUpdate::done("Hi there"),
            ]
        );
        assert_eq!(turn.text(), "Hi there");
    }

    #[test]
    fn any_split_yields_same_answer() {
        let whole = body();
        let bytes = whole.as_bytes();
        let (expected, _) = run(&[bytes]);
        assert_eq!(expected.last().unwrap(), &TurnUpdate::done("Hi there, señor 👋"));

        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            let (updates, _) = run(&[a, b]);
            assert_eq!(updates, expected, "split at {split}");
        }

        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        let (updates, _) = run(&singles);
        assert_eq!(updates, expected);

        for size in [2, 3, 5, 7, 13] {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            let (updates, _) = run(&chunks);
            assert_eq!(updates, expected, "chunk size {size}");
        }
    }

    #[test]
    fn nothing_follows_sentinel() {
        let input = format!("{}data: [DONE]\n{}", delta("a"), delta("b"));
        let mut turn = Turn::new();
        let mut updates = turn.feed(input.as_bytes());
        updates.extend(turn.feed(delta("c").as_bytes()));
        updates.extend(turn.close());
        assert_eq!(updates, vec![TurnUpdate::partial("a"), TurnUpdate::done("a")]);
        assert_eq!(updates.iter().filter(|u| u.done).count(), 1);
    }

    #[test]
    fn close_without_sentinel_finishes_once() {
        let input = format!("{}{}", delta("Hi"), delta(" there"));
        let mut turn = Turn::new();
        let mut updates = turn.feed(input.as_bytes());
        updates.extend(turn.close());
        updates.extend(turn.close());
        assert_eq!(
            updates,
            vec![
                TurnUpdate::partial("Hi"),
                TurnUpdate::partial("Hi there"),
                TurnUpdate::done("Hi there"),
            ]
        );
    }

    #[test]
    fn close_flushes_unterminated_last_line() {
        let input = delta("tail");
        let input = input.trim_end_matches('\n');
        let (updates, _) = run(&[input.as_bytes()]);
        assert_eq!(updates, vec![TurnUpdate::partial("tail"), TurnUpdate::done("tail")]);

        let (updates, _) = run(&[delta("x").as_bytes(), b"data: [DONE]".as_slice()]);
        assert_eq!(updates, vec![TurnUpdate::partial("x"), TurnUpdate::done("x")]);
    }

    #[test]
    fn empty_answer_still_closes_with_done() {
        let (updates, turn) = run(&[b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n".as_slice()]);
        assert_eq!(updates, vec![TurnUpdate::done("")]);
        assert!(turn.is_finished());
    }

    #[test]
    fn answer_containing_done_still_finishes() {
        let (updates, _) = run(&[delta("all done").as_bytes()]);
        assert_eq!(updates.last(), Some(&TurnUpdate::done("all done")));
    }

    #[test]
    fn malformed_event_is_skipped() {
        let input = format!("data: {{\"bad json\n{}", delta("hi"));
        let (updates, turn) = run(&[input.as_bytes()]);
        assert_eq!(turn.text(), "hi");
        assert_eq!(updates, vec![TurnUpdate::partial("hi"), TurnUpdate::done("hi")]);
    }
}
