use relay_core::text::{strip_mentions, truncate_chars};
use relay_core::HistoryMessage;

/// Role tag of system-initiated summary jobs.
pub const SUPERVISOR_ROLE: &str = "supervizor";

/// Cleaned-up window of channel history, oldest line first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub authors: Vec<String>,
    pub transcript: Vec<String>,
}

impl Snapshot {
    /// Builds a snapshot from history as the platform returns it (newest first).
    pub fn from_history(history: Vec<HistoryMessage>, message_chars: usize) -> Self {
        let mut snapshot = Snapshot::default();
        for msg in history.into_iter().rev() {
            let cleaned = strip_mentions(&msg.content);
            let content = truncate_chars(&cleaned, message_chars);
            if content.trim().is_empty() {
                continue;
            }
            if !snapshot.authors.contains(&msg.author) {
                snapshot.authors.push(msg.author.clone());
            }
            snapshot.transcript.push(format!("{}: {}", msg.author, content));
        }
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    pub fn to_prompt(&self) -> String {
        let people = self.authors.join(", ");
        let mut prompt = String::from(
            "You are reading a group chat as its supervisor. Study the conversation below.\n",
        );
        prompt.push_str(&format!("Participants: {people}\n"));
        prompt.push_str("Transcript:\n");
        for line in &self.transcript {
            prompt.push_str(line);
            prompt.push('\n');
        }
        prompt.push_str(&format!(
            "{SUPERVISOR_ROLE}: Write a long summary of the conversation above: what is it about? \
             Then write a short description of each of these people: {people}. \
             It is crucial to write about each and every one of them. \
             Finally, give your opinion about the conversation and suggest how you could help them.\n"
        ));
        prompt
    }
}
