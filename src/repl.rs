use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::ReplConfig;
use crate::engine::ConversationEngine;
use crate::error::Result;

/// What the loop should do with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Exit,
    Pause,
    Resume,
    /// Dropped: blank, `none`, paused, or not addressed to the assistant.
    Ignore,
    /// Cleaned text to hand to the engine.
    Utterance(String),
}

/// Turn-taking state for the text loop: exit words, pause flag and the
/// wake-word filter.
pub struct Session {
    wake_word: String,
    exit_words: Vec<String>,
    direct_commands: Vec<String>,
    paused: bool,
}

impl Session {
    pub fn new(config: &ReplConfig) -> Self {
        let lower = |words: &[String]| words.iter().map(|w| w.trim().to_lowercase()).collect();
        Self {
            wake_word: config.wake_word.trim().to_lowercase(),
            exit_words: lower(&config.exit_words),
            direct_commands: lower(&config.direct_commands),
            paused: false,
        }
    }

    #[cfg(test)]
    fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn classify(&mut self, line: &str) -> Input {
        let query = line.trim().to_lowercase();
        if query.is_empty() || query == "none" {
            return Input::Ignore;
        }
        if self.exit_words.iter().any(|w| *w == query) {
            return Input::Exit;
        }
        match query.as_str() {
            "pause" => {
                self.paused = true;
                return Input::Pause;
            }
            "resume" => {
                self.paused = false;
                return Input::Resume;
            }
            _ => {}
        }
        if self.paused {
            debug!(query = %query, "paused, ignoring");
            return Input::Ignore;
        }

        let woke = !self.wake_word.is_empty() && query.contains(&self.wake_word);
        let direct = self.direct_commands.iter().any(|c| query.contains(c.as_str()));
        if !woke && !direct {
            info!(query = %query, "ignored");
            return Input::Ignore;
        }

        let cleaned = if self.wake_word.is_empty() {
            query
        } else {
            query.replace(&self.wake_word, "")
        };
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() {
            Input::Ignore
        } else {
            Input::Utterance(cleaned)
        }
    }
}

/// Read utterances line by line until EOF or an exit word, printing each
/// answer.
pub async fn run<R, W>(
    engine: &ConversationEngine,
    session: &mut Session,
    input: R,
    mut output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output
        .write_all(b"JARVIS: Jarvis Online. Ready for command (Text Mode).\n")
        .await?;

    loop {
        output.write_all(b"YOU: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match session.classify(&line) {
            Input::Exit => {
                output.write_all(b"JARVIS: Shutting down.\n").await?;
                break;
            }
            Input::Pause => info!("listening paused"),
            Input::Resume => info!("listening resumed"),
            Input::Ignore => {}
            Input::Utterance(query) => {
                info!(query = %query, "thinking");
                if let Some(answer) = engine.run_conversation(&query).await {
                    if !answer.is_empty() {
                        output.write_all(format!("JARVIS: {answer}\n").as_bytes()).await?;
                    }
                }
            }
        }
    }

    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::engine::EngineSettings;
    use crate::llm::{AssistantReply, ChatBackend, ChatRequest};
    use crate::skills::SkillRegistry;

    fn session() -> Session {
        Session::new(&ReplConfig::default())
    }

    #[test]
    fn blank_and_none_are_ignored() {
        let mut s = session();
        assert_eq!(s.classify(""), Input::Ignore);
        assert_eq!(s.classify("   "), Input::Ignore);
        assert_eq!(s.classify("None"), Input::Ignore);
    }

    #[test]
    fn exit_words_match_whole_line() {
        let mut s = session();
        assert_eq!(s.classify("  QUIT "), Input::Exit);
        assert_eq!(s.classify("stop listening"), Input::Exit);
        assert_ne!(s.classify("stop the music jarvis"), Input::Exit);
    }

    #[test]
    fn wake_word_is_stripped() {
        let mut s = session();
        assert_eq!(
            s.classify("Jarvis tell me a joke"),
            Input::Utterance("tell me a joke".into())
        );
        assert_eq!(s.classify("jarvis"), Input::Ignore);
    }

    #[test]
    fn direct_commands_need_no_wake_word() {
        let mut s = session();
        assert_eq!(
            s.classify("What time is it"),
            Input::Utterance("what time is it".into())
        );
        assert_eq!(s.classify("nice weather today"), Input::Ignore);
    }

    #[test]
    fn pause_blocks_until_resume() {
        let mut s = session();
        assert_eq!(s.classify("pause"), Input::Pause);
        assert!(s.is_paused());
        assert_eq!(s.classify("jarvis what time is it"), Input::Ignore);
        assert_eq!(s.classify("exit"), Input::Exit);
        assert_eq!(s.classify("Resume"), Input::Resume);
        assert!(!s.is_paused());
        assert!(matches!(s.classify("jarvis hello"), Input::Utterance(_)));
    }

    /// Answers every request with the user's own text, or nothing for "quiet".
    struct EchoBackend {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ChatBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &ChatRequest<'_>) -> Result<AssistantReply> {
            let text = request.messages[1].content.clone().unwrap_or_default();
            self.seen.lock().unwrap().push(text.clone());
            if text.contains("quiet") {
                return Ok(AssistantReply::default());
            }
            Ok(AssistantReply::text(format!("you said {text}")))
        }
    }

    #[tokio::test]
    async fn loop_drives_engine_and_stops_on_exit() {
        let backend = Arc::new(EchoBackend {
            seen: Mutex::new(Vec::new()),
        });
        let engine = ConversationEngine::new(
            backend.clone(),
            Arc::new(SkillRegistry::default()),
            EngineSettings::from_config(&crate::config::Config::default()),
        );

        let script = b"jarvis hello there\nrandom chatter\nhow are you quiet\nexit\njarvis never reached\n";
        let mut out = Vec::new();
        run(&engine, &mut session(), &script[..], &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("JARVIS: you said hello there\n"));
        assert!(out.contains("JARVIS: Shutting down."));
        assert!(!out.contains("quiet"));
        assert_eq!(
            *backend.seen.lock().unwrap(),
            vec!["hello there".to_string(), "how are you quiet".to_string()]
        );
    }

    #[tokio::test]
    async fn eof_ends_loop() {
        let backend = Arc::new(EchoBackend {
            seen: Mutex::new(Vec::new()),
        });
        let engine = ConversationEngine::new(
            backend,
            Arc::new(SkillRegistry::default()),
            EngineSettings::from_config(&crate::config::Config::default()),
        );
        let mut out = Vec::new();
        run(&engine, &mut session(), &b""[..], &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("YOU: "));
    }
}
