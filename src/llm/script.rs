use anyhow::{anyhow, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

use super::{ChatMessage, LLM};
use crate::config::VideoType;
use crate::production::WORDS_PER_MINUTE;

const SHORT_WORDS: u32 = 120;

/// Narration length requested from the model
pub fn target_words(video_type: VideoType, duration_minutes: u32) -> u32 {
    match video_type {
        VideoType::Short => SHORT_WORDS,
        VideoType::Long => duration_minutes * WORDS_PER_MINUTE as u32,
    }
}

pub fn script_prompt(theme: &str, video_type: VideoType, duration_minutes: u32, language: &str) -> String {
    let words = target_words(video_type, duration_minutes);
    let length = match video_type {
        VideoType::Short => "30-60 seconds".to_string(),
        VideoType::Long => format!("{} minutes", duration_minutes),
    };
    let pacing = match video_type {
        VideoType::Short => "Be direct and impactful: one powerful message.",
        VideoType::Long => "Develop the theme in depth, tell stories, use examples.",
    };

    format!(
        "Write a motivational, philosophical narration script about: {theme}\n\n\
         IMPORTANT:\n\
         - You are a wise EXTERNAL OBSERVER speaking in the THIRD PERSON about humanity and life\n\
         - Tone: reflective, inspiring, deep, motivational\n\
         - Use phrases like \"People...\", \"The human being...\", \"Life...\", \"When someone...\"\n\
         - Reflect on overcoming, willpower, courage, purpose, personal growth\n\
         - Make the viewer REFLECT on their own journey, using powerful metaphors\n\
         - {pacing}\n\
         - {length} long, approximately {words} words\n\
         - Continuous text for narration, written in {language}\n\
         - NO formatting, asterisks, bullet points or emojis\n\
         - Open in an engaging way and close with a deep reflection or a call to inner action\n\n\
         Write ONLY the narration script."
    )
}

fn cleanup_patterns() -> &'static [(Regex, &'static str); 3] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (Regex::new(r"\*+").expect("valid regex"), ""),
            (Regex::new(r"#+\s").expect("valid regex"), ""),
            (Regex::new(r"(?m)^-\s").expect("valid regex"), ""),
        ]
    })
}

/// Strip markdown the model adds despite being told not to
pub fn clean_script(text: &str) -> String {
    let mut cleaned = text.to_string();
    for (pattern, replacement) in cleanup_patterns() {
        cleaned = pattern.replace_all(&cleaned, *replacement).into_owned();
    }
    cleaned
        .chars()
        .filter(|c| !matches!(c, '*' | '#' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Generates narration scripts for automatic production
pub struct ScriptWriter {
    llm: Box<dyn LLM>,
}

impl ScriptWriter {
    pub fn new(llm: Box<dyn LLM>) -> Self {
        Self { llm }
    }

    pub async fn write(
        &self,
        theme: &str,
        video_type: VideoType,
        duration_minutes: u32,
        language: &str,
    ) -> Result<String> {
        info!("✍️ Generating {} script about: {}", video_type, theme);

        let prompt = script_prompt(theme, video_type, duration_minutes, language);
        debug!("Requesting script from {}", self.llm.name());
        let response = self.llm.chat(vec![ChatMessage::user(prompt)]).await?;
        if let Some(tokens) = response.tokens_used {
            debug!("Script generation used {} tokens", tokens);
        }

        let script = clean_script(&response.content);
        if script.is_empty() {
            return Err(anyhow!("{} returned an empty script", self.llm.name()));
        }

        info!("📝 Script generated ({} characters)", script.chars().count());
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMResponse;
    use async_trait::async_trait;

    struct CannedLLM(&'static str);

    #[async_trait]
    impl LLM for CannedLLM {
        async fn chat(&self, _messages: Vec<ChatMessage>) -> Result<LLMResponse> {
            Ok(LLMResponse {
                content: self.0.to_string(),
                tokens_used: None,
            })
        }

        fn name(&self) -> &'static str {
            "canned"
        }
    }

    #[test]
    fn test_clean_script() {
        let raw = "## Title\n**Bold** start\n- item one\nsnake_case # end";
        assert_eq!(clean_script(raw), "Title\nBold start\nitem one\nsnakecase end");
    }

    #[test]
    fn test_target_words() {
        assert_eq!(target_words(VideoType::Short, 10), 120);
        assert_eq!(target_words(VideoType::Long, 10), 1500);
    }

    #[test]
    fn test_prompt_mentions_length_and_language() {
        let prompt = script_prompt("courage", VideoType::Long, 8, "English");
        assert!(prompt.contains("courage"));
        assert!(prompt.contains("8 minutes"));
        assert!(prompt.contains("1200 words"));
        assert!(prompt.contains("written in English"));
    }

    #[tokio::test]
    async fn test_writer_cleans_and_rejects_empty() {
        let writer = ScriptWriter::new(Box::new(CannedLLM("**Life** goes on")));
        let script = writer.write("life", VideoType::Short, 1, "English").await.unwrap();
        assert_eq!(script, "Life goes on");

        let writer = ScriptWriter::new(Box::new(CannedLLM("***")));
        assert!(writer.write("life", VideoType::Short, 1, "English").await.is_err());
    }
}
