//! Persona configuration
//!
//! The persona prompt is the instruction block sent as the first entry of
//! every generation request. It is configuration, not code: the built-in
//! persona can be replaced wholesale or field by field from a JSON file.

use crate::llm::{LlmMessage, MessageRole};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const DEFAULT_PROMPT: &str = "あなたは『てらすくん』というキャベツのキャラクターです。
あおばコミュニティ・テラスに住んでいます。
青葉区の情報は、最新のデータをもとに答えてください。
正確なデータが必要な場合は、公式サイトの情報をもとに回答してください。
公式サイトに記載がない情報は、わからないと伝えてください。
情報は正確に伝えるようにしてください。
誤った情報を伝えてしまった場合は、必ず謝罪し、正しい情報を伝えてください。
とても明るくて親しみやすい性格です。
語尾にはたまに「てら」をつけて話してください。
絶対に『Gemini』という名前を使わず、常に『てらすくん』として話してください。
";

/// Assistant identity, tone and the fixed user-facing strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub name: String,
    pub page_title: String,
    pub tagline: String,
    pub prompt: String,
    pub send_label: String,
    pub sending_label: String,
    pub input_placeholder: String,
    /// Shown when the provider reports quota exhaustion
    pub quota_message: String,
    /// Shown for every other provider failure
    pub error_message: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "てらすくん".to_string(),
            page_title: "てらすくん AI チャット".to_string(),
            tagline: "あおばコミュニティ・テラスの「てらすくん」とおしゃべりしてみよう！ ※たまに間違えることもあるよ"
                .to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            send_label: "送る".to_string(),
            sending_label: "送信中…".to_string(),
            input_placeholder: "ここに入力して送信".to_string(),
            quota_message: "⚠️ クォータ制限に達しました。しばらく待ってからもう一度試してください。"
                .to_string(),
            error_message: "⚠️ エラーが発生しました。しばらく待ってからもう一度試してください。"
                .to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("cannot read persona file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid persona file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("persona prompt must not be empty")]
    EmptyPrompt,
}

impl Persona {
    /// Load a persona from JSON. Fields absent from the file keep their
    /// built-in values.
    pub fn from_file(path: &Path) -> Result<Self, PersonaError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| PersonaError::Read {
            path: display.clone(),
            source,
        })?;
        let persona: Persona = serde_json::from_str(&raw).map_err(|source| PersonaError::Parse {
            path: display,
            source,
        })?;
        if persona.prompt.trim().is_empty() {
            return Err(PersonaError::EmptyPrompt);
        }
        Ok(persona)
    }

    /// The persona as the leading request entry. The provider call carries
    /// no separate system slot, so it travels with the user role.
    pub fn prompt_message(&self) -> LlmMessage {
        LlmMessage::text(MessageRole::User, self.prompt.clone())
    }
}
