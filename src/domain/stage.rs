//! Pipeline stages and publishing platforms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::document::DocumentType;

/// One of the four fixed pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Research gathering (topic -> ResearchBrief)
    Collector,

    /// Depth-learning synthesis (ResearchBrief -> KnowledgeSynthesis)
    Scholar,

    /// Narrative drafting (KnowledgeSynthesis -> ContentDraft)
    Creator,

    /// Platform formatting (ContentDraft -> PlatformAdaptation[])
    Adapter,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 4] = [
        Stage::Collector,
        Stage::Scholar,
        Stage::Creator,
        Stage::Adapter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Collector => "collector",
            Stage::Scholar => "scholar",
            Stage::Creator => "creator",
            Stage::Adapter => "adapter",
        }
    }

    /// Progress percentage reported once this stage starts
    pub fn progress(&self) -> u8 {
        match self {
            Stage::Collector => 25,
            Stage::Scholar => 50,
            Stage::Creator => 75,
            Stage::Adapter => 90,
        }
    }

    /// Document type this stage consumes (`None` for the topic seed)
    pub fn input_type(&self) -> Option<DocumentType> {
        match self {
            Stage::Collector => None,
            Stage::Scholar => Some(DocumentType::ResearchBrief),
            Stage::Creator => Some(DocumentType::KnowledgeSynthesis),
            Stage::Adapter => Some(DocumentType::ContentDraft),
        }
    }

    /// Document type this stage produces
    pub fn output_type(&self) -> DocumentType {
        match self {
            Stage::Collector => DocumentType::ResearchBrief,
            Stage::Scholar => DocumentType::KnowledgeSynthesis,
            Stage::Creator => DocumentType::ContentDraft,
            Stage::Adapter => DocumentType::PlatformAdaptation,
        }
    }

    /// Checkpoint name recorded after this stage completes
    pub fn checkpoint_name(&self) -> String {
        format!("after_{}", self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "collector" => Ok(Stage::Collector),
            "scholar" => Ok(Stage::Scholar),
            "creator" => Ok(Stage::Creator),
            "adapter" => Ok(Stage::Adapter),
            _ => anyhow::bail!("Unknown stage: {}", s),
        }
    }
}

/// Target publishing platform for an adaptation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Twitter,
    #[serde(rename = "linkedin")]
    LinkedIn,
    #[serde(rename = "wechat")]
    WeChat,
    Xiaohongshu,
    Medium,
    Substack,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Twitter,
        Platform::LinkedIn,
        Platform::WeChat,
        Platform::Xiaohongshu,
        Platform::Medium,
        Platform::Substack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::LinkedIn => "linkedin",
            Platform::WeChat => "wechat",
            Platform::Xiaohongshu => "xiaohongshu",
            Platform::Medium => "medium",
            Platform::Substack => "substack",
        }
    }

    /// Hard character limit; exceeding it fails validation
    pub fn character_limit(&self) -> usize {
        match self {
            Platform::Twitter => 280,
            Platform::LinkedIn => 3000,
            Platform::WeChat => 20000,
            Platform::Xiaohongshu => 1000,
            Platform::Medium | Platform::Substack => 100_000,
        }
    }

    /// Recommended hashtag ceiling; exceeding it is only a warning
    pub fn recommended_hashtags(&self) -> usize {
        match self {
            Platform::Twitter => 3,
            Platform::LinkedIn => 5,
            Platform::WeChat => 3,
            Platform::Xiaohongshu => 10,
            Platform::Medium => 5,
            Platform::Substack => 3,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Ok(Platform::Twitter),
            "linkedin" => Ok(Platform::LinkedIn),
            "wechat" => Ok(Platform::WeChat),
            "xiaohongshu" | "xhs" => Ok(Platform::Xiaohongshu),
            "medium" => Ok(Platform::Medium),
            "substack" => Ok(Platform::Substack),
            _ => anyhow::bail!("Unknown platform: {}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_limits() {
        assert_eq!(Platform::Twitter.character_limit(), 280);
        assert_eq!(Platform::LinkedIn.character_limit(), 3000);
        assert_eq!(Platform::WeChat.character_limit(), 20000);
        assert_eq!(Platform::Xiaohongshu.character_limit(), 1000);
        assert_eq!(Platform::Medium.character_limit(), 100_000);
        assert_eq!(Platform::Substack.character_limit(), 100_000);
    }

    #[test]
    fn test_stage_chain_types_line_up() {
        for pair in Stage::ALL.windows(2) {
            assert_eq!(Some(pair[0].output_type()), pair[1].input_type());
        }
    }

    #[test]
    fn test_stage_parsing() {
        assert_eq!("Scholar".parse::<Stage>().unwrap(), Stage::Scholar);
        assert!("editor".parse::<Stage>().is_err());
        assert_eq!(Stage::Creator.checkpoint_name(), "after_creator");
    }

    #[test]
    fn test_platform_serde_names() {
        let json = serde_json::to_string(&Platform::LinkedIn).unwrap();
        assert_eq!(json, "\"linkedin\"");
        let parsed: Platform = serde_json::from_str("\"wechat\"").unwrap();
        assert_eq!(parsed, Platform::WeChat);
    }
}
