use serde::{Deserialize, Serialize};

use crate::entities::{chapters, novels, sources};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Novel {
    pub id: String,
    pub title: String,
    pub title_en: String,
    pub author: String,
    pub year_start: i32,
    pub year_end: Option<i32>,
    pub status: String,
    pub description: String,
    pub age_rating: Option<String>,
    pub cover_url: Option<String>,
    pub chapters_count: i32,
    pub created_at: String,
}

impl From<novels::Model> for Novel {
    fn from(model: novels::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            title_en: model.title_en,
            author: model.author,
            year_start: model.year_start,
            year_end: model.year_end,
            status: model.status,
            description: model.description,
            age_rating: model.age_rating,
            cover_url: model.cover_url,
            chapters_count: model.chapters_count,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovelsPage {
    pub novels: Vec<Novel>,
    pub page: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub total_pages: u64,
}

/// Fixed listing orders. The wire name is the only way a client picks one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NovelSort {
    /// Most recent first release year.
    Newest,
    #[default]
    Oldest,
    /// Most chapters.
    Large,
    Small,
    Alphabet,
    /// Most recently added to the catalog.
    Created,
}

impl NovelSort {
    /// Unknown names fall back to the default order.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" => Self::Newest,
            "large" => Self::Large,
            "small" => Self::Small,
            "alphabet" => Self::Alphabet,
            "created" => Self::Created,
            _ => Self::Oldest,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Large => "large",
            Self::Small => "small",
            Self::Alphabet => "alphabet",
            Self::Created => "created",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub logo_url: Option<String>,
}

impl From<sources::Model> for Source {
    fn from(model: sources::Model) -> Self {
        Self {
            name: model.name,
            logo_url: model.logo_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub id: String,
    pub chapter_num: i32,
    pub title: String,
    pub title_en: Option<String>,
}

impl From<chapters::Model> for ChapterSummary {
    fn from(model: chapters::Model) -> Self {
        Self {
            id: model.id,
            chapter_num: model.chapter_num,
            title: model.title,
            title_en: model.title_en,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaptersList {
    pub chapters: Vec<ChapterSummary>,
    pub novel_id: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub novel_id: String,
    pub chapter_num: i32,
    pub title: String,
    pub title_en: Option<String>,
    pub content: String,
    pub source: Option<Source>,
    pub created_at: String,
}

impl Chapter {
    #[must_use]
    pub fn from_model(model: chapters::Model, source: Option<sources::Model>) -> Self {
        Self {
            id: model.id,
            novel_id: model.novel_id,
            chapter_num: model.chapter_num,
            title: model.title,
            title_en: model.title_en,
            content: model.content,
            source: source.map(Source::from),
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapItem {
    pub id: String,
    pub created_at: String,
}

/// Bulk import document accepted by `kappalib import`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogImport {
    #[serde(default)]
    pub sources: Vec<SourceImport>,
    #[serde(default)]
    pub novels: Vec<NovelImport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceImport {
    pub name: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NovelImport {
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub title_en: String,
    pub author: String,
    pub year_start: i32,
    pub year_end: Option<i32>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub description: String,
    pub age_rating: Option<String>,
    pub cover_url: Option<String>,
    #[serde(default)]
    pub chapters: Vec<ChapterImport>,
}

fn default_status() -> String {
    "ongoing".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChapterImport {
    pub id: Option<String>,
    pub chapter_num: i32,
    pub title: String,
    pub title_en: Option<String>,
    pub content: String,
    /// Name of a source listed in the same document or already stored.
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub sources: usize,
    pub novels: usize,
    pub chapters: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parse_known_names() {
        assert_eq!(NovelSort::parse("newest"), NovelSort::Newest);
        assert_eq!(NovelSort::parse("LARGE"), NovelSort::Large);
        assert_eq!(NovelSort::parse(" alphabet "), NovelSort::Alphabet);
        assert_eq!(NovelSort::parse("created"), NovelSort::Created);
    }

    #[test]
    fn test_sort_parse_falls_back_to_oldest() {
        assert_eq!(NovelSort::parse(""), NovelSort::Oldest);
        assert_eq!(NovelSort::parse("title; DROP TABLE novels"), NovelSort::Oldest);
    }

    #[test]
    fn test_sort_serializes_lowercase() {
        let json = serde_json::to_string(&NovelSort::Alphabet).unwrap();
        assert_eq!(json, "\"alphabet\"");
    }
}
