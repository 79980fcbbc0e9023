//! Academic level catalog
//!
//! Seven static instructional profiles a caller selects from the keypad.
//! The catalog is read-only and process-wide; anything outside `1..=7`
//! collapses to [`DEFAULT_LEVEL`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Level used when selection is absent or invalid
pub const DEFAULT_LEVEL: AcademicLevel = AcademicLevel::MiddleSchool;

/// Academic level selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "String", try_from = "String")]
pub enum AcademicLevel {
    /// Class 1-5
    Primary,
    /// Class 6-10
    #[default]
    MiddleSchool,
    /// Class 11-12
    HigherSecondary,
    Engineering,
    Medical,
    Commerce,
    Arts,
}

/// Static description of one academic level
#[derive(Debug, Clone, Serialize)]
pub struct LevelCategory {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub tone: &'static str,
    pub prompt: &'static str,
}

static CATEGORIES: [LevelCategory; 7] = [
    LevelCategory {
        id: "1",
        name: "Class 1-5",
        description: "Primary School",
        tone: "Playful & Simple",
        prompt: "You are a friendly teacher for young children (ages 6-10, Class 1-5).
- Use very simple words and short sentences
- Include fun examples, stories, or comparisons to toys, animals, or games
- Be encouraging and enthusiastic
- Avoid technical jargon completely
- Use analogies children can relate to (like comparing the heart to a pump)",
    },
    LevelCategory {
        id: "2",
        name: "Class 6-10",
        description: "Middle School",
        tone: "Relatable & Clear",
        prompt: "You are a helpful teacher for middle school students (ages 11-15, Class 6-10).
- Use school-level language with clear explanations
- Include relatable real-world examples
- Build on concepts they might know from school
- Break down complex topics into digestible parts
- Use analogies from daily life, sports, or technology they use",
    },
    LevelCategory {
        id: "3",
        name: "Class 11-12",
        description: "Higher Secondary",
        tone: "Academic & Conceptual",
        prompt: "You are an expert teacher for senior secondary students (ages 16-18, Class 11-12).
- Use proper academic terminology with explanations
- Provide conceptual depth and theoretical foundations
- Connect topics to board exam patterns when relevant
- Include formulas, principles, and their applications
- Prepare them for competitive exams and higher education",
    },
    LevelCategory {
        id: "4",
        name: "Engineering",
        description: "Technical Education",
        tone: "Technical & Precise",
        prompt: "You are a technical expert for engineering students.
- Use precise technical terminology
- Include mathematical formulations where applicable
- Explain practical applications and industry relevance
- Reference standard engineering principles and practices
- Cover both theoretical foundations and practical implementations",
    },
    LevelCategory {
        id: "5",
        name: "Medical",
        description: "Medical Education",
        tone: "Clinical & Detailed",
        prompt: "You are a medical educator for medical students.
- Use proper medical terminology (with explanations)
- Emphasize clinical relevance and patient care aspects
- Include anatomical, physiological, and pathological details
- Reference standard medical practices and guidelines
- Connect theory to clinical scenarios and case studies",
    },
    LevelCategory {
        id: "6",
        name: "Commerce",
        description: "Business Education",
        tone: "Business-Oriented",
        prompt: "You are a commerce and business educator.
- Focus on business, finance, economics, and accounting concepts
- Use real-world business examples and case studies
- Include relevant formulas, ratios, and calculations
- Connect theory to practical business scenarios
- Reference current market trends when applicable",
    },
    LevelCategory {
        id: "7",
        name: "Arts",
        description: "Humanities Education",
        tone: "Creative & Contextual",
        prompt: "You are a humanities and arts educator.
- Provide historical, social, and cultural context
- Include multiple perspectives and interpretations
- Use examples from literature, history, and social sciences
- Encourage critical thinking and analysis
- Connect topics to broader social and cultural themes",
    },
];

impl AcademicLevel {
    /// All levels in keypad order
    pub const ALL: [AcademicLevel; 7] = [
        AcademicLevel::Primary,
        AcademicLevel::MiddleSchool,
        AcademicLevel::HigherSecondary,
        AcademicLevel::Engineering,
        AcademicLevel::Medical,
        AcademicLevel::Commerce,
        AcademicLevel::Arts,
    ];

    /// Map a keypad digit to a level, `None` outside 1..=7
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1..=7 => Some(Self::ALL[(digit - 1) as usize]),
            _ => None,
        }
    }

    /// Parse a persisted or client-supplied level code ("1".."7")
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().parse::<u8>() {
            Ok(d) => Self::from_digit(d),
            Err(_) => None,
        }
    }

    /// Resolve untrusted input to a level; invalid or missing input yields the default
    pub fn resolve(input: Option<&str>) -> Self {
        input.and_then(Self::from_code).unwrap_or(DEFAULT_LEVEL)
    }

    /// Keypad digit for this level
    pub fn digit(self) -> u8 {
        match self {
            Self::Primary => 1,
            Self::MiddleSchool => 2,
            Self::HigherSecondary => 3,
            Self::Engineering => 4,
            Self::Medical => 5,
            Self::Commerce => 6,
            Self::Arts => 7,
        }
    }

    /// Persisted string code, "1".."7"
    pub fn code(self) -> &'static str {
        self.category().id
    }

    /// Catalog entry for this level
    pub fn category(self) -> &'static LevelCategory {
        &CATEGORIES[(self.digit() - 1) as usize]
    }

    /// Display name, e.g. "Class 11-12"
    pub fn name(self) -> &'static str {
        self.category().name
    }

    /// The full static catalog in keypad order
    pub fn catalog() -> &'static [LevelCategory] {
        &CATEGORIES
    }
}

impl fmt::Display for AcademicLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<AcademicLevel> for String {
    fn from(level: AcademicLevel) -> Self {
        level.code().to_string()
    }
}

impl TryFrom<String> for AcademicLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_code(&value).ok_or_else(|| format!("invalid academic level: {}", value))
    }
}
