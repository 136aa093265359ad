use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language the model is asked to write the solution in.
///
/// Python is the default and the only language with special treatment in
/// the prompt history of the product; the others are declared so that the
/// prompt and the sandbox runtime table can name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    #[default]
    Python,
    Cpp,
    JavaScript,
    Java,
}

impl TargetLanguage {
    pub const ALL: [Self; 4] = [Self::Python, Self::Cpp, Self::JavaScript, Self::Java];

    /// Name used when asking the model for code.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::Cpp => "C++",
            Self::JavaScript => "JavaScript",
            Self::Java => "Java",
        }
    }

    /// Tags a model may put after an opening code fence for this language.
    pub const fn fence_tags(self) -> &'static [&'static str] {
        match self {
            Self::Python => &["python", "python3", "py"],
            Self::Cpp => &["cpp", "c++", "cxx", "cc"],
            Self::JavaScript => &["javascript", "js", "node"],
            Self::Java => &["java"],
        }
    }

    /// Whether `tag` (compared case-insensitively) names any declared language.
    pub fn is_fence_tag(tag: &str) -> bool {
        let tag = tag.to_ascii_lowercase();
        Self::ALL
            .iter()
            .any(|lang| lang.fence_tags().contains(&tag.as_str()))
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for TargetLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| {
                lang.display_name().eq_ignore_ascii_case(&lower)
                    || lang.fence_tags().contains(&lower.as_str())
            })
            .ok_or_else(|| format!("unknown language: {s}"))
    }
}
