pub mod generator;
pub mod results;
pub mod session;

/// Exam difficulty, chosen once per quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Difficulty {
    Basic,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Basic,
        Difficulty::Intermediate,
        Difficulty::Advanced,
    ];

    /// User-facing label, also used verbatim in the generation prompt.
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Basic => "Básico",
            Difficulty::Intermediate => "Intermedio",
            Difficulty::Advanced => "Avanzado",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.label() == label)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    /// 3 or 4 answer options; the order is significant, the index is the key.
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
    pub topic: Option<String>,
}

impl Question {
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }
}
