use serde::{Deserialize, Serialize};
use std::fmt;

/// Question category for a quiz attempt.
///
/// Categories carry stable numeric ids (1–6) used by persisted plans and
/// dedup bookkeeping. Conversion from an id goes through [`Category::from_id`],
/// so an out-of-range id cannot reach the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Read a 4-bit binary value as decimal.
    BinaryToDecimal,
    /// Write a decimal value as 4-bit binary.
    DecimalToBinary,
    /// Evaluate a logic gate over two 4-bit operands.
    GateEvaluation,
    /// Encode a signed decimal into 4-bit two's complement.
    ToTwosComplement,
    /// Decode a 4-bit two's-complement pattern into signed decimal.
    FromTwosComplement,
    /// Negate a small positive magnitude into two's complement.
    NegateTwosComplement,
}

impl Category {
    /// All categories in id order.
    pub const ALL: [Category; 6] = [
        Category::BinaryToDecimal,
        Category::DecimalToBinary,
        Category::GateEvaluation,
        Category::ToTwosComplement,
        Category::FromTwosComplement,
        Category::NegateTwosComplement,
    ];

    /// Returns the stable numeric id of this category.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Category::BinaryToDecimal => 1,
            Category::DecimalToBinary => 2,
            Category::GateEvaluation => 3,
            Category::ToTwosComplement => 4,
            Category::FromTwosComplement => 5,
            Category::NegateTwosComplement => 6,
        }
    }

    /// Looks up a category by its stable id, `None` for anything outside 1–6.
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Category::BinaryToDecimal),
            2 => Some(Category::DecimalToBinary),
            3 => Some(Category::GateEvaluation),
            4 => Some(Category::ToTwosComplement),
            5 => Some(Category::FromTwosComplement),
            6 => Some(Category::NegateTwosComplement),
            _ => None,
        }
    }

    /// Zero-based index into per-category tables.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.id() - 1)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "category {}", self.id())
    }
}
