use rand::Rng;
use rand::seq::SliceRandom;

use proctor_core::model::Category;

/// Number of questions in every quiz.
pub const PLAN_LEN: usize = 25;

/// How many questions of each category one quiz contains.
///
/// The counts are content-design invariants: gate evaluation dominates at 8,
/// the conversions get 4 each, and the two's-complement categories 3 each.
const DISTRIBUTION: [(Category, usize); 6] = [
    (Category::BinaryToDecimal, 4),
    (Category::DecimalToBinary, 4),
    (Category::GateEvaluation, 8),
    (Category::ToTwosComplement, 3),
    (Category::FromTwosComplement, 3),
    (Category::NegateTwosComplement, 3),
];

/// The fixed-distribution, randomly ordered category sequence of one quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizPlan {
    entries: Vec<Category>,
}

impl QuizPlan {
    /// Build a plan: the fixed multiset of categories, uniformly shuffled.
    #[must_use]
    pub fn shuffled(rng: &mut impl Rng) -> Self {
        let mut entries = Vec::with_capacity(PLAN_LEN);
        for (category, count) in DISTRIBUTION {
            entries.extend(std::iter::repeat_n(category, count));
        }
        entries.shuffle(rng);
        Self { entries }
    }

    /// Number of questions in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Category posed at the given 0-based position.
    #[must_use]
    pub fn category_at(&self, index: usize) -> Option<Category> {
        self.entries.get(index).copied()
    }

    #[must_use]
    pub fn entries(&self) -> &[Category] {
        &self.entries
    }
}
