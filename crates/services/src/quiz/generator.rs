use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashSet;

use proctor_core::model::Category;
use proctor_core::nibble::{
    ALL_GATES, Gate, PRIMARY_GATES, format_nibble, from_twos_complement, to_twos_complement,
};

/// Resample attempts granted before a category falls back to its fixed question.
pub const MAX_DRAW_ATTEMPTS: usize = 200;

/// Decimal domain for the conversion categories: 1–14 minus the powers of
/// two, which are considered too easy to bother asking.
const CONVERSION_DOMAIN: [u8; 10] = [3, 5, 6, 7, 9, 10, 11, 12, 13, 14];

/// Signed domain for two's-complement encoding: the full 4-bit range minus 0.
const ENCODE_DOMAIN: [i8; 15] = [-8, -7, -6, -5, -4, -3, -2, -1, 1, 2, 3, 4, 5, 6, 7];

/// One generated question: the prompt shown to the participant, the
/// canonical answer it is graded against, and the dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    prompt: String,
    answer: String,
    key: String,
}

impl Question {
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Per-category sets of dedup keys already emitted in one quiz session.
#[derive(Debug, Clone, Default)]
pub struct UsedKeys {
    sets: [HashSet<String>; 6],
}

impl UsedKeys {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys recorded for a category.
    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        self.sets[category.index()].len()
    }

    #[must_use]
    pub fn contains(&self, category: Category, key: &str) -> bool {
        self.sets[category.index()].contains(key)
    }

    fn record(&mut self, category: Category, key: String) {
        self.sets[category.index()].insert(key);
    }
}

/// Produces the next question for a category, advancing the used-key set.
///
/// Categories other than gate evaluation resample uniformly until they find
/// an unused key, giving up after [`MAX_DRAW_ATTEMPTS`] and emitting the
/// category's fixed fallback instead. The fallback is not recorded, so a
/// later draw may still claim it; exhaustion degrades to occasional repeats
/// rather than a failed quiz.
#[must_use]
pub fn next_question<R: Rng>(category: Category, used: &mut UsedKeys, rng: &mut R) -> Question {
    match category {
        Category::BinaryToDecimal => draw_unique(category, used, rng, binary_to_decimal),
        Category::DecimalToBinary => draw_unique(category, used, rng, decimal_to_binary),
        Category::GateEvaluation => gate_question(used, rng),
        Category::ToTwosComplement => draw_unique(category, used, rng, to_twos_complement_question),
        Category::FromTwosComplement => {
            draw_unique(category, used, rng, from_twos_complement_question)
        }
        Category::NegateTwosComplement => draw_unique(category, used, rng, negate_question),
    }
}

fn draw_unique<R: Rng>(
    category: Category,
    used: &mut UsedKeys,
    rng: &mut R,
    mut draw: impl FnMut(&mut R) -> Question,
) -> Question {
    for _ in 0..MAX_DRAW_ATTEMPTS {
        let candidate = draw(rng);
        if !used.contains(category, candidate.key()) {
            used.record(category, candidate.key.clone());
            return candidate;
        }
    }
    fallback_question(category)
}

fn binary_to_decimal<R: Rng>(rng: &mut R) -> Question {
    let value = *CONVERSION_DOMAIN
        .choose(rng)
        .expect("conversion domain is non-empty");
    let bits = format_nibble(value);
    Question {
        prompt: format!("Convert the binary value {bits} to decimal"),
        answer: value.to_string(),
        key: format!("conv-bin->dec:{bits}"),
    }
}

fn decimal_to_binary<R: Rng>(rng: &mut R) -> Question {
    let value = *CONVERSION_DOMAIN
        .choose(rng)
        .expect("conversion domain is non-empty");
    Question {
        prompt: format!("Convert the decimal value {value} to 4-bit binary"),
        answer: format_nibble(value),
        key: format!("conv-dec->bin:{value}"),
    }
}

fn to_twos_complement_question<R: Rng>(rng: &mut R) -> Question {
    let value = *ENCODE_DOMAIN
        .choose(rng)
        .expect("encode domain is non-empty");
    Question {
        prompt: format!("Convert the decimal value {value} to 4-bit two's complement"),
        answer: format_nibble(to_twos_complement(value)),
        key: format!("to-2sc:{value}"),
    }
}

fn from_twos_complement_question<R: Rng>(rng: &mut R) -> Question {
    let bits: u8 = rng.random_range(0..=15);
    let pattern = format_nibble(bits);
    Question {
        prompt: format!("What decimal value does the two's complement {pattern} represent?"),
        answer: from_twos_complement(bits).to_string(),
        key: format!("from-2sc:{pattern}"),
    }
}

fn negate_question<R: Rng>(rng: &mut R) -> Question {
    let magnitude: i8 = rng.random_range(1..=8);
    Question {
        prompt: format!("What is -{magnitude} in 4-bit two's complement?"),
        answer: format_nibble(to_twos_complement(-magnitude)),
        key: format!("neg-2sc:{magnitude}"),
    }
}

/// Gate questions use a two-phase operator policy: the first four questions
/// of a session walk AND, NAND, OR, NOR in order, then any of the six gates
/// may come up. Operand pairs are always freshly drawn and the composite key
/// is recorded for bookkeeping only, never rejected on.
fn gate_question<R: Rng>(used: &mut UsedKeys, rng: &mut R) -> Question {
    let asked = used.count(Category::GateEvaluation);
    let gate = if asked < PRIMARY_GATES.len() {
        PRIMARY_GATES[asked]
    } else {
        *ALL_GATES.choose(rng).expect("gate table is non-empty")
    };

    let a: u8 = rng.random_range(0..=15);
    let mut b: u8 = rng.random_range(0..=15);
    if b == a {
        b = (b % 14) + 1;
    }

    let (a_bits, b_bits) = (format_nibble(a), format_nibble(b));
    let question = Question {
        prompt: format!("What is {a_bits} {gate} {b_bits}?"),
        answer: format_nibble(gate.apply(a, b)),
        key: format!("gate:{gate}:{a_bits}:{b_bits}"),
    };
    used.record(Category::GateEvaluation, question.key.clone());
    question
}

/// Fixed per-category fallbacks for an exhausted key domain.
fn fallback_question(category: Category) -> Question {
    match category {
        Category::BinaryToDecimal => Question {
            prompt: "Convert the binary value 0101 to decimal".to_string(),
            answer: "5".to_string(),
            key: "conv-bin->dec:0101".to_string(),
        },
        Category::DecimalToBinary => Question {
            prompt: "Convert the decimal value 6 to 4-bit binary".to_string(),
            answer: "0110".to_string(),
            key: "conv-dec->bin:6".to_string(),
        },
        // Gate questions never reject, so they never reach the fallback;
        // keep one anyway so the table is total.
        Category::GateEvaluation => Question {
            prompt: "What is 0011 AND 0101?".to_string(),
            answer: "0001".to_string(),
            key: "gate:AND:0011:0101".to_string(),
        },
        Category::ToTwosComplement => Question {
            prompt: "Convert the decimal value -3 to 4-bit two's complement".to_string(),
            answer: "1101".to_string(),
            key: "to-2sc:-3".to_string(),
        },
        Category::FromTwosComplement => Question {
            prompt: "What decimal value does the two's complement 1011 represent?".to_string(),
            answer: "-5".to_string(),
            key: "from-2sc:1011".to_string(),
        },
        Category::NegateTwosComplement => Question {
            prompt: "What is -4 in 4-bit two's complement?".to_string(),
            answer: "1100".to_string(),
            key: "neg-2sc:4".to_string(),
        },
    }
}
