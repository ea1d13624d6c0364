//! Lifestyle questionnaire: answer buckets, input validation and scoring.
//!
//! Each categorical answer maps to a sub-score in [20, 100] through a fixed
//! table; stress maps to `(11 - stress) * 10`. The lifestyle score is the
//! rounded mean of the five sub-scores. Missing answers score 50.

use crate::types::round_half_up;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sub-score used for any answer that is missing or unrecognised.
pub const DEFAULT_SUB_SCORE: u8 = 50;

pub const MIN_ACTUAL_AGE: u32 = 1;
pub const MAX_ACTUAL_AGE: u32 = 120;
pub const MIN_STRESS: u8 = 1;
pub const MAX_STRESS: u8 = 10;
/// Slider position before the user touches it.
pub const DEFAULT_STRESS: u8 = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurveyError {
    #[error("please enter your age")]
    AgeMissing,
    #[error("age must contain digits only")]
    AgeNotNumeric,
    #[error("age must be between 1 and 120, got {0}")]
    AgeOutOfRange(u64),
    #[error("stress level must be between 1 and 10, got {0}")]
    StressOutOfRange(u8),
}

/// A categorical questionnaire answer with a wire code and a fixed sub-score.
pub trait Bucket: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn code(self) -> &'static str;
    fn label(self) -> &'static str;
    fn sub_score(self) -> u8;

    /// Parse a wire code. Unknown codes are treated as unanswered.
    fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL.iter().copied().find(|b| b.code() == code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepHours {
    UnderFour,
    FourToFive,
    FiveToSix,
    SevenToEight,
    NinePlus,
}

impl Bucket for SleepHours {
    const ALL: &'static [Self] = &[
        Self::UnderFour,
        Self::FourToFive,
        Self::FiveToSix,
        Self::SevenToEight,
        Self::NinePlus,
    ];

    fn code(self) -> &'static str {
        match self {
            Self::UnderFour => "4",
            Self::FourToFive => "5",
            Self::FiveToSix => "6",
            Self::SevenToEight => "7",
            Self::NinePlus => "9",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::UnderFour => "under 4 hours",
            Self::FourToFive => "4-5 hours",
            Self::FiveToSix => "5-6 hours",
            Self::SevenToEight => "7-8 hours",
            Self::NinePlus => "9 hours or more",
        }
    }

    fn sub_score(self) -> u8 {
        match self {
            Self::UnderFour => 20,
            Self::FourToFive => 40,
            Self::FiveToSix => 60,
            Self::SevenToEight => 100,
            Self::NinePlus => 70,
        }
    }
}

/// Exercise sessions per week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseFrequency {
    Rarely,
    OneToTwo,
    ThreeToFour,
    FivePlus,
}

impl Bucket for ExerciseFrequency {
    const ALL: &'static [Self] = &[Self::Rarely, Self::OneToTwo, Self::ThreeToFour, Self::FivePlus];

    fn code(self) -> &'static str {
        match self {
            Self::Rarely => "0",
            Self::OneToTwo => "1",
            Self::ThreeToFour => "3",
            Self::FivePlus => "5",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Rarely => "rarely",
            Self::OneToTwo => "1-2 times a week",
            Self::ThreeToFour => "3-4 times a week",
            Self::FivePlus => "5 or more times a week",
        }
    }

    fn sub_score(self) -> u8 {
        match self {
            Self::Rarely => 20,
            Self::OneToTwo => 50,
            Self::ThreeToFour => 90,
            Self::FivePlus => 100,
        }
    }
}

/// How often processed or late-night food is eaten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DietQuality {
    Daily,
    Often,
    Sometimes,
    Rarely,
}

impl Bucket for DietQuality {
    const ALL: &'static [Self] = &[Self::Daily, Self::Often, Self::Sometimes, Self::Rarely];

    fn code(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Often => "often",
            Self::Sometimes => "sometimes",
            Self::Rarely => "rarely",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Daily => "every day",
            Self::Often => "4-5 times a week",
            Self::Sometimes => "2-3 times a week",
            Self::Rarely => "hardly ever",
        }
    }

    fn sub_score(self) -> u8 {
        match self {
            Self::Daily => 20,
            Self::Often => 40,
            Self::Sometimes => 70,
            Self::Rarely => 100,
        }
    }
}

/// Daily water intake in millilitres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterIntake {
    Under500,
    UpTo1000,
    UpTo1500,
    Over2000,
}

impl Bucket for WaterIntake {
    const ALL: &'static [Self] = &[Self::Under500, Self::UpTo1000, Self::UpTo1500, Self::Over2000];

    fn code(self) -> &'static str {
        match self {
            Self::Under500 => "500",
            Self::UpTo1000 => "1000",
            Self::UpTo1500 => "1500",
            Self::Over2000 => "2000",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Under500 => "under 500ml",
            Self::UpTo1000 => "500ml-1L",
            Self::UpTo1500 => "1L-1.5L",
            Self::Over2000 => "2L or more",
        }
    }

    fn sub_score(self) -> u8 {
        match self {
            Self::Under500 => 20,
            Self::UpTo1000 => 50,
            Self::UpTo1500 => 80,
            Self::Over2000 => 100,
        }
    }
}

/// Parse the free-text age field.
pub fn parse_actual_age(input: &str) -> Result<u32, SurveyError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SurveyError::AgeMissing);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SurveyError::AgeNotNumeric);
    }
    // Digits only, so the only parse failure left is overflow.
    let age: u64 = trimmed.parse().unwrap_or(u64::MAX);
    if !(MIN_ACTUAL_AGE as u64..=MAX_ACTUAL_AGE as u64).contains(&age) {
        return Err(SurveyError::AgeOutOfRange(age));
    }
    Ok(age as u32)
}

/// In-progress questionnaire state, filled one question at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyForm {
    pub sleep: Option<SleepHours>,
    pub exercise: Option<ExerciseFrequency>,
    pub diet: Option<DietQuality>,
    pub water: Option<WaterIntake>,
    pub stress: u8,
    pub age_input: String,
}

impl Default for SurveyForm {
    fn default() -> Self {
        Self {
            sleep: None,
            exercise: None,
            diet: None,
            water: None,
            stress: DEFAULT_STRESS,
            age_input: String::new(),
        }
    }
}

impl SurveyForm {
    /// Validate the form and freeze it into answers.
    pub fn submit(self) -> Result<SurveyAnswers, SurveyError> {
        if !(MIN_STRESS..=MAX_STRESS).contains(&self.stress) {
            return Err(SurveyError::StressOutOfRange(self.stress));
        }
        let actual_age = parse_actual_age(&self.age_input)?;
        Ok(SurveyAnswers {
            sleep: self.sleep,
            exercise: self.exercise,
            diet: self.diet,
            water: self.water,
            stress: Some(self.stress),
            actual_age,
        })
    }
}

/// Validated, immutable questionnaire answers for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyAnswers {
    sleep: Option<SleepHours>,
    exercise: Option<ExerciseFrequency>,
    diet: Option<DietQuality>,
    water: Option<WaterIntake>,
    stress: Option<u8>,
    actual_age: u32,
}

impl SurveyAnswers {
    /// Answers with only the age known; every other field scores the default.
    pub fn with_age(actual_age: u32) -> Result<Self, SurveyError> {
        SurveyForm {
            age_input: actual_age.to_string(),
            ..SurveyForm::default()
        }
        .submit()
        .map(|answers| Self { stress: None, ..answers })
    }

    pub fn actual_age(&self) -> u32 {
        self.actual_age
    }

    pub fn sleep(&self) -> Option<SleepHours> {
        self.sleep
    }

    pub fn exercise(&self) -> Option<ExerciseFrequency> {
        self.exercise
    }

    pub fn diet(&self) -> Option<DietQuality> {
        self.diet
    }

    pub fn water(&self) -> Option<WaterIntake> {
        self.water
    }

    pub fn stress(&self) -> Option<u8> {
        self.stress
    }
}

/// The five sub-scores behind a lifestyle score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifestyleBreakdown {
    pub sleep: u8,
    pub exercise: u8,
    pub diet: u8,
    pub water: u8,
    pub stress: u8,
}

impl LifestyleBreakdown {
    pub fn as_array(&self) -> [u8; 5] {
        [self.sleep, self.exercise, self.diet, self.water, self.stress]
    }
}

fn bucket_score<B: Bucket>(answer: Option<B>) -> u8 {
    answer.map_or(DEFAULT_SUB_SCORE, B::sub_score)
}

fn stress_score(stress: Option<u8>) -> u8 {
    match stress {
        Some(level) if (MIN_STRESS..=MAX_STRESS).contains(&level) => (11 - level) * 10,
        _ => DEFAULT_SUB_SCORE,
    }
}

pub fn lifestyle_breakdown(answers: &SurveyAnswers) -> LifestyleBreakdown {
    LifestyleBreakdown {
        sleep: bucket_score(answers.sleep),
        exercise: bucket_score(answers.exercise),
        diet: bucket_score(answers.diet),
        water: bucket_score(answers.water),
        stress: stress_score(answers.stress),
    }
}

/// Lifestyle score in [0, 100]: rounded mean of the five sub-scores.
pub fn compute_lifestyle_score(answers: &SurveyAnswers) -> u8 {
    let breakdown = lifestyle_breakdown(answers);
    let parts = breakdown.as_array();
    let total: u32 = parts.iter().map(|&s| s as u32).sum();
    let score = round_half_up(total as f64 / parts.len() as f64);

    tracing::debug!(?breakdown, score, "lifestyle score");
    score.clamp(0.0, 100.0) as u8
}
