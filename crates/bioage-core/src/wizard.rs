//! Linear wizard: hero → survey → face scan → result.

use crate::result::{compute_from_outcome, ScoringPolicy};
use crate::survey::{compute_lifestyle_score, SurveyAnswers, SurveyError, SurveyForm};
use crate::types::{FaceOutcome, SurveyResult};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Hero,
    Survey,
    FaceScan,
    Result,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("cannot {action} on the {step:?} step")]
    InvalidStep { step: WizardStep, action: &'static str },
    #[error(transparent)]
    Survey(#[from] SurveyError),
}

/// Session state for one pass through the wizard.
#[derive(Debug, Clone)]
pub struct Wizard {
    step: WizardStep,
    policy: ScoringPolicy,
    answers: Option<SurveyAnswers>,
    result: Option<SurveyResult>,
}

impl Wizard {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self {
            step: WizardStep::Hero,
            policy,
            answers: None,
            result: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn answers(&self) -> Option<&SurveyAnswers> {
        self.answers.as_ref()
    }

    pub fn result(&self) -> Option<&SurveyResult> {
        self.result.as_ref()
    }

    pub fn start_survey(&mut self) -> Result<(), WizardError> {
        self.expect(WizardStep::Hero, "start the survey")?;
        self.step = WizardStep::Survey;
        Ok(())
    }

    /// Validate the questionnaire and move on to the face scan.
    /// Invalid input keeps the wizard on the survey step.
    pub fn submit_survey(&mut self, form: SurveyForm) -> Result<&SurveyAnswers, WizardError> {
        self.expect(WizardStep::Survey, "submit the survey")?;
        let answers = form.submit()?;
        tracing::debug!(actual_age = answers.actual_age(), "survey submitted");
        self.step = WizardStep::FaceScan;
        Ok(self.answers.insert(answers))
    }

    /// Combine the survey with the scan outcome and show the result.
    pub fn complete_scan(&mut self, outcome: &FaceOutcome) -> Result<&SurveyResult, WizardError> {
        self.expect(WizardStep::FaceScan, "complete the scan")?;
        let answers = self.answers.as_ref().ok_or(WizardError::InvalidStep {
            step: self.step,
            action: "complete the scan without answers",
        })?;

        let lifestyle = compute_lifestyle_score(answers);
        let result = compute_from_outcome(lifestyle, outcome, answers.actual_age(), &self.policy);
        tracing::info!(
            score = result.score,
            biological_age = result.biological_age,
            fallback = result.face_fallback,
            "result ready"
        );
        self.step = WizardStep::Result;
        Ok(self.result.insert(result))
    }

    /// Step back one screen. Answers are kept until restart.
    pub fn back(&mut self) -> Result<(), WizardError> {
        self.step = match self.step {
            WizardStep::Survey => WizardStep::Hero,
            WizardStep::FaceScan => WizardStep::Survey,
            step => return Err(WizardError::InvalidStep { step, action: "go back" }),
        };
        Ok(())
    }

    /// Return to the hero screen and discard the session.
    pub fn restart(&mut self) {
        self.step = WizardStep::Hero;
        self.answers = None;
        self.result = None;
    }

    fn expect(&self, step: WizardStep, action: &'static str) -> Result<(), WizardError> {
        if self.step == step {
            Ok(())
        } else {
            Err(WizardError::InvalidStep { step: self.step, action })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::{Bucket, DietQuality, ExerciseFrequency, SleepHours, WaterIntake};
    use crate::types::{FaceAnalysisResult, Gender, NoFaceReason};

    fn form(age: &str) -> SurveyForm {
        SurveyForm {
            sleep: SleepHours::from_code("7"),
            exercise: ExerciseFrequency::from_code("3"),
            diet: DietQuality::from_code("sometimes"),
            water: WaterIntake::from_code("1500"),
            stress: 3,
            age_input: age.into(),
        }
    }

    #[test]
    fn test_full_pass() {
        let mut wizard = Wizard::new(ScoringPolicy::DEFAULT);
        wizard.start_survey().unwrap();
        wizard.submit_survey(form("35")).unwrap();
        assert_eq!(wizard.step(), WizardStep::FaceScan);

        // 100 + 90 + 70 + 80 + 80 = 420 / 5 = 84
        let outcome = FaceOutcome::Analyzed(FaceAnalysisResult {
            predicted_age: 30,
            gender: Gender::Female,
            gender_probability: 0.9,
            face_score: 90,
        });
        let result = wizard.complete_scan(&outcome).unwrap().clone();
        assert_eq!(result.lifestyle_score, 84);
        // 0.3*84 + 0.7*90 = 88.2
        assert_eq!(result.score, 88);
        // round(30 - 34/50*3) = round(27.96) = 28
        assert_eq!(result.biological_age, 28);
        assert_eq!(result.difference, 7);
        assert_eq!(wizard.step(), WizardStep::Result);
    }

    #[test]
    fn test_invalid_age_stays_on_survey() {
        let mut wizard = Wizard::new(ScoringPolicy::DEFAULT);
        wizard.start_survey().unwrap();
        let err = wizard.submit_survey(form("abc")).unwrap_err();
        assert_eq!(err, WizardError::Survey(SurveyError::AgeNotNumeric));
        assert_eq!(wizard.step(), WizardStep::Survey);
        assert!(wizard.answers().is_none());
    }

    #[test]
    fn test_back_navigation() {
        let mut wizard = Wizard::new(ScoringPolicy::DEFAULT);
        assert!(wizard.back().is_err());
        wizard.start_survey().unwrap();
        wizard.submit_survey(form("50")).unwrap();
        wizard.back().unwrap();
        assert_eq!(wizard.step(), WizardStep::Survey);
        wizard.back().unwrap();
        assert_eq!(wizard.step(), WizardStep::Hero);
    }

    #[test]
    fn test_restart_discards_session() {
        let mut wizard = Wizard::new(ScoringPolicy::DEFAULT);
        wizard.start_survey().unwrap();
        wizard.submit_survey(form("50")).unwrap();
        wizard
            .complete_scan(&FaceOutcome::Fallback { reason: NoFaceReason::NoFaceDetected })
            .unwrap();
        assert!(wizard.result().unwrap().face_fallback);

        wizard.restart();
        assert_eq!(wizard.step(), WizardStep::Hero);
        assert!(wizard.answers().is_none());
        assert!(wizard.result().is_none());
    }

    #[test]
    fn test_scan_before_survey_rejected() {
        let mut wizard = Wizard::new(ScoringPolicy::DEFAULT);
        let outcome = FaceOutcome::Fallback { reason: NoFaceReason::ModelsUnavailable };
        assert!(matches!(
            wizard.complete_scan(&outcome),
            Err(WizardError::InvalidStep { step: WizardStep::Hero, .. })
        ));
    }
}
