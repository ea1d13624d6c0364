use anyhow::{bail, Context, Result};
use bioage_core::{
    gauge_angle, lifestyle_breakdown, Bucket, CameraSource, FaceAnalysisAdapter, FaceOutcome, LifestyleBreakdown,
    ModelService, ScanController, ScanPhase, ScoringPolicy, SurveyForm, SurveyResult, Wizard,
};
use bioage_hw::Camera;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod backend;
mod config;
mod engine;

use backend::{NoCamera, OnnxModels, V4lCamera};
use config::Config;

#[derive(Parser)]
#[command(name = "bioage", about = "Estimate biological age from a lifestyle survey and a face photo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score the lifestyle questionnaire only
    Survey(SurveyArgs),
    /// Estimate the face score of one photo
    Face {
        /// Photo to analyze
        #[arg(long)]
        image: PathBuf,
        /// Actual age in years
        #[arg(long)]
        age: u32,
    },
    /// Survey, face scan and result dashboard
    Run {
        #[command(flatten)]
        survey: SurveyArgs,
        /// Photo to use when the camera is unavailable
        #[arg(long)]
        image: Option<PathBuf>,
        /// Skip the camera and go straight to the photo
        #[arg(long)]
        no_camera: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List V4L2 capture devices
    Cameras {
        #[arg(long)]
        json: bool,
    },
    /// Print the active scoring policy
    Policy,
}

#[derive(Args)]
struct SurveyArgs {
    /// Hours of sleep: 4, 5, 6, 7 or 9
    #[arg(long)]
    sleep: Option<String>,
    /// Exercise sessions per week: 0, 1, 3 or 5
    #[arg(long)]
    exercise: Option<String>,
    /// Processed or late-night food: daily, often, sometimes or rarely
    #[arg(long)]
    diet: Option<String>,
    /// Water per day in ml: 500, 1000, 1500 or 2000
    #[arg(long)]
    water: Option<String>,
    /// Stress level from 1 (calm) to 10
    #[arg(long, default_value_t = bioage_core::survey::DEFAULT_STRESS)]
    stress: u8,
    /// Actual age in years
    #[arg(long)]
    age: String,
}

impl SurveyArgs {
    fn form(&self) -> SurveyForm {
        SurveyForm {
            sleep: bucket(self.sleep.as_deref(), "sleep"),
            exercise: bucket(self.exercise.as_deref(), "exercise"),
            diet: bucket(self.diet.as_deref(), "diet"),
            water: bucket(self.water.as_deref(), "water"),
            stress: self.stress,
            age_input: self.age.clone(),
        }
    }
}

/// Unknown codes count as unanswered.
fn bucket<B: Bucket>(code: Option<&str>, question: &str) -> Option<B> {
    let code = code?;
    let answer = B::from_code(code);
    if answer.is_none() {
        tracing::warn!(question, code, "unknown answer code, scoring as unanswered");
    }
    answer
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Survey(args) => survey(&args),
        Commands::Face { image, age } => face(&config, &image, age).await,
        Commands::Run { survey, image, no_camera, json } => {
            run(&config, &survey, image.as_deref(), no_camera, json).await
        }
        Commands::Cameras { json } => cameras(json),
        Commands::Policy => policy(&config),
    }
}

fn survey(args: &SurveyArgs) -> Result<()> {
    let answers = args.form().submit().context("invalid survey answers")?;
    let breakdown = lifestyle_breakdown(&answers);
    let score = bioage_core::compute_lifestyle_score(&answers);

    println!("Sleep:     {:>3}  {}", breakdown.sleep, label(answers.sleep()));
    println!("Exercise:  {:>3}  {}", breakdown.exercise, label(answers.exercise()));
    println!("Diet:      {:>3}  {}", breakdown.diet, label(answers.diet()));
    println!("Water:     {:>3}  {}", breakdown.water, label(answers.water()));
    println!("Stress:    {:>3}  level {}", breakdown.stress, args.stress);
    println!("Lifestyle score: {score}/100");
    Ok(())
}

fn label<B: Bucket>(answer: Option<B>) -> &'static str {
    answer.map_or("(not answered)", B::label)
}

async fn face(config: &Config, image_path: &Path, actual_age: u32) -> Result<()> {
    let image = load_image(image_path)?;
    let engine = engine::spawn_engine(config.model_dir.clone())?;
    let mut models = ModelService::new(OnnxModels::new(engine));
    models
        .init()
        .await
        .with_context(|| format!("failed to load models from {}", config.model_dir.display()))?;

    let adapter = FaceAnalysisAdapter::new(config.scan_config().analysis_timeout);
    match adapter.estimate_face_score(&mut models, &image, actual_age).await {
        Some(analysis) => {
            println!("Predicted age: {}", analysis.predicted_age);
            println!("Face score:    {}/100", analysis.face_score);
            println!(
                "Gender:        {:?} ({:.0}%)",
                analysis.gender,
                analysis.gender_probability * 100.0
            );
        }
        None => println!("No face detected"),
    }
    models.dispose();
    Ok(())
}

async fn run(
    config: &Config,
    survey: &SurveyArgs,
    image_path: Option<&Path>,
    no_camera: bool,
    json: bool,
) -> Result<()> {
    let policy = config.load_policy()?;
    let mut wizard = Wizard::new(policy);
    wizard.start_survey()?;
    let answers = wizard.submit_survey(survey.form()).context("invalid survey answers")?.clone();

    let engine = engine::spawn_engine(config.model_dir.clone())?;
    let mut models = ModelService::new(OnnxModels::new(engine.clone()));
    let (session, outcome) = if no_camera {
        scan(&mut models, NoCamera, answers.actual_age(), image_path, config).await?
    } else {
        let camera = V4lCamera::new(engine, config.camera_device.clone(), config.warmup_frames);
        scan(&mut models, camera, answers.actual_age(), image_path, config).await?
    };
    models.dispose();

    let result = wizard.complete_scan(&outcome)?.clone();
    let report = Report {
        session,
        generated_at: Utc::now(),
        policy,
        lifestyle: lifestyle_breakdown(&answers),
        outcome,
        biological_gauge_deg: gauge_angle(result.biological_age),
        actual_gauge_deg: gauge_angle(result.actual_age),
        result,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_dashboard(&report);
    }
    Ok(())
}

/// Drive one scan: camera still first, the photo when the camera is unavailable.
async fn scan<C: CameraSource>(
    models: &mut ModelService<OnnxModels>,
    camera: C,
    actual_age: u32,
    image_path: Option<&Path>,
    config: &Config,
) -> Result<(Uuid, FaceOutcome)> {
    let mut controller = ScanController::new(models, camera, actual_age, &config.scan_config());
    let session = controller.id();

    let mut progress = controller.load_progress();
    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            tracing::info!(progress = *progress.borrow(), "loading face models");
        }
    });

    controller.start().await?;
    watcher.abort();

    if controller.phase() == ScanPhase::CameraReady {
        match controller.capture().await {
            Ok(outcome) => return Ok((session, outcome)),
            Err(err) => tracing::warn!(%session, error = %err, "capture failed"),
        }
    }

    if controller.phase() != ScanPhase::UploadFallback {
        bail!("scan stopped in unexpected phase {:?}", controller.phase());
    }
    let cause = controller
        .fallback_cause()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".into());
    let Some(path) = image_path else {
        controller.back()?;
        bail!("camera scan unavailable ({cause}); pass --image to analyze a photo instead");
    };

    tracing::info!(%session, %cause, image = %path.display(), "using uploaded photo");
    let outcome = controller.submit_upload(load_image(path)?).await?;
    Ok((session, outcome))
}

fn load_image(path: &Path) -> Result<RgbImage> {
    let image = image::open(path).with_context(|| format!("failed to decode image {}", path.display()))?;
    Ok(image.to_rgb8())
}

#[derive(Serialize)]
struct Report {
    session: Uuid,
    generated_at: DateTime<Utc>,
    policy: ScoringPolicy,
    lifestyle: LifestyleBreakdown,
    outcome: FaceOutcome,
    result: SurveyResult,
    biological_gauge_deg: f64,
    actual_gauge_deg: f64,
}

fn print_dashboard(report: &Report) {
    let result = &report.result;
    println!("Biological age: {} (actual {})", result.biological_age, result.actual_age);
    match result.difference {
        0 => println!("You look exactly your age."),
        d if result.is_younger() => println!("{d} years younger than your actual age."),
        d => println!("{} years older than your actual age.", -d),
    }
    println!(
        "Health score:   {}/100 (lifestyle {}, face {}{})",
        result.score,
        result.lifestyle_score,
        result.face_score,
        if result.face_fallback { ", estimated" } else { "" }
    );
    println!(
        "Gauge:          biological {:.0}°, actual {:.0}°",
        report.biological_gauge_deg, report.actual_gauge_deg
    );
    println!();
    println!("Recommendations:");
    for rec in &result.recommendations {
        println!("  [{:?}] {}: {}", rec.priority, rec.title, rec.description);
    }
}

fn cameras(json: bool) -> Result<()> {
    let devices = Camera::list_devices();
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
    }
    for dev in &devices {
        println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
    }
    Ok(())
}

fn policy(config: &Config) -> Result<()> {
    let policy = config.load_policy()?;
    match &config.policy_file {
        Some(path) => println!("# from {}", path.display()),
        None => println!("# built-in default"),
    }
    print!("{}", toml::to_string_pretty(&policy)?);
    Ok(())
}
