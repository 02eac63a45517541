use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pawscan_contracts::consultations::ConsultationCache;
use pawscan_contracts::diagnosis::DiagnosticReport;
use pawscan_contracts::error::FlowError;
use pawscan_contracts::events::EventWriter;
use pawscan_contracts::flow::ErrorCategory;
use pawscan_contracts::images::ImageSource;
use pawscan_contracts::models::{ModelSelector, VISION_CAPABILITY};
use pawscan_contracts::pet::{Dni, Gender, Language, PetProfile};
use pawscan_contracts::records::{HistoryEntry, StoredAnalysis};
use pawscan_engine::images::source_from_path;
use pawscan_engine::{
    default_provider_registry, EngineConfig, FlowOutcome, HistoryLookup, HttpRecordStore,
    Orchestrator, RecordStore, Submission,
};

const DRYRUN_MODEL: &str = "dryrun-vision-1";

#[derive(Debug, Parser)]
#[command(name = "pawscan", version, about = "Pet symptom intake and consultation history")]
struct Cli {
    /// Record store base URL (overrides PAWSCAN_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Directory for the event log and consultation cache (overrides PAWSCAN_HOME).
    #[arg(long, global = true)]
    home: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit photos and a description for analysis.
    Analyze(AnalyzeArgs),
    /// Show one consultation by code and owner DNI.
    History(HistoryArgs),
    /// List every consultation of an owner.
    Histories(OwnerArgs),
    /// Show cached reports without contacting the store.
    Cached(CachedArgs),
    Clinics,
    Specialties(ClinicArgs),
    Medications(ClinicArgs),
    /// List known vision models.
    Models,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    dni: String,
    #[arg(long = "pet-name")]
    pet_name: String,
    #[arg(long)]
    gender: Option<Gender>,
    #[arg(long)]
    weight: String,
    #[arg(long)]
    age: String,
    #[arg(long)]
    description: String,
    /// Image file path or `data:<mime>;base64,...` URI. Repeat for several images.
    #[arg(long = "image", required = true)]
    images: Vec<String>,
    #[arg(long, default_value = "es")]
    language: Language,
    /// Name used to register the owner if the DNI is unknown. Prompts when omitted.
    #[arg(long)]
    owner_name: Option<String>,
    #[arg(long)]
    model: Option<String>,
    /// Use the offline model instead of Gemini.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Parser)]
struct HistoryArgs {
    #[arg(long)]
    code: String,
    #[arg(long)]
    dni: String,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct OwnerArgs {
    #[arg(long)]
    dni: String,
}

#[derive(Debug, Parser)]
struct CachedArgs {
    #[arg(long)]
    code: Option<String>,
}

#[derive(Debug, Parser)]
struct ClinicArgs {
    #[arg(long)]
    clinic: String,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("pawscan error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let mut config = EngineConfig::from_env();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url.trim().trim_end_matches('/').to_string();
    }
    if let Some(home) = cli.home {
        config.home = home;
    }
    match cli.command {
        Command::Analyze(args) => run_analyze(&config, args),
        Command::History(args) => run_history(&config, args),
        Command::Histories(args) => run_histories(&config, args),
        Command::Cached(args) => run_cached(&config, args),
        Command::Clinics => run_clinics(&config),
        Command::Specialties(args) => run_specialties(&config, args),
        Command::Medications(args) => run_medications(&config, args),
        Command::Models => run_models(),
    }
}

fn run_analyze(config: &EngineConfig, args: AnalyzeArgs) -> Result<i32> {
    let requested = if args.dry_run {
        Some(DRYRUN_MODEL.to_string())
    } else {
        args.model.clone().or_else(|| config.model.clone())
    };
    let selection = ModelSelector::default().select(requested.as_deref())?;
    if let Some(notice) = selection.notice() {
        eprintln!("{notice}");
    }
    let providers = default_provider_registry(config);
    let provider = providers.for_selection(&selection)?;

    let images = args
        .images
        .iter()
        .map(|raw| image_source(raw))
        .collect::<Result<Vec<_>>>()?;
    let submission = Submission {
        pet: PetProfile {
            owner_dni: args.dni.clone(),
            animal_name: args.pet_name.clone(),
            gender: args.gender,
            weight: args.weight.clone(),
            age: args.age.clone(),
            language: args.language,
        },
        description: args.description.clone(),
        images,
    };

    let store = HttpRecordStore::new(config);
    let events = EventWriter::new(config.events_path(), uuid::Uuid::new_v4().to_string());
    let mut flow = Orchestrator::new(provider, selection.model.name.clone(), &store, events);

    println!(
        "Analysing {} image(s) with {}...",
        submission.images.len(),
        selection.model.name
    );
    let outcome = flow.submit(submission);
    let mut preset_name = args.owner_name.clone();
    let registration = drive_registration(&mut flow, outcome, |dni| match preset_name.take() {
        Some(name) => Ok(Some(name)),
        None => prompt_owner_name(dni),
    })?;
    let outcome = match registration {
        Registration::Finished(outcome) => outcome,
        Registration::Cancelled => {
            println!("Registration cancelled; nothing was submitted.");
            return Ok(1);
        }
    };

    match outcome {
        Ok(FlowOutcome::Completed {
            consultation,
            report,
        }) => {
            print_report(&report);
            println!();
            println!(
                "Consultation {} saved for owner {}.",
                consultation.code, consultation.owner_dni
            );
            let mut cache = ConsultationCache::new(config.cache_path());
            cache.set(&consultation.code, &report)?;
            Ok(0)
        }
        Ok(FlowOutcome::AwaitingRegistration { .. }) => Ok(1),
        Err(err) => {
            report_flow_error(&err);
            Ok(if err.kind().category() == ErrorCategory::ContextInvalid {
                2
            } else {
                1
            })
        }
    }
}

enum Registration {
    Finished(Result<FlowOutcome, FlowError>),
    Cancelled,
}

/// Feeds names to a flow waiting for registration until it moves on. A
/// short name asks again; `None` from `next_name` cancels the flow.
fn drive_registration(
    flow: &mut Orchestrator<'_>,
    mut outcome: Result<FlowOutcome, FlowError>,
    mut next_name: impl FnMut(&Dni) -> Result<Option<String>>,
) -> Result<Registration> {
    while let Ok(FlowOutcome::AwaitingRegistration { owner_dni }) = &outcome {
        let owner_dni = owner_dni.clone();
        let Some(name) = next_name(&owner_dni)? else {
            flow.cancel()?;
            return Ok(Registration::Cancelled);
        };
        outcome = match flow.register_user(&name) {
            Err(FlowError::NameTooShort) => {
                eprintln!("{}", FlowError::NameTooShort);
                Ok(FlowOutcome::AwaitingRegistration { owner_dni })
            }
            other => other,
        };
    }
    Ok(Registration::Finished(outcome))
}

fn run_history(config: &EngineConfig, args: HistoryArgs) -> Result<i32> {
    let dni = parse_dni(&args.dni)?;
    let store = HttpRecordStore::new(config);
    let entry = HistoryLookup::new(&store).fetch(&args.code, &dni)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&analysis_json(&entry)?)?);
    } else {
        print_entry(&entry);
    }
    if let Some(report) = entry.analysis.report() {
        let mut cache = ConsultationCache::new(config.cache_path());
        cache.set(&entry.record.code, report)?;
    }
    Ok(0)
}

fn run_histories(config: &EngineConfig, args: OwnerArgs) -> Result<i32> {
    let dni = parse_dni(&args.dni)?;
    let store = HttpRecordStore::new(config);
    let entries = HistoryLookup::new(&store).fetch_for_owner(&dni)?;
    if entries.is_empty() {
        println!("No consultations for {dni}.");
        return Ok(0);
    }
    for entry in &entries {
        let condition = match &entry.analysis {
            StoredAnalysis::Current(report) => report.diagnosis.probable_condition.clone(),
            StoredAnalysis::Legacy(raw) => raw
                .get("diagnostico_sugerido")
                .and_then(|value| value.get("enfermedad_probable"))
                .and_then(serde_json::Value::as_str)
                .map(|text| format!("{text} (legacy)"))
                .unwrap_or_else(|| "(legacy record)".to_string()),
        };
        println!(
            "{}  {}  {}  {}",
            entry.record.code, entry.record.created_on, entry.record.animal_name, condition
        );
    }
    Ok(0)
}

fn run_cached(config: &EngineConfig, args: CachedArgs) -> Result<i32> {
    let mut cache = ConsultationCache::new(config.cache_path());
    let Some(code) = args.code else {
        let codes = cache.codes();
        if codes.is_empty() {
            println!("Cache at {} is empty.", cache.path().display());
        }
        for code in codes {
            println!("{code}");
        }
        return Ok(0);
    };
    match cache.get(&code) {
        Some(report) => {
            print_report(&report);
            Ok(0)
        }
        None => {
            eprintln!("No cached report for {code}.");
            Ok(1)
        }
    }
}

fn run_clinics(config: &EngineConfig) -> Result<i32> {
    let clinics = HttpRecordStore::new(config).list_clinics()?;
    for clinic in clinics {
        println!("{}  {}  {}", clinic.id, clinic.name, clinic.address);
    }
    Ok(0)
}

fn run_specialties(config: &EngineConfig, args: ClinicArgs) -> Result<i32> {
    let specialties = HttpRecordStore::new(config).list_specialties(&args.clinic)?;
    for specialty in specialties {
        println!("{}  {}", specialty.id, specialty.specialty);
    }
    Ok(0)
}

fn run_medications(config: &EngineConfig, args: ClinicArgs) -> Result<i32> {
    let medications = HttpRecordStore::new(config).list_medications(&args.clinic)?;
    for medication in medications {
        println!(
            "{}  {}  {:.2}  stock {}  {}",
            medication.id,
            medication.name,
            medication.price,
            medication.stock,
            medication.description
        );
    }
    Ok(0)
}

fn run_models() -> Result<i32> {
    let selector = ModelSelector::default();
    let default = selector.default_model()?;
    for model in selector.registry().by_capability(VISION_CAPABILITY) {
        let marker = if model.name == default.name { "*" } else { " " };
        println!("{marker} {}  ({})", model.name, model.provider);
    }
    Ok(0)
}

fn image_source(raw: &str) -> Result<ImageSource> {
    let trimmed = raw.trim();
    if trimmed.starts_with("data:") {
        return Ok(ImageSource::DataUri(trimmed.to_string()));
    }
    source_from_path(Path::new(trimmed))
}

fn parse_dni(raw: &str) -> Result<Dni> {
    Dni::parse(raw).with_context(|| format!("invalid DNI '{}'", raw.trim()))
}

/// Blank input cancels.
fn prompt_owner_name(dni: &Dni) -> Result<Option<String>> {
    print!("DNI {dni} is not registered. Owner name (blank to cancel): ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let name = line.trim();
    if name.is_empty() {
        return Ok(None);
    }
    Ok(Some(name.to_string()))
}

fn report_flow_error(err: &FlowError) {
    match err.kind().category() {
        ErrorCategory::FormValidation if !err.form_issues().is_empty() => {
            eprintln!("The form is incomplete:");
            for issue in err.form_issues() {
                eprintln!("  - {:?}: {issue}", issue.field());
            }
        }
        ErrorCategory::ContextInvalid => eprintln!("Warning: {err}"),
        ErrorCategory::ModelIntegration => eprintln!("The analysis service misbehaved: {err}"),
        ErrorCategory::StoreIntegrity => eprintln!("Record store integrity failure: {err}"),
        _ => eprintln!("{err}"),
    }
}

fn analysis_json(entry: &HistoryEntry) -> Result<serde_json::Value> {
    Ok(match &entry.analysis {
        StoredAnalysis::Current(report) => serde_json::to_value(report)?,
        StoredAnalysis::Legacy(raw) => serde_json::Value::Object(raw.clone()),
    })
}

fn print_entry(entry: &HistoryEntry) {
    let record = &entry.record;
    let gender = record.gender().map(Gender::label).unwrap_or("unknown");
    println!(
        "Consultation {} ({})\n{} | {} | {} kg | {} years",
        record.code,
        record.created_on,
        record.animal_name,
        gender,
        record.average_weight,
        record.average_age
    );
    println!();
    match &entry.analysis {
        StoredAnalysis::Current(report) => print_report(report),
        StoredAnalysis::Legacy(_) => {
            println!("Stored with an older report format; use --json to see it.")
        }
    }
}

fn print_report(report: &DiagnosticReport) {
    println!("{}", report.visual_summary);
    if !report.findings.is_empty() {
        println!();
        println!("Findings:");
        for finding in &report.findings {
            let image = finding
                .relevant_image_index
                .map(|index| format!(" [image {index}]"))
                .unwrap_or_default();
            println!(
                "  - {} ({:.0}%){image}",
                finding.description, finding.confidence_percent
            );
        }
    }
    println!();
    println!(
        "Probable condition: {} ({:.0}%)",
        report.diagnosis.probable_condition, report.diagnosis.confidence_percent
    );
    println!("Next step: {}", report.diagnosis.recommended_action);
    let recommendations = &report.recommendations;
    println!(
        "Clinic: {} ({})",
        recommendations.recommended_clinic.name, recommendations.recommended_clinic.reason
    );
    println!("Specialty: {}", recommendations.required_specialty);
    for medication in &recommendations.recommended_medications {
        let availability = match (&medication.store_name, medication.price) {
            (Some(store), Some(price)) if medication.available_in_store => {
                format!("available at {store}, {price:.2}")
            }
            _ => "not in stock".to_string(),
        };
        println!(
            "  * {}: {} [{availability}]",
            medication.name, medication.description
        );
    }
    println!();
    println!("{}", report.legal_disclaimer);
}
