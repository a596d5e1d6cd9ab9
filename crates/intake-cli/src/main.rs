mod telemetry;
mod wizard;

use clap::{Parser, Subcommand, ValueEnum};
use intake_form::{
    FormStore, IntakeConfig, StepOutcome, StoreError, SubmissionContext, SubmissionPayload,
    SubmitStatus, WebhookClient,
};
use intake_spec::{
    ErrorMap, FieldSpec, FieldType, FormSpec, ValidationResult, build_step_payload,
    lender_application, render_json_ui, render_text, validate, validate_step, visible_fields,
};
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use wizard::{AnswerParseError, PromptContext, Verbosity, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Lender intake wizard",
    long_about = "Collects an investor loan application step by step, validates it, \
                  and posts it to the intake webhook"
)]
struct Cli {
    /// Log filter (overrides INTAKE_LOG_LEVEL; RUST_LOG still wins).
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Fill out the application interactively, one step at a time.
    Wizard {
        /// Form spec JSON (defaults to the bundled lender application).
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
        /// JSON file with values to prefill.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Webhook to post to (overrides INTAKE_WEBHOOK_URL).
        #[arg(long, value_name = "URL")]
        webhook: Option<String>,
        /// Print the payload instead of posting it.
        #[arg(long)]
        dry_run: bool,
        /// Show step summaries and parse expectations.
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Render output mode for each step.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Validate an answers file against the whole application.
    Validate {
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Show which fields a step displays for the given answers.
    Render {
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Step to render (1-based).
        #[arg(long, default_value_t = 1)]
        step: usize,
        /// Include the step's validation errors.
        #[arg(long)]
        show_errors: bool,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Validate and post an answers file without prompting.
    Submit {
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        #[arg(long, value_name = "URL")]
        webhook: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the JSON Schema of the submission payload.
    Schema,
    /// Print the form spec as JSON.
    Spec {
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let mut config = IntakeConfig::load()?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    telemetry::init(&config.log_level)?;

    match cli.command {
        Command::Wizard {
            spec,
            answers,
            webhook,
            dry_run,
            verbose,
            format,
        } => {
            let config = apply_webhook(config, webhook)?;
            run_wizard(&config, spec, answers, dry_run, verbose, format).await
        }
        Command::Validate { spec, answers } => run_validate(spec, answers),
        Command::Render {
            spec,
            answers,
            step,
            show_errors,
            format,
        } => run_render(spec, answers, step, show_errors, format),
        Command::Submit {
            spec,
            answers,
            webhook,
            dry_run,
        } => {
            let config = apply_webhook(config, webhook)?;
            run_submit(&config, spec, answers, dry_run).await
        }
        Command::Schema => run_schema(),
        Command::Spec { spec } => run_spec(spec),
    }
}

fn apply_webhook(config: IntakeConfig, webhook: Option<String>) -> CliResult<IntakeConfig> {
    match webhook {
        Some(url) => Ok(config.with_webhook_url(url)?),
        None => Ok(config),
    }
}

fn load_spec(path: Option<PathBuf>) -> CliResult<FormSpec> {
    match path {
        Some(path) => Ok(FormSpec::from_json(&fs::read_to_string(path)?)?),
        None => Ok(lender_application()?),
    }
}

fn load_answers(path: &Path) -> CliResult<Map<String, Value>> {
    let contents = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&contents)? {
        Value::Object(map) => Ok(map),
        _ => Err(format!("answers file {} must contain a JSON object", path.display()).into()),
    }
}

async fn run_wizard(
    config: &IntakeConfig,
    spec_path: Option<PathBuf>,
    answers_path: Option<PathBuf>,
    dry_run: bool,
    verbose: bool,
    format: RenderMode,
) -> CliResult<()> {
    let spec = load_spec(spec_path)?;
    let mut store = match answers_path {
        Some(path) => FormStore::with_values(spec, &load_answers(&path)?)?,
        None => FormStore::new(spec),
    };
    let collector = WebhookClient::from_config(config)?;
    let context = SubmissionContext::from_config(config);
    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), format);
    presenter.show_header(store.spec());

    loop {
        let values = store.values();
        let payload = build_step_payload(store.spec(), store.step(), &values, store.errors())
            .ok_or("wizard step is out of range")?;
        presenter.show_step(&payload);

        if fill_step(&mut store, &presenter)? == StepInput::Back {
            store.go_prev();
            continue;
        }

        match store.go_next() {
            StepOutcome::Advanced(step) => {
                debug!(step, "advanced");
                continue;
            }
            StepOutcome::Blocked(errors) => {
                presenter.show_errors(store.spec(), &errors);
                continue;
            }
            StepOutcome::AtLastStep => {}
        }

        if dry_run {
            match store.begin_submission(&context) {
                Ok(payload) => return print_payload(&payload),
                Err(StoreError::Invalid(errors)) => {
                    presenter.show_errors(store.spec(), &errors);
                    rewind_to_errors(&mut store, &errors)?;
                    continue;
                }
                Err(err) => return Err(store_failure(&store, err)),
            }
        }

        loop {
            presenter.show_submitting();
            match store.submit(&collector, &context).await {
                Ok(SubmitStatus::Success) => {
                    presenter.show_success(store.acknowledgement());
                    return Ok(());
                }
                Ok(_) => {
                    presenter.show_failure(store.error_message().unwrap_or_default());
                    if !prompt_bool("Retry submission?", true)? {
                        return Err("application was not submitted".into());
                    }
                }
                Err(StoreError::Invalid(errors)) => {
                    presenter.show_errors(store.spec(), &errors);
                    rewind_to_errors(&mut store, &errors)?;
                    break;
                }
                Err(err) => return Err(store_failure(&store, err)),
            }
        }
    }
}

/// Steps back to the earliest step showing a failing field. Fields that no
/// step shows can only be corrected in the answers file.
fn rewind_to_errors(store: &mut FormStore, errors: &ErrorMap) -> CliResult<()> {
    let mut target = store.step();
    let mut unreachable = Vec::new();
    for field_id in errors.keys() {
        match store.spec().step_of(field_id) {
            Some(step) => target = target.min(step),
            None => unreachable.push(field_id.as_str()),
        }
    }
    if !unreachable.is_empty() {
        return Err(format!(
            "{} cannot be edited in the wizard; correct the answers file",
            unreachable.join(", ")
        )
        .into());
    }

    while store.step() > target {
        store.go_prev();
    }
    Ok(())
}

/// Record conversion failures surface the store's banner, not serde details.
fn store_failure(store: &FormStore, err: StoreError) -> Box<dyn std::error::Error> {
    if matches!(err, StoreError::Record(_))
        && let Some(banner) = store.error_message()
    {
        return banner.into();
    }
    err.into()
}

#[derive(Debug, PartialEq, Eq)]
enum StepInput {
    Done,
    Back,
}

/// Prompts every visible field of the current step, re-resolving visibility
/// after each answer so conditional fields appear as soon as they apply.
fn fill_step(store: &mut FormStore, presenter: &WizardPresenter) -> CliResult<StepInput> {
    let mut index = 0;
    loop {
        let fields: Vec<FieldSpec> = visible_fields(store.spec(), store.step(), &store.values())
            .into_iter()
            .cloned()
            .collect();
        let Some(field) = fields.get(index) else {
            return Ok(StepInput::Done);
        };

        let prompt = PromptContext::new(field, store.value(&field.id), index + 1, fields.len());
        presenter.show_prompt(&prompt);
        let raw = read_line("> ")?;

        match raw.as_str() {
            "<" => return Ok(StepInput::Back),
            cmd if cmd.eq_ignore_ascii_case("exit") => {
                return Err("wizard aborted by user".into());
            }
            "" => {}
            "-" => store.set_field(&field.id, field.initial_value())?,
            _ => match parse_answer(field, &raw) {
                Ok(value) => store.set_field(&field.id, value)?,
                Err(err) => {
                    presenter.show_parse_error(&err);
                    continue;
                }
            },
        }

        match store.blur(&field.id)? {
            Some(message) => presenter.show_field_error(message),
            None => index += 1,
        }
    }
}

fn parse_answer(field: &FieldSpec, raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    match field.kind {
        FieldType::Boolean => parse_boolean(raw),
        FieldType::Choice => parse_choice(field, raw),
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn parse_boolean(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

/// Accepts an option's text (case-insensitive) or its 1-based number.
fn parse_choice(field: &FieldSpec, raw: &str) -> Result<Value, AnswerParseError> {
    let choices = field.choices.as_deref().unwrap_or_default();

    if let Some(choice) = choices.iter().find(|choice| choice.eq_ignore_ascii_case(raw)) {
        return Ok(Value::String(choice.clone()));
    }
    if let Ok(position) = raw.parse::<usize>()
        && let Some(choice) = position.checked_sub(1).and_then(|idx| choices.get(idx))
    {
        return Ok(Value::String(choice.clone()));
    }

    Err(AnswerParseError::new(
        format!("Choose one of: {}.", choices.join(", ")),
        Some(format!("option text or number 1-{}", choices.len())),
    ))
}

async fn run_submit(
    config: &IntakeConfig,
    spec_path: Option<PathBuf>,
    answers_path: PathBuf,
    dry_run: bool,
) -> CliResult<()> {
    let spec = load_spec(spec_path)?;
    let mut store = FormStore::with_values(spec, &load_answers(&answers_path)?)?;

    while !store.is_last_step() {
        if let StepOutcome::Blocked(errors) = store.go_next() {
            print_errors(store.spec(), &errors);
            return Err("validation failed".into());
        }
    }

    let context = SubmissionContext::from_config(config);
    if dry_run {
        return match store.begin_submission(&context) {
            Ok(payload) => print_payload(&payload),
            Err(StoreError::Invalid(errors)) => {
                print_errors(store.spec(), &errors);
                Err("validation failed".into())
            }
            Err(err) => Err(store_failure(&store, err)),
        };
    }

    let collector = WebhookClient::from_config(config)?;
    match store.submit(&collector, &context).await {
        Ok(SubmitStatus::Success) => {
            println!("Application submitted");
            if let Some(id) = store.acknowledgement().and_then(|ack| ack.submission_id) {
                println!("Submission ID: {}", id);
            }
            Ok(())
        }
        Ok(_) => Err(store
            .error_message()
            .unwrap_or("application was not submitted")
            .into()),
        Err(StoreError::Invalid(errors)) => {
            print_errors(store.spec(), &errors);
            Err("validation failed".into())
        }
        Err(err) => Err(store_failure(&store, err)),
    }
}

fn run_validate(spec_path: Option<PathBuf>, answers_path: PathBuf) -> CliResult<()> {
    let spec = load_spec(spec_path)?;
    let answers = Value::Object(load_answers(&answers_path)?);

    let result = validate(&spec, &answers);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&spec, &result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(spec: &FormSpec, result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for (field_id, message) in &result.errors {
            let step = spec
                .step_of(field_id)
                .map(|step| format!("step {}", step))
                .unwrap_or_else(|| "record".to_string());
            println!("  {} ({}) - {}", field_id, step, message);
        }
    }
    if !result.unknown_fields.is_empty() {
        println!("Unknown fields: {}", result.unknown_fields.join(", "));
    }
}

fn run_render(
    spec_path: Option<PathBuf>,
    answers_path: Option<PathBuf>,
    step: usize,
    show_errors: bool,
    format: RenderMode,
) -> CliResult<()> {
    let spec = load_spec(spec_path)?;
    let mut values = spec.initial_values();
    if let Some(path) = answers_path {
        values.extend(load_answers(&path)?);
    }
    let values = Value::Object(values);

    let errors = if show_errors {
        validate_step(&spec, step, &values).errors
    } else {
        ErrorMap::new()
    };
    let payload = build_step_payload(&spec, step, &values, &errors).ok_or_else(|| {
        format!(
            "step {} does not exist (form has {} steps)",
            step,
            spec.total_steps()
        )
    })?;

    match format {
        RenderMode::Text => println!("{}", render_text(&payload)),
        RenderMode::Json => {
            println!("{}", serde_json::to_string_pretty(&render_json_ui(&payload))?)
        }
    }
    Ok(())
}

fn run_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(SubmissionPayload);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_spec(spec_path: Option<PathBuf>) -> CliResult<()> {
    let spec = load_spec(spec_path)?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}

fn print_payload(payload: &SubmissionPayload) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

fn print_errors(spec: &FormSpec, errors: &ErrorMap) {
    eprintln!("Application is incomplete:");
    for (field_id, message) in errors {
        match spec.step_of(field_id) {
            Some(step) => eprintln!("  {} (step {}) - {}", field_id, step, message),
            None => eprintln!("  {} - {}", field_id, message),
        }
    }
}

fn read_line(prompt: &str) -> CliResult<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Err("input closed before the application was finished".into());
    }
    Ok(line.trim().to_string())
}

fn prompt_bool(prompt: &str, default: bool) -> CliResult<bool> {
    let suffix = if default { "[Y/n]" } else { "[y/N]" };
    loop {
        let raw = read_line(&format!("{} {} ", prompt, suffix))?;
        if raw.is_empty() {
            return Ok(default);
        }
        match parse_boolean(&raw) {
            Ok(Value::Bool(flag)) => return Ok(flag),
            _ => println!("Please answer yes or no."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(id: &str) -> FieldSpec {
        lender_application()
            .expect("spec")
            .field(id)
            .cloned()
            .expect("field")
    }

    #[test]
    fn parse_answer_boolean_accepts_yes() {
        let consent = field("consentTransactional");
        assert_eq!(parse_answer(&consent, "yes").unwrap(), Value::Bool(true));
        assert_eq!(parse_answer(&consent, "N").unwrap(), Value::Bool(false));
        assert!(parse_answer(&consent, "maybe").is_err());
    }

    #[test]
    fn parse_choice_accepts_text_or_number() {
        let term = field("loanTerm");
        assert_eq!(parse_answer(&term, "12 MONTHS").unwrap(), json!("12 months"));
        assert_eq!(parse_answer(&term, "1").unwrap(), json!("3 months"));
        assert!(parse_answer(&term, "0").is_err());
        assert!(parse_answer(&term, "99").is_err());
        assert!(parse_answer(&term, "forever").is_err());
    }

    #[test]
    fn text_answers_pass_through_for_later_validation() {
        let price = field("purchasePrice");
        assert_eq!(parse_answer(&price, " 1,234,567 ").unwrap(), json!("1,234,567"));
        assert_eq!(parse_answer(&price, "abc").unwrap(), json!("abc"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
