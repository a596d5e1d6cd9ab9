use intake_form::Acknowledgement;
use intake_spec::{
    ErrorMap, FieldSpec, FieldType, FormSpec, StepPayload, render_json_ui, render_text,
    value_to_display,
};
use serde_json::Value;

use crate::RenderMode;

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: step summaries, parse expectations, payloads.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints step screens, prompts, and submission results.
pub struct WizardPresenter {
    verbosity: Verbosity,
    format: RenderMode,
    header_printed: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, format: RenderMode) -> Self {
        Self {
            verbosity,
            format,
            header_printed: false,
        }
    }

    pub fn show_header(&mut self, spec: &FormSpec) {
        if self.header_printed {
            return;
        }
        println!("{}", spec.title);
        if let Some(description) = &spec.description {
            println!("{}", description);
        }
        println!("Enter '<' to go back a step, '-' to clear a field, 'exit' to quit.");
        self.header_printed = true;
    }

    pub fn show_step(&self, payload: &StepPayload) {
        println!();
        match self.format {
            RenderMode::Text => {
                if self.verbosity.is_verbose() {
                    println!("{}", render_text(payload));
                } else {
                    println!(
                        "Step {} of {}: {}",
                        payload.progress.step, payload.progress.total, payload.step_title
                    );
                }
            }
            RenderMode::Json => println!("{}", render_json_ui(payload)),
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = format!("{}/{} {}", prompt.index, prompt.total, prompt.title);
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        if let Some(current) = &prompt.current {
            line.push_str(&format!(" [{}]", current));
        }
        println!("{}", line);
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
        if self.verbosity.is_verbose()
            && let Some(placeholder) = &prompt.placeholder
        {
            println!("e.g. {}", placeholder);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_field_error(&self, message: &str) {
        eprintln!("  ! {}", message);
    }

    pub fn show_errors(&self, spec: &FormSpec, errors: &ErrorMap) {
        eprintln!("Please fix the following:");
        for (field_id, message) in errors {
            let title = spec
                .field(field_id)
                .map(|field| field.title.as_str())
                .unwrap_or(field_id);
            match spec.step_of(field_id) {
                Some(step) => eprintln!("  - {} (step {}): {}", title, step, message),
                None => eprintln!("  - {}: {}", title, message),
            }
        }
    }

    pub fn show_submitting(&self) {
        println!("Submitting application...");
    }

    pub fn show_failure(&self, message: &str) {
        eprintln!("Submission failed: {}", message);
    }

    pub fn show_success(&self, acknowledgement: Option<&Acknowledgement>) {
        println!("Application submitted ✅");
        println!("Thank you for your application.");
        println!("Our team will review it and contact you within 24-48 hours.");
        if let Some(ack) = acknowledgement {
            if let Some(id) = ack.submission_id {
                println!("Submission ID: {}", id);
            }
            if self.verbosity.is_verbose()
                && let Some(message) = &ack.message
            {
                println!("Collector: {}", message);
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub current: Option<String>,
}

impl PromptContext {
    pub fn new(field: &FieldSpec, current: Option<&Value>, index: usize, total: usize) -> Self {
        Self {
            index,
            total,
            title: field.title.clone(),
            description: field.description.clone(),
            placeholder: field.placeholder.clone(),
            required: field.required,
            hint: hint(field),
            current: current.and_then(value_to_display),
        }
    }
}

fn hint(field: &FieldSpec) -> Option<String> {
    match field.kind {
        FieldType::Boolean => Some("(yes/no)".to_string()),
        FieldType::Money => Some("(amount, commas allowed)".to_string()),
        FieldType::Date => Some("(YYYY-MM-DD)".to_string()),
        FieldType::Choice => field.choices.as_ref().map(|choices| {
            let numbered = choices
                .iter()
                .enumerate()
                .map(|(idx, choice)| format!("{}={}", idx + 1, choice))
                .collect::<Vec<_>>();
            format!("({})", numbered.join(", "))
        }),
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}
