use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use formfill_core::{
    ChatCompletionsClient, Config, DecodeFailurePolicy, FieldExtractor, FieldSpec, build_prompt,
    config_file, parse_field_specs,
};
use formfill_ingest::ExtractedText;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Fill form fields from a PDF, DOCX, or text document using a language model
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract field values from a document and print them as JSON
    Extract {
        /// Path to the .pdf, .docx, .txt, or .md file
        file_path: PathBuf,

        /// Comma-separated field names
        #[arg(long, value_delimiter = ',', required_unless_present = "fields_json")]
        fields: Vec<String>,

        /// Field specs as a JSON array (strings or {id,name,label,type} objects)
        #[arg(long, conflicts_with = "fields")]
        fields_json: Option<String>,

        /// API key (overrides DEEPSEEK_API_KEY / FORMFILL_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Chat-completions base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// Print the prompt without calling the model
        #[arg(long)]
        dry_run: bool,

        /// Continue with the decoder's error message as document text when
        /// the file cannot be decoded
        #[arg(long)]
        degrade: bool,

        /// Print a key/value table instead of JSON
        #[arg(long)]
        table: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Path to output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse().command).await
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Extract {
            file_path,
            fields,
            fields_json,
            api_key,
            base_url,
            model,
            dry_run,
            degrade,
            table,
            no_color,
            output,
        } => {
            let specs = field_specs_from_args(&fields, fields_json.as_deref())?;

            let mut config = Config::from_file_and_env(&config_file::load_config())?;
            if let Some(key) = api_key {
                config.api_key = Some(key);
            }
            if let Some(url) = base_url {
                config.base_url = url;
            }
            if let Some(model) = model {
                config.model = model;
            }
            if degrade {
                config.decode_failure_policy = DecodeFailurePolicy::Degrade;
            }

            let text = read_document(&file_path, config.decode_failure_policy)?;

            let use_color = !no_color && output.is_none();
            let mut writer: Box<dyn Write> = if let Some(ref output_path) = output {
                Box::new(std::fs::File::create(output_path)?)
            } else {
                Box::new(std::io::stdout())
            };

            if dry_run {
                let prompt = build_prompt(&specs, &text);
                output::print_prompt(&mut writer, &prompt.system, &prompt.user, ColorMode(use_color))?;
                return Ok(());
            }

            extract(config, &specs, &text, table, ColorMode(use_color), &mut writer).await
        }
    }
}

/// Field specs from `--fields-json`, or else from the comma-separated
/// `--fields` list.
fn field_specs_from_args(
    fields: &[String],
    fields_json: Option<&str>,
) -> anyhow::Result<Vec<FieldSpec>> {
    if let Some(raw) = fields_json {
        return Ok(parse_field_specs(raw)?);
    }
    let specs: Vec<FieldSpec> = fields
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(|f| FieldSpec::Name(f.to_string()))
        .collect();
    if specs.is_empty() {
        anyhow::bail!("No form fields provided");
    }
    Ok(specs)
}

fn read_document(path: &Path, policy: DecodeFailurePolicy) -> anyhow::Result<String> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = std::fs::read(path)?;

    match (formfill_ingest::extract(&bytes, &file_name)?, policy) {
        (ExtractedText::Text(text), _) => Ok(text),
        (ExtractedText::DecodeFailed(message), DecodeFailurePolicy::Reject) => {
            anyhow::bail!("{}: {}", file_name, message)
        }
        (ExtractedText::DecodeFailed(message), DecodeFailurePolicy::Degrade) => {
            tracing::warn!(file = %file_name, error = %message, "using decode failure as document text");
            Ok(message)
        }
    }
}

async fn extract(
    config: Config,
    specs: &[FieldSpec],
    text: &str,
    table: bool,
    color: ColorMode,
    writer: &mut dyn Write,
) -> anyhow::Result<()> {
    let client = ChatCompletionsClient::from_config(&config)?;
    if !client.has_api_key() {
        anyhow::bail!("No API key configured. Set DEEPSEEK_API_KEY or pass --api-key.");
    }

    let extractor = FieldExtractor::new(Arc::new(client), config.extraction_settings());
    let result = extractor.extract_fields(text, specs).await;

    if table {
        output::print_table(writer, &result, color)?;
    } else {
        output::print_json(writer, &result)?;
    }
    writer.flush()?;

    if let Some(message) = result.error() {
        anyhow::bail!("extraction failed: {}", message);
    }
    Ok(())
}
