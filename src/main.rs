//! casegen CLI - AI-assisted test case generation

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::StreamExt;

use casegen::config::{mask_api_key, CasegenConfig};
use casegen::error::{CasegenError, FixSuggestion, Result};
use casegen::export;
use casegen::generate::{CaseMix, GenerateOptions, TestCaseGenerator};
use casegen::mindmap;
use casegen::WorkflowClient;

#[derive(Parser)]
#[command(name = "casegen")]
#[command(about = "casegen - AI-assisted test case generation via remote workflows")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate test cases from a requirement
    Generate {
        /// Requirement file (.txt, .xmind or exported content.json)
        file: Option<PathBuf>,

        /// Requirement text (overrides the file)
        #[arg(short, long)]
        text: Option<String>,

        /// Stream fragments as they arrive instead of waiting
        #[arg(long)]
        stream: bool,

        /// Test priority label (急/高/中/低)
        #[arg(long)]
        priority: Option<String>,

        /// Exact number of cases to request
        #[arg(long)]
        count: Option<u32>,

        /// Case-mix percentages: functional,boundary,exception,perfmon,regression
        #[arg(long, value_name = "MIX")]
        case_mix: Option<String>,

        /// Write the deduplicated case table as Markdown
        #[arg(long, value_name = "PATH")]
        markdown: Option<PathBuf>,

        /// Write the case table as an Excel workbook
        #[arg(long, value_name = "PATH")]
        xlsx: Option<PathBuf>,
    },

    /// Flatten a mind-map file into numbered requirement paths
    Flatten {
        /// Path to a .xmind file (or its content.json)
        file: PathBuf,
    },

    /// Upload a requirement file to the workflow platform
    Upload {
        file: PathBuf,

        /// MIME type sent with the file
        #[arg(long, default_value = "text/plain")]
        content_type: String,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the resolved configuration (API key masked)
    Show,
    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            file,
            text,
            stream,
            priority,
            count,
            case_mix,
            markdown,
            xlsx,
        } => {
            run_generate(
                file, text, stream, priority, count, case_mix, markdown, xlsx,
            )
            .await
        }
        Commands::Flatten { file } => run_flatten(&file),
        Commands::Upload { file, content_type } => run_upload(&file, &content_type).await,
        Commands::Config { action } => run_config(action),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_generate(
    file: Option<PathBuf>,
    text: Option<String>,
    stream: bool,
    priority: Option<String>,
    count: Option<u32>,
    case_mix: Option<String>,
    markdown: Option<PathBuf>,
    xlsx: Option<PathBuf>,
) -> Result<()> {
    let requirement = resolve_requirement(file.as_deref(), text)?;

    let options = GenerateOptions {
        priority,
        count,
        case_mix: case_mix.as_deref().map(parse_case_mix).transpose()?.unwrap_or_default(),
    };

    let config = CasegenConfig::load()?.with_env();
    let client = WorkflowClient::from_config(&config)?;
    let generator = TestCaseGenerator::new(client, config.result_field.clone());

    println!(
        "{} Generating test cases via {}",
        "→".cyan(),
        config.workflow_name.as_deref().unwrap_or(&config.base_url).cyan().bold()
    );

    let result = if stream {
        let fragments = generator.generate_streaming(&requirement, &options).await?;
        futures::pin_mut!(fragments);

        let mut full = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            print!("{}", fragment);
            std::io::stdout().flush()?;
            full.push_str(&fragment);
        }
        println!();
        full
    } else {
        let result = generator.generate(&requirement, &options).await?;
        println!("{}", result);
        result
    };

    let rows = export::extract_table_rows(&result);
    println!(
        "{} Generation finished ({} table rows)",
        "✓".green(),
        rows.len()
    );

    if let Some(path) = markdown {
        std::fs::write(&path, export::to_markdown(&rows))?;
        println!("{} Wrote {}", "✓".green(), path.display());
    }
    if let Some(path) = xlsx {
        export::write_xlsx(&rows, &path)?;
        println!("{} Wrote {}", "✓".green(), path.display());
    }

    Ok(())
}

/// Requirement resolution: explicit text wins, then the file. Mind-map
/// files are flattened into the numbered path document first.
fn resolve_requirement(file: Option<&Path>, text: Option<String>) -> Result<String> {
    if let Some(text) = text {
        if !text.trim().is_empty() {
            return Ok(text);
        }
    }

    let Some(path) = file else {
        return Err(CasegenError::Config {
            reason: "no requirement given: pass a file or --text".to_string(),
        });
    };

    let is_mindmap = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xmind") || ext.eq_ignore_ascii_case("json"));

    if is_mindmap {
        Ok(mindmap::flatten_file(path))
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Parse `55,25,20,0,0` into a [`CaseMix`].
fn parse_case_mix(raw: &str) -> Result<CaseMix> {
    let parts: Vec<u8> = raw
        .split(',')
        .map(|part| part.trim().parse())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| CasegenError::Config {
            reason: format!("invalid case mix '{}': expected five percentages", raw),
        })?;

    if parts.len() != 5 {
        return Err(CasegenError::Config {
            reason: format!("invalid case mix '{}': expected five percentages", raw),
        });
    }

    Ok(CaseMix {
        functional: parts[0],
        boundary: parts[1],
        exception: parts[2],
        perfmon: parts[3],
        regression: parts[4],
    })
}

fn run_flatten(file: &Path) -> Result<()> {
    println!("{}", mindmap::flatten_file(file));
    Ok(())
}

async fn run_upload(file: &Path, content_type: &str) -> Result<()> {
    let config = CasegenConfig::load()?.with_env();
    let client = WorkflowClient::from_config(&config)?;

    let file_id = client.upload_file(file, content_type).await?;
    println!("{} Uploaded, file id: {}", "✓".green(), file_id.bold());

    Ok(())
}

fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = CasegenConfig::load()?.with_env();
            println!("{}", "Configuration".cyan().bold());
            println!("  path:         {}", CasegenConfig::config_path().display());
            println!(
                "  api_key:      {}",
                config
                    .api_key()
                    .map(|key| mask_api_key(key, 10))
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  base_url:     {}", config.base_url);
            println!(
                "  workflow:     {}",
                config.workflow_name.as_deref().unwrap_or("(unnamed)")
            );
            println!("  user:         {}", config.user);
            println!("  result_field: {}", config.result_field);
            println!("  timeout_secs: {}", config.timeout_secs);
        }
        ConfigAction::Init => {
            let path = CasegenConfig::config_path();
            if path.exists() {
                return Err(CasegenError::Config {
                    reason: format!("config already exists at {}", path.display()),
                });
            }
            CasegenConfig::default().save()?;
            println!("{} Wrote default config to {}", "✓".green(), path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_mix_parses_five_percentages() {
        let mix = parse_case_mix("60, 20, 20, 0, 0").unwrap();
        assert_eq!(mix.functional, 60);
        assert_eq!(mix.regression, 0);
    }

    #[test]
    fn case_mix_rejects_wrong_arity() {
        assert!(parse_case_mix("60,20").is_err());
        assert!(parse_case_mix("a,b,c,d,e").is_err());
    }

    #[test]
    fn requirement_prefers_explicit_text() {
        let got = resolve_requirement(Some(Path::new("ignored.txt")), Some("需求".into())).unwrap();
        assert_eq!(got, "需求");
    }

    #[test]
    fn requirement_requires_some_input() {
        assert!(resolve_requirement(None, None).is_err());
        assert!(resolve_requirement(None, Some("   ".into())).is_err());
    }
}
