use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod aggregate;
mod analysis;
mod config;
mod error;
mod export;
mod generator;
mod ingest;
mod insights;
mod models;
mod normalize;
mod plan;
mod report;
mod risk;
mod taxonomy;

use crate::config::GeneratorConfig;
use crate::generator::{HttpTextGenerator, RetryPolicy};
use crate::models::{AnalysisData, FinalIssue, Insight, PlanDocument, PlanSuggestion, Tier};
use crate::taxonomy::Taxonomy;

#[derive(Parser)]
#[command(name = "school-mapping")]
#[command(about = "School mapping analysis and MTSS tiering for education supervisors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write realistic sample mapping data
    Sample {
        #[arg(long, default_value = "schools.csv")]
        out: PathBuf,
    },
    /// Classify schools and print the summary
    Analyze {
        /// School records as CSV or JSON
        #[arg(long)]
        input: PathBuf,
        /// Also write the full analysis as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        no_insights: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        supervisor: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Plan JSON written by `plan`, rendered as an extra section
        #[arg(long)]
        plan: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        no_insights: bool,
    },
    /// Export the mapping table as a spreadsheet-friendly CSV
    Export {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "")]
        supervisor: String,
        /// Defaults to a dated file name in the working directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Derive root causes and suggest central issues
    Issues {
        #[arg(long)]
        input: PathBuf,
        /// Where the suggested issues are saved for `plan`
        #[arg(long, default_value = "issues.json")]
        out: PathBuf,
        #[arg(long, default_value_t = false)]
        no_insights: bool,
    },
    /// Build the intervention and support plan for one saved issue
    Plan {
        #[arg(long)]
        input: PathBuf,
        /// Issues saved by `issues`
        #[arg(long, default_value = "issues.json")]
        issues: PathBuf,
        /// Index into the saved issues
        #[arg(long, default_value_t = 0)]
        issue: usize,
        #[arg(long, default_value = "plan.json")]
        out: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();
}

fn build_generator(enabled: bool) -> anyhow::Result<Option<HttpTextGenerator>> {
    if !enabled {
        return Ok(None);
    }
    match GeneratorConfig::from_env()? {
        Some(config) => {
            info!(model = %config.model, "Text generation enabled");
            let generator = HttpTextGenerator::new(&config)
                .context("failed to build text-generation client")?;
            Ok(Some(generator))
        }
        None => {
            warn!("TEXTGEN_API_KEY is not set, skipping text generation");
            Ok(None)
        }
    }
}

async fn analyze_with_insights(
    input: &Path,
    with_insights: bool,
    generator: Option<&HttpTextGenerator>,
) -> anyhow::Result<AnalysisData> {
    let schools = ingest::load_schools(input)?;
    let data = analysis::analyze(&schools, Taxonomy::standard());

    let insights = match (with_insights, generator) {
        (false, _) => Vec::new(),
        (true, Some(generator)) => {
            insights::generate_insights(generator, &RetryPolicy::default(), &data).await
        }
        (true, None) => vec![Insight::fallback()],
    };
    Ok(data.with_insights(insights))
}

fn print_summary(data: &AnalysisData) {
    let summary = &data.summary;
    println!(
        "{} schools, {} students: {} at risk (tier 3), {} leading (tier 1)",
        summary.total_schools,
        summary.total_students,
        summary.risky_schools,
        summary.excellent_schools
    );

    let tiers = &data.mtss_classification;
    for (tier, schools) in [
        (Tier::Universal, &tiers.tier1),
        (Tier::Targeted, &tiers.tier2),
        (Tier::Intensive, &tiers.tier3),
    ] {
        println!("Tier {} ({}):", tier.number(), tier.label());
        for classified in schools.iter() {
            println!(
                "- {} ({})",
                classified.school.name,
                classified.characterization.label()
            );
        }
    }

    for insight in &data.insights {
        println!("* {}: {}", insight.title, insight.text);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sample { out } => {
            let file = File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            ingest::write_schools_csv(BufWriter::new(file), &ingest::sample_schools())?;
            println!("Sample data written to {}.", out.display());
        }
        Commands::Analyze {
            input,
            json,
            no_insights,
        } => {
            let generator = build_generator(!no_insights)?;
            let data = analyze_with_insights(&input, !no_insights, generator.as_ref()).await?;
            print_summary(&data);

            if let Some(path) = json {
                ingest::write_json_file(&path, &data)?;
                println!("Analysis written to {}.", path.display());
            }
        }
        Commands::Report {
            input,
            supervisor,
            out,
            plan,
            no_insights,
        } => {
            let plan: Option<PlanDocument> = plan
                .map(|path| ingest::read_json_file(&path))
                .transpose()?;
            let generator = build_generator(!no_insights)?;
            let data = analyze_with_insights(&input, !no_insights, generator.as_ref()).await?;
            let report = report::build_report(
                supervisor.as_deref(),
                Utc::now().date_naive(),
                &data,
                plan.as_ref(),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            input,
            supervisor,
            out,
        } => {
            let schools = ingest::load_schools(&input)?;
            let out = out.unwrap_or_else(|| {
                PathBuf::from(export::default_export_name(Utc::now().date_naive()))
            });
            let file = File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            export::write_mapping_csv(
                BufWriter::new(file),
                &supervisor,
                &schools,
                Taxonomy::standard(),
            )?;
            println!("Exported {} schools to {}.", schools.len(), out.display());
        }
        Commands::Issues {
            input,
            out,
            no_insights,
        } => {
            let generator = build_generator(!no_insights)?;
            let data = analyze_with_insights(&input, !no_insights, generator.as_ref()).await?;
            let causes = insights::root_causes(&data);

            println!("Root causes:");
            for cause in &causes {
                println!("- {cause}");
            }

            let suggestions = match generator.as_ref() {
                Some(generator) => {
                    insights::generate_issue_suggestions(generator, &RetryPolicy::default(), &causes)
                        .await
                }
                None => {
                    println!("Issue suggestions need TEXTGEN_API_KEY.");
                    Vec::new()
                }
            };
            let issues: Vec<FinalIssue> = suggestions
                .into_iter()
                .map(|issue| insights::finalize_issue(issue, &data, causes.clone()))
                .collect();

            if issues.is_empty() {
                println!("No issue suggestions are available right now.");
            }
            for (index, chosen) in issues.iter().enumerate() {
                let issue = &chosen.issue;
                println!(
                    "[{index}] {} ({}): how can we {} {} {}, in order to {}?",
                    issue.title, issue.level, issue.action, issue.subject, issue.context, issue.result
                );
            }
            ingest::write_json_file(&out, &issues)?;
            println!("Issues written to {}.", out.display());
        }
        Commands::Plan {
            input,
            issues,
            issue,
            out,
        } => {
            let saved: Vec<FinalIssue> = ingest::read_json_file(&issues)?;
            let available = saved.len();
            let Some(chosen) = saved.into_iter().nth(issue) else {
                warn!(issue, available, "Requested issue is not in the saved list");
                println!(
                    "No issue at index {issue} in {} ({available} saved). No plan was created.",
                    issues.display()
                );
                return Ok(());
            };

            let suggestion = match build_generator(true)? {
                Some(generator) => {
                    insights::generate_plan_suggestions(&generator, &RetryPolicy::default(), &chosen)
                        .await
                }
                None => PlanSuggestion::default(),
            };
            let data = analyze_with_insights(&input, false, None).await?;
            let document = plan::build_plan(chosen, suggestion, &data, Taxonomy::standard());

            println!("Issue: {}", document.issue.issue.title);
            if document.intervention.main_goal.is_empty() {
                println!("No goal suggestions are available right now; fill them in {}.", out.display());
            } else {
                println!("Main goal: {}", document.intervention.main_goal);
                for objective in &document.intervention.smart_objectives {
                    println!("- {objective}");
                }
            }
            println!(
                "{} tier 2 groups, {} core actions, {} tasks.",
                document.intervention.tier2_groups.len(),
                document.support.core_actions.len(),
                document.support.operational_plan.len()
            );
            ingest::write_json_file(&out, &document)?;
            println!("Plan written to {}.", out.display());
        }
    }

    Ok(())
}
