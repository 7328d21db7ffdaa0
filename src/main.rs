//! aws-insights - AWS cost, usage and security reviews from the terminal
//!
//! Collects data through the AWS CLI, asks an LLM to summarize it and keeps
//! a local ledger of what each summary cost.

mod analyzer;
mod aws;
mod config;
mod error;
mod ledger;
mod llm;
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use analyzer::{Analyzer, Pipeline, Request};
use config::{AppPaths, CliOverrides, ConfigResolver, ConfigStore, Mode, ProcessEnv};
use ledger::{JobLedger, Pricing};

/// aws-insights - Summarize AWS cost, usage and security data with an LLM
#[derive(Parser, Debug)]
#[command(name = "aws-insights")]
#[command(version)]
#[command(about = "Summarize AWS cost, usage and security data with an LLM", long_about = None)]
struct Args {
    /// Whether AWS calls are allowed
    #[arg(long, value_enum, default_value_t = Mode::Auto, global = true)]
    mode: Mode,

    /// AWS region (defaults to AWS_REGION, AWS_DEFAULT_REGION, the config file or us-east-1)
    #[arg(short, long, global = true)]
    region: Option<String>,

    /// Days to scan: 1, 7, 30, 120 or 365
    #[arg(long = "scan-period", alias = "scanPeriod", global = true)]
    scan_period: Option<u32>,

    /// Extra question to answer alongside the analysis
    #[arg(short, long, global = true)]
    question: Option<String>,

    /// Completion model (defaults to AWS_INSIGHTS_MODEL, the config file or gpt-4.1-mini)
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key for the completion endpoint (defaults to OPENAI_API_KEY or the config file)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Upper bound on generated tokens
    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// Enable debug logging (logs to stderr)
    #[arg(long, default_value = "false", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store API key, defaults and AWS credentials
    Configure,
    /// Run every analyzer in sequence
    Scan {
        /// Terraform plan to include in the scan
        #[arg(long = "tf-plan")]
        tf_plan: Option<PathBuf>,
    },
    /// Analyze Cost Explorer spend
    Cost,
    /// Review Lambda functions
    Lambda,
    /// Review CloudWatch log groups
    Logs,
    /// Review a Terraform plan
    Tf {
        /// Binary plan file or JSON from 'terraform show -json'
        #[arg(long = "tf-plan")]
        tf_plan: Option<PathBuf>,
    },
    /// Review IAM users and account settings
    Iam,
    /// Summarize Trusted Advisor checks
    Advisor,
    /// Summarize Security Hub findings
    Security,
    /// Show recorded jobs and their cost
    Usage,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let env = ProcessEnv;
    let paths = AppPaths::resolve(&env)?;
    let store = ConfigStore::new(&paths.config_file);
    info!("Using config directory {:?}", paths.dir);

    match &args.command {
        Commands::Configure => return ui::configure::run(&store),
        Commands::Usage => {
            let ledger = JobLedger::new(&paths.ledger_file, Pricing::default());
            let records = ledger.read_all();
            let summary = ledger.summary();
            print!("{}", ui::usage::render_usage(&records, &summary));
            return Ok(());
        }
        _ => {}
    }

    let overrides = CliOverrides {
        api_key: args.api_key.clone(),
        model: args.model.clone(),
        region: args.region.clone(),
        scan_period: args.scan_period,
        max_tokens: args.max_tokens,
        temperature: args.temperature,
        mode: args.mode,
    };
    if let Some(days) = args.scan_period {
        if config::ScanPeriod::new(days).is_none() {
            tracing::warn!(
                "Ignoring --scan-period {}; allowed values are {:?}",
                days,
                config::ScanPeriod::ALLOWED
            );
        }
    }

    let config = ConfigResolver::new(store, &env).resolve(&overrides)?;
    info!(
        "Region {} · {} days · live: {}",
        config.region,
        config.scan_period.days(),
        config.live
    );
    if let Some(creds) = &config.credentials {
        info!("Using AWS access key {}", creds.masked_access_key());
    }

    let aws = aws::AwsCli::new(&config, &env);
    let ledger = JobLedger::new(&paths.ledger_file, Pricing::from_config(&config));
    info!("Recording jobs in {:?}", ledger.path());
    let pipeline = Pipeline::new(&config, aws, ledger);

    let tf_plan = match &args.command {
        Commands::Scan { tf_plan } | Commands::Tf { tf_plan } => tf_plan.as_deref(),
        _ => None,
    };
    let request = Request {
        question: args.question.as_deref(),
        tf_plan,
    };

    let output = match &args.command {
        Commands::Scan { .. } => pipeline.scan(request).await?,
        Commands::Cost => pipeline.run(Analyzer::Cost, request).await?,
        Commands::Lambda => pipeline.run(Analyzer::Lambda, request).await?,
        Commands::Logs => pipeline.run(Analyzer::Logs, request).await?,
        Commands::Tf { .. } => pipeline.run(Analyzer::Terraform, request).await?,
        Commands::Iam => pipeline.run(Analyzer::Iam, request).await?,
        Commands::Advisor => pipeline.run(Analyzer::Advisor, request).await?,
        Commands::Security => pipeline.run(Analyzer::Security, request).await?,
        Commands::Configure | Commands::Usage => unreachable!("handled above"),
    };

    println!("{}", output);
    Ok(())
}
