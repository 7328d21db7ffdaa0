//! The collect → prompt → complete → render → record pipeline

use crossterm::style::Stylize;
use std::path::Path;
use tracing::info;

use crate::aws::{advisor, cost_explorer, iam, lambda, logs, security_hub, terraform, AwsCli};
use crate::config::EffectiveConfig;
use crate::error::ConfigError;
use crate::ledger::{JobLedger, NewJob};
use crate::llm::{prompts, Completion, CompletionClient};
use crate::ui::render::{self, ParsedResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analyzer {
    Cost,
    Lambda,
    Logs,
    Terraform,
    Iam,
    Advisor,
    Security,
}

impl Analyzer {
    /// Order used by `scan`
    pub const ALL: [Analyzer; 7] = [
        Analyzer::Cost,
        Analyzer::Lambda,
        Analyzer::Logs,
        Analyzer::Terraform,
        Analyzer::Iam,
        Analyzer::Advisor,
        Analyzer::Security,
    ];

    /// Name recorded in the job ledger
    pub fn job_name(self) -> &'static str {
        match self {
            Analyzer::Cost => "cost",
            Analyzer::Lambda => "lambda",
            Analyzer::Logs => "logs",
            Analyzer::Terraform => "tf",
            Analyzer::Iam => "iam",
            Analyzer::Advisor => "advisor",
            Analyzer::Security => "security",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Analyzer::Cost => "AWS Cost",
            Analyzer::Lambda => "AWS Lambda",
            Analyzer::Logs => "CloudWatch Logs",
            Analyzer::Terraform => "Terraform plan",
            Analyzer::Iam => "IAM",
            Analyzer::Advisor => "Trusted Advisor",
            Analyzer::Security => "Security Hub",
        }
    }

    /// Terraform plans are read locally; everything else calls AWS
    pub fn needs_aws(self) -> bool {
        !matches!(self, Analyzer::Terraform)
    }

    fn offline_message(self) -> String {
        match self {
            Analyzer::Cost => "No live AWS credentials in use (offline mode or none configured). \
                 Cost analysis needs Cost Explorer access: set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY \
                 or run 'aws-insights configure', then retry with --mode auto or --mode live."
                .to_string(),
            other => format!(
                "Offline mode: skipped {} analysis because AWS calls are disabled. \
                 Configure credentials and rerun with --mode live.",
                other.title()
            ),
        }
    }
}

const NO_PLAN: &str = "No Terraform plan provided. Pass --tf-plan <path> \
                       (a binary plan or the output of 'terraform show -json').";

/// Per-invocation inputs beyond the config
#[derive(Debug, Clone, Copy, Default)]
pub struct Request<'a> {
    pub question: Option<&'a str>,
    pub tf_plan: Option<&'a Path>,
}

pub struct Pipeline<'a> {
    config: &'a EffectiveConfig,
    aws: AwsCli,
    ledger: JobLedger,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a EffectiveConfig, aws: AwsCli, ledger: JobLedger) -> Self {
        Self {
            config,
            aws,
            ledger,
        }
    }

    /// Run one analyzer to completion and return the text to print
    pub async fn run(&self, analyzer: Analyzer, request: Request<'_>) -> Result<String, ConfigError> {
        if analyzer.needs_aws() && !self.config.live {
            return Ok(analyzer.offline_message());
        }

        if analyzer == Analyzer::Terraform && request.tf_plan.is_none() {
            return Ok(NO_PLAN.to_string());
        }

        // A missing key aborts before any collector runs
        let client = CompletionClient::new(self.config)?;

        let data = match analyzer {
            Analyzer::Cost => cost_explorer::collect(&self.aws, self.config.scan_period).await,
            Analyzer::Lambda => lambda::collect(&self.aws).await,
            Analyzer::Logs => logs::collect(&self.aws).await,
            Analyzer::Iam => iam::collect(&self.aws).await,
            Analyzer::Advisor => advisor::collect(&self.aws).await,
            Analyzer::Security => security_hub::collect(&self.aws).await,
            Analyzer::Terraform => match request.tf_plan {
                Some(plan) => terraform::collect(plan).await,
                None => return Ok(NO_PLAN.to_string()),
            },
        };

        let system = prompts::system_prompt(analyzer);
        let user = prompts::user_prompt(analyzer, &data, self.config, request.question);

        info!(
            "Running {} analysis with {} ({})",
            analyzer.job_name(),
            client.model(),
            self.aws.region()
        );
        let completion = client.ask(&system, &user).await;

        let model = completion
            .model
            .clone()
            .unwrap_or_else(|| client.model().to_string());
        let job_id = self.ledger.append(NewJob {
            name: analyzer.job_name().to_string(),
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            cached_tokens: completion.cached_tokens,
            cost: completion.cost,
            model: Some(model.clone()),
        });

        let mut out = format_answer(&completion);
        out.push('\n');
        out.push_str(&render::usage_footer(
            &job_id,
            &model,
            completion.input_tokens,
            completion.output_tokens,
            completion.cached_tokens,
        ));
        Ok(out)
    }

    /// Every analyzer in turn, each finished before the next starts
    pub async fn scan(&self, request: Request<'_>) -> Result<String, ConfigError> {
        let mut out = String::new();
        for analyzer in Analyzer::ALL {
            let banner = format!("━━━ {} ━━━", analyzer.title());
            out.push_str(&format!("\n{}\n", banner.bold()));
            out.push_str(&self.run(analyzer, request).await?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Rendered table, or the raw text when the answer has no table
fn format_answer(completion: &Completion) -> String {
    if completion.failed {
        return completion.content.clone();
    }
    match render::parse(&completion.content) {
        ParsedResponse::Sections(sections) if sections.is_empty() => {
            "No findings reported.".to_string()
        }
        parsed @ ParsedResponse::Sections(_) => render::render(&parsed),
        ParsedResponse::Unparsed => completion.content.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScanPeriod, DEFAULT_MODEL};
    use crate::ledger::Pricing;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn config(live: bool, api_key: Option<&str>) -> EffectiveConfig {
        EffectiveConfig {
            api_key: api_key.map(String::from),
            model: DEFAULT_MODEL.to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            max_tokens: None,
            temperature: None,
            verbosity: None,
            reasoning_effort: None,
            service_tier: None,
            input_cost: None,
            output_cost: None,
            cached_cost: None,
            scan_period: ScanPeriod::default(),
            region: "us-east-1".to_string(),
            credentials: None,
            live,
        }
    }

    fn pipeline<'a>(config: &'a EffectiveConfig, dir: &TempDir) -> Pipeline<'a> {
        let env: HashMap<String, String> = HashMap::new();
        Pipeline::new(
            config,
            AwsCli::new(config, &env),
            JobLedger::new(dir.path().join("jobs.json"), Pricing::default()),
        )
    }

    #[tokio::test]
    async fn offline_cost_needs_no_key_and_records_nothing() {
        let dir = TempDir::new().unwrap();
        let cfg = config(false, None);
        let pipeline = pipeline(&cfg, &dir);

        let text = pipeline.run(Analyzer::Cost, Request::default()).await.unwrap();
        assert!(text.contains("No live AWS credentials"));
        assert!(!dir.path().join("jobs.json").exists());
    }

    #[tokio::test]
    async fn forced_offline_with_credentials_names_the_mode() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(false, Some("sk-test"));
        cfg.credentials = crate::aws::AwsCredentials::from_parts(
            Some("AKIAEXAMPLE".to_string()),
            Some("secret".to_string()),
            None,
        );
        let text = pipeline(&cfg, &dir)
            .run(Analyzer::Cost, Request::default())
            .await
            .unwrap();
        assert!(text.contains("offline mode or none configured"));
        assert!(!dir.path().join("jobs.json").exists());
    }

    #[tokio::test]
    async fn offline_lambda_is_skipped() {
        let dir = TempDir::new().unwrap();
        let cfg = config(false, None);
        let text = pipeline(&cfg, &dir)
            .run(Analyzer::Lambda, Request::default())
            .await
            .unwrap();
        assert!(text.contains("Offline mode"));
        assert!(!dir.path().join("jobs.json").exists());
    }

    #[tokio::test]
    async fn terraform_without_plan_explains() {
        let dir = TempDir::new().unwrap();
        let cfg = config(false, None);
        let text = pipeline(&cfg, &dir)
            .run(Analyzer::Terraform, Request::default())
            .await
            .unwrap();
        assert!(text.contains("--tf-plan"));
    }

    #[tokio::test]
    async fn missing_key_aborts_before_completion() {
        let dir = TempDir::new().unwrap();
        let mut plan = tempfile::Builder::new().suffix(".json").tempfile_in(dir.path()).unwrap();
        std::io::Write::write_all(&mut plan, br#"{"resource_changes": []}"#).unwrap();

        let cfg = config(false, None);
        let request = Request {
            question: None,
            tf_plan: Some(plan.path()),
        };
        let err = pipeline(&cfg, &dir)
            .run(Analyzer::Terraform, request)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
        assert!(!dir.path().join("jobs.json").exists());
    }

    #[tokio::test]
    async fn failed_completion_is_still_recorded() {
        let dir = TempDir::new().unwrap();
        let mut plan = tempfile::Builder::new().suffix(".json").tempfile_in(dir.path()).unwrap();
        std::io::Write::write_all(&mut plan, br#"{"resource_changes": []}"#).unwrap();

        let cfg = config(false, Some("sk-test"));
        let request = Request {
            question: Some("anything destructive?"),
            tf_plan: Some(plan.path()),
        };
        let pipeline = pipeline(&cfg, &dir);
        let text = pipeline.run(Analyzer::Terraform, request).await.unwrap();
        assert!(text.contains("Error:"));

        let records = pipeline.ledger.read_all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "tf");
        assert_eq!(records[0].total_tokens, 0);
    }

    #[tokio::test]
    async fn offline_scan_covers_every_analyzer() {
        let dir = TempDir::new().unwrap();
        let cfg = config(false, None);
        let text = pipeline(&cfg, &dir).scan(Request::default()).await.unwrap();
        for analyzer in Analyzer::ALL {
            assert!(text.contains(analyzer.title()));
        }
        assert!(!dir.path().join("jobs.json").exists());
    }

    #[test]
    fn answer_falls_back_to_raw_text() {
        let completion = Completion {
            content: "The account looks fine.".to_string(),
            ..Default::default()
        };
        assert_eq!(format_answer(&completion), "The account looks fine.");
    }

    #[test]
    fn user_prompt_embeds_scope_and_question() {
        let cfg = config(true, None);
        let prompt = prompts::user_prompt(Analyzer::Cost, "{}", &cfg, Some("why so high?"));
        assert!(prompt.contains("region us-east-1 over the last 30 days"));
        assert!(prompt.contains("why so high?"));

        let prompt = prompts::user_prompt(Analyzer::Terraform, "{}", &cfg, None);
        assert!(!prompt.contains("region"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_key_aborts_before_any_aws_call() {
        use crate::aws::{fake, AwsCredentials};

        let dir = TempDir::new().unwrap();
        let program = fake::script(dir.path(), r#"echo '{"SummaryMap": {}}'"#);
        let mut cfg = fake::config("us-east-1");
        cfg.credentials = AwsCredentials::from_parts(
            Some("AKIAEXAMPLE".to_string()),
            Some("secret".to_string()),
            None,
        );
        let pipeline = Pipeline::new(
            &cfg,
            AwsCli::new(&cfg, &fake::env(&program)),
            JobLedger::new(dir.path().join("jobs.json"), Pricing::default()),
        );

        for analyzer in [Analyzer::Iam, Analyzer::Cost, Analyzer::Security] {
            let err = pipeline.run(analyzer, Request::default()).await.unwrap_err();
            assert!(matches!(err, ConfigError::MissingApiKey));
        }
        assert_eq!(fake::argv_log(dir.path()), "");
        assert!(!dir.path().join("jobs.json").exists());
    }
}
