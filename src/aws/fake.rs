//! Stand-in `aws` executable for collector tests

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use super::AwsCli;
use crate::config::{EffectiveConfig, ScanPeriod, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Write an executable `sh` script named `aws` into `dir`. Each invocation
/// appends its arguments to `argv.log` before running `body`, which can
/// dispatch on `$1`/`$2` (service and operation).
pub fn script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("aws");
    let content = format!(
        "#!/bin/sh\necho \"$@\" >> '{}'\n{}\n",
        dir.join("argv.log").display(),
        body
    );
    fs::write(&path, content).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Every recorded invocation, one per line
pub fn argv_log(dir: &Path) -> String {
    fs::read_to_string(dir.join("argv.log")).unwrap_or_default()
}

pub fn env(program: &Path) -> HashMap<String, String> {
    HashMap::from([(
        "AWS_INSIGHTS_AWS_BIN".to_string(),
        program.display().to_string(),
    )])
}

pub fn config(region: &str) -> EffectiveConfig {
    EffectiveConfig {
        api_key: None,
        model: DEFAULT_MODEL.to_string(),
        base_url: DEFAULT_BASE_URL.to_string(),
        max_tokens: None,
        temperature: None,
        verbosity: None,
        reasoning_effort: None,
        service_tier: None,
        input_cost: None,
        output_cost: None,
        cached_cost: None,
        scan_period: ScanPeriod::default(),
        region: region.to_string(),
        credentials: None,
        live: true,
    }
}

/// AWS CLI in `region` backed by a script with `body`
pub fn cli(dir: &Path, region: &str, body: &str) -> AwsCli {
    let program = script(dir, body);
    AwsCli::new(&config(region), &env(&program))
}
