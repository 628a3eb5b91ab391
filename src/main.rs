// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;
use the_geoflow::config::{load_settings, EngineSettings, PipelineArgs};
use the_geoflow::engine::{RunContext, StageDataType};
use the_geoflow::graph::Pipeline;
use the_geoflow::observability::init_tracing;
use the_geoflow::registry::ModuleRegistry;

const DEFAULT_LOG_LEVEL: &str = "info";

/// Command-line options the binary consumes itself; every other token is
/// handed to the pipeline as an override.
#[derive(Debug, Default)]
struct CliOptions {
    pipeline_file: Option<PathBuf>,
    settings_file: Option<PathBuf>,
    list_modules: bool,
    temp_path: Option<PathBuf>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    extract: Option<(String, StageDataType)>,
    overrides: Vec<String>,
}

impl CliOptions {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = CliOptions::default();
        let mut tokens = args.iter();

        while let Some(token) = tokens.next() {
            let mut value = |flag: &str| {
                tokens
                    .next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{} expects a value", flag))
            };
            match token.as_str() {
                "--pipeline_file" => options.pipeline_file = Some(value(token)?.into()),
                "--settings_file" => options.settings_file = Some(value(token)?.into()),
                "--temp_path" => options.temp_path = Some(value(token)?.into()),
                "--log_level" => options.log_level = Some(value(token)?),
                "--log_file" => options.log_file = Some(value(token)?.into()),
                "--stage_data" => options.extract = Some((value(token)?, StageDataType::Data)),
                "--stage_schema" => options.extract = Some((value(token)?, StageDataType::Schema)),
                "--modules" => options.list_modules = true,
                _ => options.overrides.push(token.clone()),
            }
        }
        Ok(options)
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} --pipeline_file <pipeline.json> [options] [overrides...]", program);
    eprintln!("       {} --modules", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --settings_file <file>   engine settings (.yaml or .toml)");
    eprintln!("  --temp_path <dir>        parent folder of per-run temporary data");
    eprintln!("  --log_level <level>      tracing filter, e.g. debug or geoflow=trace");
    eprintln!("  --log_file <file>        append logs to a file instead of stderr");
    eprintln!("  --stage_data <id>        print the features produced by one stage");
    eprintln!("  --stage_schema <id>      print the schema produced by one stage");
    eprintln!();
    eprintln!("Overrides:");
    eprintln!("  -source <path>  -target <path>  --module.<stageId>.<attr>=<value>  --pipeline.<KEY>=<value>");
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("geoflow");

    let options = match CliOptions::parse(&args[1.min(args.len())..]) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("❌ {}", e);
            print_usage(program);
            std::process::exit(2);
        }
    };

    if options.pipeline_file.is_none() && !options.list_modules {
        print_usage(program);
        std::process::exit(2);
    }

    if let Err(e) = run(options) {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run(options: CliOptions) -> Result<()> {
    let settings = match &options.settings_file {
        Some(path) => load_settings(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => EngineSettings::default(),
    };

    let log_level = options
        .log_level
        .clone()
        .or_else(|| settings.log_level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    let log_file = options.log_file.clone().or_else(|| settings.log_file.clone());
    init_tracing(&log_level, log_file.as_deref()).map_err(|e| anyhow!(e))?;

    let registry = ModuleRegistry::with_builtins();

    if options.list_modules {
        println!("{}", serde_json::to_string_pretty(&registry.catalog())?);
        if options.pipeline_file.is_none() {
            return Ok(());
        }
    }

    let Some(pipeline_file) = options.pipeline_file.clone() else {
        bail!("no pipeline file given");
    };

    let mut pipeline_args = PipelineArgs::from_tokens(&options.overrides);
    settings.apply_defaults(&mut pipeline_args);

    let mut context = RunContext::from_settings(&settings);
    if let Some(temp_path) = &options.temp_path {
        context = context.with_temp_path(temp_path);
    }

    let started = Instant::now();
    let outcome = execute(&registry, &pipeline_file, &pipeline_args, &context, options.extract);

    let report = context.report();
    report.insert("pipelineFile", pipeline_file.display().to_string());
    report.insert("elapsedTime", started.elapsed().as_secs_f64());
    match &outcome {
        Ok(_) => {
            report.insert("status", "succeeded");
            report.insert("message", "");
        }
        Err(e) => {
            report.insert("status", "failed");
            report.insert("message", format!("{:#}", e));
        }
    }

    if let Ok(Some(extracted)) = &outcome {
        println!("{}", serde_json::to_string_pretty(extracted)?);
    }
    eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);

    outcome.map(|_| ())
}

/// Run the whole pipeline, or extract one stage's output when requested.
fn execute(
    registry: &ModuleRegistry,
    pipeline_file: &Path,
    args: &PipelineArgs,
    context: &RunContext,
    extract: Option<(String, StageDataType)>,
) -> Result<Option<serde_json::Value>> {
    let mut pipeline = Pipeline::load_from_file(registry, pipeline_file, args)
        .with_context(|| format!("failed to load pipeline {}", pipeline_file.display()))?;

    match extract {
        Some((stage_id, mode)) => {
            let data = pipeline
                .extract(&stage_id, mode, context)
                .with_context(|| format!("failed to extract {} of stage {}", mode, stage_id))?;
            Ok(Some(data.to_json()?))
        }
        None => {
            let records = pipeline.run(context)?;
            context.report().insert("recordCount", records);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cli_splits_options_from_overrides() {
        let options = CliOptions::parse(&tokens(&[
            "--pipeline_file",
            "roads.json",
            "-source",
            "/data/roads.geojson",
            "--stage_schema",
            "filter",
            "--module.limit.countLimit=5",
        ]))
        .unwrap();

        assert_eq!(options.pipeline_file, Some(PathBuf::from("roads.json")));
        assert_eq!(
            options.overrides,
            vec!["-source", "/data/roads.geojson", "--module.limit.countLimit=5"]
        );
        assert!(matches!(
            options.extract,
            Some((ref id, StageDataType::Schema)) if id == "filter"
        ));
    }

    #[test]
    fn test_cli_rejects_flag_without_value() {
        assert!(CliOptions::parse(&tokens(&["--stage_data"])).is_err());
    }
}
