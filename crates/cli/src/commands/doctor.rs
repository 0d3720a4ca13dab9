use serde::Serialize;
use tertulia_core::config::{AppConfig, LoadOptions, StateBackend};
use tertulia_db::{connect_from_config, ping};

use crate::commands::CommandResult;

/// Certificates the certificate dialog attaches.
const CERTIFICATE_FILES: [&str; 2] = ["cert-nomina.pdf", "cert-ingresos.pdf"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_luis(&config));
            checks.push(check_external_services(&config));
            checks.push(check_certificates(&config));
            checks.push(check_state_store(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::new("config_validation", CheckStatus::Fail, error.to_string()));
            for name in
                ["luis_configuration", "external_services", "certificate_documents", "state_store"]
            {
                checks.push(DoctorCheck::new(
                    name,
                    CheckStatus::Skipped,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    // Unconfigured services degrade gracefully, so only failures count.
    let healthy = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if healthy { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if healthy {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_luis(config: &AppConfig) -> DoctorCheck {
    match (config.luis.is_configured(), config.luis.host_name.as_deref()) {
        (true, Some(host)) => DoctorCheck::new(
            "luis_configuration",
            CheckStatus::Pass,
            format!("recognizer will call `{host}`"),
        ),
        _ => DoctorCheck::new(
            "luis_configuration",
            CheckStatus::Skipped,
            "LUIS is not configured; every turn answers with the setup notice",
        ),
    }
}

fn check_external_services(config: &AppConfig) -> DoctorCheck {
    let services = [
        ("channel", config.channel.app_id.is_some() && config.channel.app_password.is_some()),
        ("qna", config.qna.is_configured()),
        ("vision", config.vision.is_configured()),
        ("face", config.face.service.is_configured()),
        (
            "custom_vision",
            config.custom_vision.prediction_key.is_some()
                && (config.custom_vision.coffee_endpoint.is_some()
                    || config.custom_vision.cheese_endpoint.is_some()),
        ),
        ("translator", config.translator.service.is_configured()),
        ("ml", config.ml.is_configured()),
        ("forex", config.forex.service.is_configured()),
        ("storage", config.storage.is_configured()),
    ];

    let (configured, missing): (Vec<_>, Vec<_>) =
        services.iter().partition(|(_, is_configured)| *is_configured);
    let names = |entries: &[&(&str, bool)]| {
        entries.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
    };

    let details = if missing.is_empty() {
        format!("all services configured: {}", names(&configured))
    } else if configured.is_empty() {
        format!("no external services configured; unconfigured: {}", names(&missing))
    } else {
        format!("configured: {}; unconfigured: {}", names(&configured), names(&missing))
    };
    DoctorCheck::new("external_services", CheckStatus::Pass, details)
}

fn check_certificates(config: &AppConfig) -> DoctorCheck {
    let directory = &config.certificates.directory;
    let missing: Vec<&str> =
        CERTIFICATE_FILES.into_iter().filter(|name| !directory.join(name).is_file()).collect();

    if missing.is_empty() {
        DoctorCheck::new(
            "certificate_documents",
            CheckStatus::Pass,
            format!("found {} certificates in `{}`", CERTIFICATE_FILES.len(), directory.display()),
        )
    } else {
        DoctorCheck::new(
            "certificate_documents",
            CheckStatus::Fail,
            format!("missing in `{}`: {}", directory.display(), missing.join(", ")),
        )
    }
}

fn check_state_store(config: &AppConfig) -> DoctorCheck {
    if config.state.backend == StateBackend::Memory {
        return DoctorCheck::new(
            "state_store",
            CheckStatus::Skipped,
            "memory backend; conversation state is lost on restart",
        );
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::new(
                "state_store",
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        let pinged = ping(&pool).await.map_err(|error| format!("database ping failed: {error}"));
        pool.close().await;
        pinged
    });

    match result {
        Ok(()) => DoctorCheck::new(
            "state_store",
            CheckStatus::Pass,
            format!("connected using `{}`", config.database.url),
        ),
        Err(error) => DoctorCheck::new("state_store", CheckStatus::Fail, error),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
