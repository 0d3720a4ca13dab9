use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tertulia_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// One rendered setting: dotted key path, primary env key, and the display value.
struct Setting {
    key_path: &'static str,
    env_key: &'static str,
    value: String,
}

impl Setting {
    fn plain(key_path: &'static str, env_key: &'static str, value: impl ToString) -> Self {
        Self { key_path, env_key, value: value.to_string() }
    }

    fn optional(key_path: &'static str, env_key: &'static str, value: Option<&str>) -> Self {
        Self::plain(key_path, env_key, value.unwrap_or("<unset>"))
    }

    fn secret(key_path: &'static str, env_key: &'static str, value: Option<&SecretString>) -> Self {
        Self::plain(key_path, env_key, redact_secret(value))
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in settings(&config) {
        let source = field_source(
            setting.key_path,
            Some(setting.env_key),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(setting.key_path, &setting.value, source));
    }

    lines.join("\n")
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    vec![
        Setting::plain("database.url", "TERTULIA_DATABASE_URL", &config.database.url),
        Setting::plain(
            "database.max_connections",
            "TERTULIA_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections,
        ),
        Setting::plain(
            "database.timeout_secs",
            "TERTULIA_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs,
        ),
        Setting::plain(
            "state.backend",
            "TERTULIA_STATE_BACKEND",
            format!("{:?}", config.state.backend),
        ),
        Setting::optional(
            "channel.app_id",
            "TERTULIA_CHANNEL_APP_ID",
            config.channel.app_id.as_deref(),
        ),
        Setting::secret(
            "channel.app_password",
            "TERTULIA_CHANNEL_APP_PASSWORD",
            config.channel.app_password.as_ref(),
        ),
        Setting::plain(
            "channel.oauth_connection_name",
            "TERTULIA_CHANNEL_OAUTH_CONNECTION_NAME",
            &config.channel.oauth_connection_name,
        ),
        Setting::plain(
            "channel.card_channel",
            "TERTULIA_CHANNEL_CARD_CHANNEL",
            &config.channel.card_channel,
        ),
        Setting::optional("luis.app_id", "TERTULIA_LUIS_APP_ID", config.luis.app_id.as_deref()),
        Setting::secret("luis.api_key", "TERTULIA_LUIS_API_KEY", config.luis.api_key.as_ref()),
        Setting::optional(
            "luis.host_name",
            "TERTULIA_LUIS_HOST_NAME",
            config.luis.host_name.as_deref(),
        ),
        Setting::secret(
            "luis.spell_check_key",
            "TERTULIA_LUIS_SPELL_CHECK_KEY",
            config.luis.spell_check_key.as_ref(),
        ),
        Setting::optional(
            "qna.knowledge_base_id",
            "TERTULIA_QNA_KNOWLEDGE_BASE_ID",
            config.qna.knowledge_base_id.as_deref(),
        ),
        Setting::secret(
            "qna.endpoint_key",
            "TERTULIA_QNA_ENDPOINT_KEY",
            config.qna.endpoint_key.as_ref(),
        ),
        Setting::optional(
            "vision.endpoint",
            "TERTULIA_VISION_ENDPOINT",
            config.vision.endpoint.as_deref(),
        ),
        Setting::secret("vision.api_key", "TERTULIA_VISION_API_KEY", config.vision.api_key.as_ref()),
        Setting::optional(
            "face.endpoint",
            "TERTULIA_FACE_ENDPOINT",
            config.face.service.endpoint.as_deref(),
        ),
        Setting::secret(
            "face.api_key",
            "TERTULIA_FACE_API_KEY",
            config.face.service.api_key.as_ref(),
        ),
        Setting::optional(
            "face.person_group_id",
            "TERTULIA_FACE_PERSON_GROUP_ID",
            config.face.person_group_id.as_deref(),
        ),
        Setting::optional(
            "custom_vision.coffee_endpoint",
            "TERTULIA_CUSTOM_VISION_COFFEE_ENDPOINT",
            config.custom_vision.coffee_endpoint.as_deref(),
        ),
        Setting::optional(
            "custom_vision.cheese_endpoint",
            "TERTULIA_CUSTOM_VISION_CHEESE_ENDPOINT",
            config.custom_vision.cheese_endpoint.as_deref(),
        ),
        Setting::secret(
            "custom_vision.prediction_key",
            "TERTULIA_CUSTOM_VISION_PREDICTION_KEY",
            config.custom_vision.prediction_key.as_ref(),
        ),
        Setting::optional(
            "translator.endpoint",
            "TERTULIA_TRANSLATOR_ENDPOINT",
            config.translator.service.endpoint.as_deref(),
        ),
        Setting::secret(
            "translator.api_key",
            "TERTULIA_TRANSLATOR_API_KEY",
            config.translator.service.api_key.as_ref(),
        ),
        Setting::plain(
            "translator.targets",
            "TERTULIA_TRANSLATOR_TARGETS",
            config.translator.targets.join(","),
        ),
        Setting::optional("ml.endpoint", "TERTULIA_ML_ENDPOINT", config.ml.endpoint.as_deref()),
        Setting::secret("ml.api_key", "TERTULIA_ML_API_KEY", config.ml.api_key.as_ref()),
        Setting::optional(
            "forex.endpoint",
            "TERTULIA_FOREX_ENDPOINT",
            config.forex.service.endpoint.as_deref(),
        ),
        Setting::secret(
            "forex.api_key",
            "TERTULIA_FOREX_API_KEY",
            config.forex.service.api_key.as_ref(),
        ),
        Setting::plain("forex.pair", "TERTULIA_FOREX_PAIR", &config.forex.pair),
        Setting::optional(
            "storage.account",
            "TERTULIA_STORAGE_ACCOUNT",
            config.storage.account.as_deref(),
        ),
        Setting::secret(
            "storage.access_key",
            "TERTULIA_STORAGE_ACCESS_KEY",
            config.storage.access_key.as_ref(),
        ),
        Setting::secret(
            "storage.connection_string",
            "TERTULIA_STORAGE_CONNECTION_STRING",
            config.storage.connection_string.as_ref(),
        ),
        Setting::plain("storage.table", "TERTULIA_STORAGE_TABLE", &config.storage.table),
        Setting::plain(
            "certificates.directory",
            "TERTULIA_CERTIFICATES_DIRECTORY",
            config.certificates.directory.display(),
        ),
        Setting::plain(
            "server.bind_address",
            "TERTULIA_SERVER_BIND_ADDRESS",
            &config.server.bind_address,
        ),
        Setting::plain("server.port", "TERTULIA_SERVER_PORT", config.server.port),
        Setting::plain(
            "server.health_check_port",
            "TERTULIA_SERVER_HEALTH_CHECK_PORT",
            config.server.health_check_port,
        ),
        Setting::plain("logging.level", "TERTULIA_LOGGING_LEVEL", &config.logging.level),
        Setting::plain(
            "logging.format",
            "TERTULIA_LOGGING_FORMAT",
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("tertulia.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/tertulia.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: Option<&SecretString>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}
