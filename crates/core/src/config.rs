use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub state: StateConfig,
    pub channel: ChannelConfig,
    pub luis: LuisConfig,
    pub qna: QnaConfig,
    pub vision: EndpointConfig,
    pub face: FaceConfig,
    pub custom_vision: CustomVisionConfig,
    pub translator: TranslatorConfig,
    pub ml: EndpointConfig,
    pub forex: ForexConfig,
    pub storage: StorageConfig,
    pub certificates: CertificateConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StateConfig {
    pub backend: StateBackend,
}

/// Credentials and identities used to talk back to the messaging channels.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub app_id: Option<String>,
    pub app_password: Option<SecretString>,
    pub oauth_connection_name: String,
    pub card_channel: String,
    pub bot_account_id: String,
    pub token_endpoint: String,
    pub token_service_url: String,
}

#[derive(Clone, Debug)]
pub struct LuisConfig {
    pub app_id: Option<String>,
    pub api_key: Option<SecretString>,
    pub host_name: Option<String>,
    pub spell_check_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct QnaConfig {
    pub knowledge_base_id: Option<String>,
    pub endpoint_key: Option<SecretString>,
    pub host: Option<String>,
}

/// A keyed HTTP endpoint. Both halves are optional; a service missing either
/// one reports itself as not configured at call time.
#[derive(Clone, Debug, Default)]
pub struct EndpointConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct FaceConfig {
    pub service: EndpointConfig,
    pub person_group_id: Option<String>,
    pub person_id: Option<String>,
    pub person_name: String,
}

#[derive(Clone, Debug, Default)]
pub struct CustomVisionConfig {
    pub coffee_endpoint: Option<String>,
    pub cheese_endpoint: Option<String>,
    pub prediction_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct TranslatorConfig {
    pub service: EndpointConfig,
    pub targets: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ForexConfig {
    pub service: EndpointConfig,
    pub source_url: Option<String>,
    pub pair: String,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub account: Option<String>,
    pub access_key: Option<SecretString>,
    pub connection_string: Option<SecretString>,
    pub table: String,
}

#[derive(Clone, Debug)]
pub struct CertificateConfig {
    pub directory: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
    pub outbound_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    Memory,
    Sqlite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub state_backend: Option<StateBackend>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub luis_app_id: Option<String>,
    pub luis_api_key: Option<String>,
    pub luis_host_name: Option<String>,
    pub certificates_directory: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_TRANSLATION_TARGETS: [&str; 5] = ["es", "en", "pt", "fr", "it"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tertulia.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            state: StateConfig { backend: StateBackend::Memory },
            channel: ChannelConfig {
                app_id: None,
                app_password: None,
                oauth_connection_name: String::new(),
                card_channel: "directline".to_string(),
                bot_account_id: "miDemoBot.co".to_string(),
                token_endpoint:
                    "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token"
                        .to_string(),
                token_service_url: "https://api.botframework.com".to_string(),
            },
            luis: LuisConfig { app_id: None, api_key: None, host_name: None, spell_check_key: None },
            qna: QnaConfig { knowledge_base_id: None, endpoint_key: None, host: None },
            vision: EndpointConfig::default(),
            face: FaceConfig {
                service: EndpointConfig::default(),
                person_group_id: None,
                person_id: None,
                person_name: "Fernando".to_string(),
            },
            custom_vision: CustomVisionConfig::default(),
            translator: TranslatorConfig {
                service: EndpointConfig::default(),
                targets: DEFAULT_TRANSLATION_TARGETS.iter().map(|code| code.to_string()).collect(),
            },
            ml: EndpointConfig::default(),
            forex: ForexConfig {
                service: EndpointConfig::default(),
                source_url: None,
                pair: "USD_COP".to_string(),
            },
            storage: StorageConfig {
                account: None,
                access_key: None,
                connection_string: None,
                table: "iothub".to_string(),
            },
            certificates: CertificateConfig { directory: PathBuf::from("resources") },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3978,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
                outbound_timeout_secs: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for StateBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Validation(format!(
                "unsupported state backend `{other}` (expected memory|sqlite)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl EndpointConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|value| !value.trim().is_empty())
            && self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }

    fn apply_patch(&mut self, patch: EndpointPatch) {
        if let Some(endpoint) = patch.endpoint {
            self.endpoint = Some(endpoint);
        }
        if let Some(api_key_value) = patch.api_key {
            self.api_key = Some(secret_value(api_key_value));
        }
    }
}

impl LuisConfig {
    /// The recognizer only runs when the application id, key and host are all present.
    pub fn is_configured(&self) -> bool {
        let present = |value: Option<&str>| value.is_some_and(|value| !value.trim().is_empty());
        present(self.app_id.as_deref())
            && present(self.api_key.as_ref().map(|key| key.expose_secret()))
            && present(self.host_name.as_deref())
    }
}

impl QnaConfig {
    pub fn is_configured(&self) -> bool {
        self.knowledge_base_id.is_some() && self.endpoint_key.is_some() && self.host.is_some()
    }
}

impl StorageConfig {
    pub fn is_configured(&self) -> bool {
        self.connection_string.is_some() || (self.account.is_some() && self.access_key.is_some())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tertulia.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(backend) = patch.state.and_then(|state| state.backend) {
            self.state.backend = backend;
        }

        if let Some(channel) = patch.channel {
            if let Some(app_id) = channel.app_id {
                self.channel.app_id = Some(app_id);
            }
            if let Some(app_password_value) = channel.app_password {
                self.channel.app_password = Some(secret_value(app_password_value));
            }
            if let Some(oauth_connection_name) = channel.oauth_connection_name {
                self.channel.oauth_connection_name = oauth_connection_name;
            }
            if let Some(card_channel) = channel.card_channel {
                self.channel.card_channel = card_channel;
            }
            if let Some(bot_account_id) = channel.bot_account_id {
                self.channel.bot_account_id = bot_account_id;
            }
            if let Some(token_endpoint) = channel.token_endpoint {
                self.channel.token_endpoint = token_endpoint;
            }
            if let Some(token_service_url) = channel.token_service_url {
                self.channel.token_service_url = token_service_url;
            }
        }

        if let Some(luis) = patch.luis {
            if let Some(app_id) = luis.app_id {
                self.luis.app_id = Some(app_id);
            }
            if let Some(api_key_value) = luis.api_key {
                self.luis.api_key = Some(secret_value(api_key_value));
            }
            if let Some(host_name) = luis.host_name {
                self.luis.host_name = Some(host_name);
            }
            if let Some(spell_check_key_value) = luis.spell_check_key {
                self.luis.spell_check_key = Some(secret_value(spell_check_key_value));
            }
        }

        if let Some(qna) = patch.qna {
            if let Some(knowledge_base_id) = qna.knowledge_base_id {
                self.qna.knowledge_base_id = Some(knowledge_base_id);
            }
            if let Some(endpoint_key_value) = qna.endpoint_key {
                self.qna.endpoint_key = Some(secret_value(endpoint_key_value));
            }
            if let Some(host) = qna.host {
                self.qna.host = Some(host);
            }
        }

        if let Some(vision) = patch.vision {
            self.vision.apply_patch(vision);
        }

        if let Some(face) = patch.face {
            self.face.service.apply_patch(face.service);
            if let Some(person_group_id) = face.person_group_id {
                self.face.person_group_id = Some(person_group_id);
            }
            if let Some(person_id) = face.person_id {
                self.face.person_id = Some(person_id);
            }
            if let Some(person_name) = face.person_name {
                self.face.person_name = person_name;
            }
        }

        if let Some(custom_vision) = patch.custom_vision {
            if let Some(coffee_endpoint) = custom_vision.coffee_endpoint {
                self.custom_vision.coffee_endpoint = Some(coffee_endpoint);
            }
            if let Some(cheese_endpoint) = custom_vision.cheese_endpoint {
                self.custom_vision.cheese_endpoint = Some(cheese_endpoint);
            }
            if let Some(prediction_key_value) = custom_vision.prediction_key {
                self.custom_vision.prediction_key = Some(secret_value(prediction_key_value));
            }
        }

        if let Some(translator) = patch.translator {
            self.translator.service.apply_patch(translator.service);
            if let Some(targets) = translator.targets {
                self.translator.targets = targets;
            }
        }

        if let Some(ml) = patch.ml {
            self.ml.apply_patch(ml);
        }

        if let Some(forex) = patch.forex {
            self.forex.service.apply_patch(forex.service);
            if let Some(source_url) = forex.source_url {
                self.forex.source_url = Some(source_url);
            }
            if let Some(pair) = forex.pair {
                self.forex.pair = pair;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(account) = storage.account {
                self.storage.account = Some(account);
            }
            if let Some(access_key_value) = storage.access_key {
                self.storage.access_key = Some(secret_value(access_key_value));
            }
            if let Some(connection_string_value) = storage.connection_string {
                self.storage.connection_string = Some(secret_value(connection_string_value));
            }
            if let Some(table) = storage.table {
                self.storage.table = table;
            }
        }

        if let Some(directory) = patch.certificates.and_then(|certificates| certificates.directory)
        {
            self.certificates.directory = directory;
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(outbound_timeout_secs) = server.outbound_timeout_secs {
                self.server.outbound_timeout_secs = outbound_timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    // Each setting also honours the variable name used by the original `.env`
    // deployment files, checked after the prefixed name.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TERTULIA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TERTULIA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("TERTULIA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TERTULIA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TERTULIA_DATABASE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TERTULIA_STATE_BACKEND") {
            self.state.backend = value.parse()?;
        }

        if let Some(value) = read_env_alias("TERTULIA_CHANNEL_APP_ID", "MicrosoftAppId") {
            self.channel.app_id = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_CHANNEL_APP_PASSWORD", "MicrosoftAppPassword")
        {
            self.channel.app_password = Some(secret_value(value));
        }
        if let Some(value) =
            read_env_alias("TERTULIA_CHANNEL_OAUTH_CONNECTION_NAME", "ConnectionName")
        {
            self.channel.oauth_connection_name = value;
        }
        if let Some(value) = read_env("TERTULIA_CHANNEL_CARD_CHANNEL") {
            self.channel.card_channel = value;
        }
        if let Some(value) = read_env("TERTULIA_CHANNEL_BOT_ACCOUNT_ID") {
            self.channel.bot_account_id = value;
        }

        if let Some(value) = read_env_alias("TERTULIA_LUIS_APP_ID", "LuisAppId") {
            self.luis.app_id = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_LUIS_API_KEY", "LuisAPIKey") {
            self.luis.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env_alias("TERTULIA_LUIS_HOST_NAME", "LuisAPIHostName") {
            self.luis.host_name = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_LUIS_SPELL_CHECK_KEY", "BingAPIKey") {
            self.luis.spell_check_key = Some(secret_value(value));
        }

        if let Some(value) =
            read_env_alias("TERTULIA_QNA_KNOWLEDGE_BASE_ID", "QnAKnowledgebaseId")
        {
            self.qna.knowledge_base_id = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_QNA_ENDPOINT_KEY", "QnAAuthKey") {
            self.qna.endpoint_key = Some(secret_value(value));
        }
        if let Some(value) = read_env_alias("TERTULIA_QNA_HOST", "QnAEndpointHostName") {
            self.qna.host = Some(value);
        }

        if let Some(value) = read_env_alias("TERTULIA_VISION_ENDPOINT", "ComputerVisionEndpoint") {
            self.vision.endpoint = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_VISION_API_KEY", "ComputerVisionApiKey") {
            self.vision.api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env_alias("TERTULIA_FACE_ENDPOINT", "FaceEndpoint") {
            self.face.service.endpoint = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_FACE_API_KEY", "FaceApiKey") {
            self.face.service.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env_alias("TERTULIA_FACE_PERSON_GROUP_ID", "FaceGroupId") {
            self.face.person_group_id = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_FACE_PERSON_ID", "FacePersonId") {
            self.face.person_id = Some(value);
        }
        if let Some(value) = read_env("TERTULIA_FACE_PERSON_NAME") {
            self.face.person_name = value;
        }

        if let Some(value) =
            read_env_alias("TERTULIA_CUSTOM_VISION_COFFEE_ENDPOINT", "CustomVisionEndpoint")
        {
            self.custom_vision.coffee_endpoint = Some(value);
        }
        if let Some(value) =
            read_env_alias("TERTULIA_CUSTOM_VISION_CHEESE_ENDPOINT", "CustomVisionEndpoint2")
        {
            self.custom_vision.cheese_endpoint = Some(value);
        }
        if let Some(value) =
            read_env_alias("TERTULIA_CUSTOM_VISION_PREDICTION_KEY", "CustomVisionApiKey")
        {
            self.custom_vision.prediction_key = Some(secret_value(value));
        }

        if let Some(value) = read_env_alias("TERTULIA_TRANSLATOR_ENDPOINT", "TranslateEndpoint") {
            self.translator.service.endpoint = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_TRANSLATOR_API_KEY", "TranslateKey") {
            self.translator.service.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TERTULIA_TRANSLATOR_TARGETS") {
            self.translator.targets = parse_list(&value);
        }

        if let Some(value) = read_env_alias("TERTULIA_ML_ENDPOINT", "MLApiUrl") {
            self.ml.endpoint = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_ML_API_KEY", "MLApiKey") {
            self.ml.api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env_alias("TERTULIA_FOREX_ENDPOINT", "ForexEndpoint") {
            self.forex.service.endpoint = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_FOREX_API_KEY", "ForexKey") {
            self.forex.service.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env_alias("TERTULIA_FOREX_SOURCE_URL", "ForexUrl") {
            self.forex.source_url = Some(value);
        }
        if let Some(value) = read_env("TERTULIA_FOREX_PAIR") {
            self.forex.pair = value;
        }

        if let Some(value) = read_env_alias("TERTULIA_STORAGE_ACCOUNT", "IoTStorageAccount") {
            self.storage.account = Some(value);
        }
        if let Some(value) = read_env_alias("TERTULIA_STORAGE_ACCESS_KEY", "IoTStorageAccessKey") {
            self.storage.access_key = Some(secret_value(value));
        }
        if let Some(value) =
            read_env_alias("TERTULIA_STORAGE_CONNECTION_STRING", "IoTStorageConnectionString")
        {
            self.storage.connection_string = Some(secret_value(value));
        }
        if let Some(value) = read_env("TERTULIA_STORAGE_TABLE") {
            self.storage.table = value;
        }

        if let Some(value) = read_env("TERTULIA_CERTIFICATES_DIRECTORY") {
            self.certificates.directory = PathBuf::from(value);
        }

        if let Some(value) = read_env("TERTULIA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TERTULIA_SERVER_PORT") {
            self.server.port = parse_u16("TERTULIA_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT").or_else(|| read_env("port")) {
            self.server.port = parse_u16("PORT", &value)?;
        }
        if let Some(value) = read_env("TERTULIA_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("TERTULIA_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("TERTULIA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TERTULIA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("TERTULIA_SERVER_OUTBOUND_TIMEOUT_SECS") {
            self.server.outbound_timeout_secs =
                parse_u64("TERTULIA_SERVER_OUTBOUND_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env_alias("TERTULIA_LOGGING_LEVEL", "TERTULIA_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env_alias("TERTULIA_LOGGING_FORMAT", "TERTULIA_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(state_backend) = overrides.state_backend {
            self.state.backend = state_backend;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(luis_app_id) = overrides.luis_app_id {
            self.luis.app_id = Some(luis_app_id);
        }
        if let Some(luis_api_key) = overrides.luis_api_key {
            self.luis.api_key = Some(secret_value(luis_api_key));
        }
        if let Some(luis_host_name) = overrides.luis_host_name {
            self.luis.host_name = Some(luis_host_name);
        }
        if let Some(certificates_directory) = overrides.certificates_directory {
            self.certificates.directory = certificates_directory;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_channel(&self.channel)?;
        validate_luis(&self.luis)?;
        validate_endpoints(self)?;
        validate_translator(&self.translator)?;
        validate_forex(&self.forex)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tertulia.toml"), PathBuf::from("config/tertulia.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_channel(channel: &ChannelConfig) -> Result<(), ConfigError> {
    if channel.app_password.is_some() && channel.app_id.is_none() {
        return Err(ConfigError::Validation(
            "channel.app_password is set but channel.app_id is missing (MicrosoftAppId)"
                .to_string(),
        ));
    }

    if channel.card_channel.trim().is_empty() {
        return Err(ConfigError::Validation("channel.card_channel must not be empty".to_string()));
    }

    for (key, url) in [
        ("channel.token_endpoint", channel.token_endpoint.as_str()),
        ("channel.token_service_url", channel.token_service_url.as_str()),
    ] {
        validate_http_url(key, url)?;
    }

    Ok(())
}

fn validate_luis(luis: &LuisConfig) -> Result<(), ConfigError> {
    let set = [
        luis.app_id.is_some(),
        luis.api_key.is_some(),
        luis.host_name.is_some(),
    ];
    let count = set.iter().filter(|present| **present).count();
    if count != 0 && count != set.len() {
        return Err(ConfigError::Validation(
            "luis.app_id, luis.api_key and luis.host_name must be configured together \
             (LuisAppId, LuisAPIKey, LuisAPIHostName)"
                .to_string(),
        ));
    }

    if let Some(host_name) = &luis.host_name {
        if host_name.contains("://") || host_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "luis.host_name must be a bare host name such as `westus.api.cognitive.microsoft.com`"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_endpoints(config: &AppConfig) -> Result<(), ConfigError> {
    let endpoints = [
        ("vision.endpoint", config.vision.endpoint.as_deref()),
        ("face.endpoint", config.face.service.endpoint.as_deref()),
        ("custom_vision.coffee_endpoint", config.custom_vision.coffee_endpoint.as_deref()),
        ("custom_vision.cheese_endpoint", config.custom_vision.cheese_endpoint.as_deref()),
        ("translator.endpoint", config.translator.service.endpoint.as_deref()),
        ("ml.endpoint", config.ml.endpoint.as_deref()),
        ("forex.endpoint", config.forex.service.endpoint.as_deref()),
    ];

    for (key, endpoint) in endpoints {
        if let Some(endpoint) = endpoint {
            validate_http_url(key, endpoint)?;
        }
    }

    Ok(())
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn validate_translator(translator: &TranslatorConfig) -> Result<(), ConfigError> {
    if translator.targets.is_empty() {
        return Err(ConfigError::Validation(
            "translator.targets must list at least one language code".to_string(),
        ));
    }

    let malformed = translator.targets.iter().find(|code| {
        code.is_empty() || !code.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
    });
    if let Some(code) = malformed {
        return Err(ConfigError::Validation(format!(
            "translator.targets contains an invalid language code `{code}`"
        )));
    }

    Ok(())
}

fn validate_forex(forex: &ForexConfig) -> Result<(), ConfigError> {
    let valid_pair = forex
        .pair
        .split_once('_')
        .is_some_and(|(from, to)| from.len() == 3 && to.len() == 3);
    if !valid_pair {
        return Err(ConfigError::Validation(
            "forex.pair must look like `USD_COP` (two ISO currency codes)".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    if server.outbound_timeout_secs == 0 || server.outbound_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "server.outbound_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_alias(key: &str, alias: &str) -> Option<String> {
    read_env(key).or_else(|| read_env(alias))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    state: Option<StatePatch>,
    channel: Option<ChannelPatch>,
    luis: Option<LuisPatch>,
    qna: Option<QnaPatch>,
    vision: Option<EndpointPatch>,
    face: Option<FacePatch>,
    custom_vision: Option<CustomVisionPatch>,
    translator: Option<TranslatorPatch>,
    ml: Option<EndpointPatch>,
    forex: Option<ForexPatch>,
    storage: Option<StoragePatch>,
    certificates: Option<CertificatePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StatePatch {
    backend: Option<StateBackend>,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelPatch {
    app_id: Option<String>,
    app_password: Option<String>,
    oauth_connection_name: Option<String>,
    card_channel: Option<String>,
    bot_account_id: Option<String>,
    token_endpoint: Option<String>,
    token_service_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LuisPatch {
    app_id: Option<String>,
    api_key: Option<String>,
    host_name: Option<String>,
    spell_check_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QnaPatch {
    knowledge_base_id: Option<String>,
    endpoint_key: Option<String>,
    host: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EndpointPatch {
    endpoint: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FacePatch {
    #[serde(flatten)]
    service: EndpointPatch,
    person_group_id: Option<String>,
    person_id: Option<String>,
    person_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomVisionPatch {
    coffee_endpoint: Option<String>,
    cheese_endpoint: Option<String>,
    prediction_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslatorPatch {
    #[serde(flatten)]
    service: EndpointPatch,
    targets: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ForexPatch {
    #[serde(flatten)]
    service: EndpointPatch,
    source_url: Option<String>,
    pair: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    account: Option<String>,
    access_key: Option<String>,
    connection_string: Option<String>,
    table: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CertificatePatch {
    directory: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    outbound_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, StateBackend};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_leave_external_services_unconfigured() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(!config.luis.is_configured(), "luis should be unconfigured by default")?;
        ensure(!config.vision.is_configured(), "vision should be unconfigured by default")?;
        ensure(config.state.backend == StateBackend::Memory, "memory state by default")?;
        ensure(config.server.port == 3978, "default port should be 3978")?;
        ensure(config.translator.targets.len() == 5, "five translation targets by default")?;
        ensure(config.forex.pair == "USD_COP", "default forex pair should be USD_COP")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_TRANSLATOR_KEY", "translator-from-env");
        env::set_var("TEST_FOREX_KEY", "forex-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("tertulia.toml");
            fs::write(
                &path,
                r#"
[translator]
endpoint = "https://api.cognitive.microsofttranslator.com"
api_key = "${TEST_TRANSLATOR_KEY}"
targets = ["es", "en"]

[forex]
endpoint = "https://free.currconv.com"
api_key = "${TEST_FOREX_KEY}"
source_url = "https://www.currencyconverterapi.com"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let translator_key =
                config.translator.service.api_key.as_ref().map(|key| key.expose_secret());
            ensure(
                translator_key == Some("translator-from-env"),
                "translator key should be loaded from environment",
            )?;
            ensure(config.translator.targets == ["es", "en"], "targets should come from file")?;
            ensure(config.forex.service.is_configured(), "forex should be configured")?;
            Ok(())
        })();

        clear_vars(&["TEST_TRANSLATOR_KEY", "TEST_FOREX_KEY"]);
        result
    }

    #[test]
    fn legacy_env_names_are_accepted() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LuisAppId", "app-123");
        env::set_var("LuisAPIKey", "luis-key");
        env::set_var("LuisAPIHostName", "westus.api.cognitive.microsoft.com");
        env::set_var("ConnectionName", "aad-connection");
        env::set_var("TERTULIA_LOG_LEVEL", "warn");
        env::set_var("TERTULIA_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.luis.is_configured(), "luis should be configured from legacy names")?;
            ensure(
                config.channel.oauth_connection_name == "aad-connection",
                "oauth connection name should come from ConnectionName",
            )?;
            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "LuisAppId",
            "LuisAPIKey",
            "LuisAPIHostName",
            "ConnectionName",
            "TERTULIA_LOG_LEVEL",
            "TERTULIA_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TERTULIA_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("TERTULIA_FOREX_PAIR", "EUR_COP");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("tertulia.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[forex]
pair = "USD_MXN"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.forex.pair == "EUR_COP", "env forex pair should win over file")?;
            Ok(())
        })();

        clear_vars(&["TERTULIA_DATABASE_URL", "TERTULIA_FOREX_PAIR"]);
        result
    }

    #[test]
    fn partial_luis_settings_fail_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TERTULIA_LUIS_APP_ID", "app-only");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("luis.api_key")
            );
            ensure(has_message, "validation failure should mention the missing luis settings")
        })();

        clear_vars(&["TERTULIA_LUIS_APP_ID"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TERTULIA_SERVER_PORT", "not-a-port");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected invalid override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "TERTULIA_SERVER_PORT"),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["TERTULIA_SERVER_PORT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TERTULIA_VISION_API_KEY", "vision-secret-value");
        env::set_var("MicrosoftAppId", "app-id");
        env::set_var("MicrosoftAppPassword", "app-password-secret");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("vision-secret-value"),
                "debug output should not contain the vision key",
            )?;
            ensure(
                !debug.contains("app-password-secret"),
                "debug output should not contain the app password",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["TERTULIA_VISION_API_KEY", "MicrosoftAppId", "MicrosoftAppPassword"]);
        result
    }
}
