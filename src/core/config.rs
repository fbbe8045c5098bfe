use std::{env, fs, path::PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:3000",
    "http://localhost:8080",
];

const DEFAULT_TRACKS: &[&str] = &["Science Physique", "SVT", "Sciences Math"];

/// Development bypass for the access-code store. Every use is logged at
/// warn level, and the flag defaults to off in production.
pub(crate) const FALLBACK_ACCESS_CODE: &str = "EXAM2024";

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    server: ServerSettings,
    runtime: RuntimeSettings,
    api: ApiSettings,
    security: SecuritySettings,
    cors: CorsSettings,
    database: DatabaseSettings,
    webhooks: WebhookSettings,
    generation: GenerationSettings,
    correction: CorrectionSettings,
    auth: AuthSettings,
    exam: ExamSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
struct ServerSettings {
    host: ServerHost,
    port: ServerPort,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_v1_str: String,
}

#[derive(Debug, Clone)]
pub(crate) struct SecuritySettings {
    pub(crate) secret_key: String,
    pub(crate) access_token_expire_minutes: u64,
    pub(crate) algorithm: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) postgres_server: String,
    pub(crate) postgres_port: u16,
    pub(crate) postgres_user: String,
    pub(crate) postgres_password: String,
    pub(crate) postgres_db: String,
    pub(crate) database_url: Option<String>,
}

/// Outbound endpoints of the workflow service that generates and
/// corrects exams.
#[derive(Debug, Clone)]
pub(crate) struct WebhookSettings {
    pub(crate) generation_url: String,
    pub(crate) correction_url: String,
    pub(crate) request_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct GenerationSettings {
    pub(crate) poll_interval_seconds: u64,
    pub(crate) max_poll_attempts: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct CorrectionSettings {
    pub(crate) poll_interval_seconds: u64,
    pub(crate) max_poll_attempts: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct AuthSettings {
    pub(crate) fallback_code: String,
    pub(crate) fallback_enabled: bool,
    /// Codes upserted as active at startup, for environments without an
    /// admin surface to manage the table.
    pub(crate) seed_codes: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ExamSettings {
    pub(crate) duration_minutes: u64,
    pub(crate) tracks: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone)]
struct ServerHost(String);

#[derive(Debug, Clone, Copy)]
struct ServerPort(u16);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid server host: {0}")]
    InvalidHost(String),
    #[error("invalid server port: {0}")]
    InvalidPort(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required setting: {0}")]
    MissingSecret(&'static str),
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("BACPORTAL_HOST", "0.0.0.0");
        let port = env_or_default("BACPORTAL_PORT", "8000");

        let environment = parse_environment(
            env_optional("BACPORTAL_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("BACPORTAL_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Bacportal API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "bacportal");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "bacportal_db");
        let database_url = env_optional("DATABASE_URL");

        let generation_url = env_or_default(
            "GENERATION_WEBHOOK_URL",
            "http://localhost:5678/webhook-test/generation",
        );
        let correction_url = env_or_default(
            "CORRECTION_WEBHOOK_URL",
            "http://localhost:5678/webhook-test/correction",
        );
        let request_timeout_seconds = parse_u64(
            "WEBHOOK_TIMEOUT_SECONDS",
            env_or_default("WEBHOOK_TIMEOUT_SECONDS", "30"),
        )?;

        let generation = GenerationSettings {
            poll_interval_seconds: parse_u64(
                "GENERATION_POLL_INTERVAL_SECONDS",
                env_or_default("GENERATION_POLL_INTERVAL_SECONDS", "3"),
            )?,
            max_poll_attempts: parse_u32(
                "GENERATION_MAX_POLL_ATTEMPTS",
                env_or_default("GENERATION_MAX_POLL_ATTEMPTS", "30"),
            )?,
        };

        let correction = CorrectionSettings {
            poll_interval_seconds: parse_u64(
                "CORRECTION_POLL_INTERVAL_SECONDS",
                env_or_default("CORRECTION_POLL_INTERVAL_SECONDS", "3"),
            )?,
            max_poll_attempts: parse_u32(
                "CORRECTION_MAX_POLL_ATTEMPTS",
                env_or_default("CORRECTION_MAX_POLL_ATTEMPTS", "30"),
            )?,
        };

        let fallback_code = env_or_default("ACCESS_FALLBACK_CODE", FALLBACK_ACCESS_CODE);
        let fallback_enabled = env_optional("ACCESS_FALLBACK_ENABLED")
            .map(|value| parse_bool(&value))
            .unwrap_or(!environment.is_production());
        let seed_codes = parse_string_list(env_optional("ACCESS_CODES_SEED"), &[]);

        let duration_minutes = parse_u64(
            "EXAM_DURATION_MINUTES",
            env_or_default("EXAM_DURATION_MINUTES", "120"),
        )?;
        let tracks = parse_string_list(env_optional("EXAM_TRACKS"), DEFAULT_TRACKS);

        let log_level = env_or_default("BACPORTAL_LOG_LEVEL", "info");
        let json = env_optional("BACPORTAL_LOG_JSON")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let prometheus_enabled = env_optional("PROMETHEUS_ENABLED")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            webhooks: WebhookSettings { generation_url, correction_url, request_timeout_seconds },
            generation,
            correction,
            auth: AuthSettings { fallback_code, fallback_enabled, seed_codes },
            exam: ExamSettings { duration_minutes, tracks },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn webhooks(&self) -> &WebhookSettings {
        &self.webhooks
    }

    pub(crate) fn generation(&self) -> &GenerationSettings {
        &self.generation
    }

    pub(crate) fn correction(&self) -> &CorrectionSettings {
        &self.correction
    }

    pub(crate) fn auth(&self) -> &AuthSettings {
        &self.auth
    }

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("GENERATION_POLL_INTERVAL_SECONDS", self.generation.poll_interval_seconds),
            ("CORRECTION_POLL_INTERVAL_SECONDS", self.correction.poll_interval_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue { field, value: "0".to_string() });
            }
        }
        for (field, value) in [
            ("GENERATION_MAX_POLL_ATTEMPTS", self.generation.max_poll_attempts),
            ("CORRECTION_MAX_POLL_ATTEMPTS", self.correction.max_poll_attempts),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue { field, value: "0".to_string() });
            }
        }
        if self.exam.tracks.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_TRACKS",
                value: String::from("<empty>"),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.webhooks.generation_url.is_empty() {
            return Err(ConfigError::MissingSecret("GENERATION_WEBHOOK_URL"));
        }
        if self.webhooks.correction_url.is_empty() {
            return Err(ConfigError::MissingSecret("CORRECTION_WEBHOOK_URL"));
        }

        Ok(())
    }
}

impl DatabaseSettings {
    pub(crate) fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_server,
            self.postgres_port,
            self.postgres_db
        )
    }
}

impl ServerHost {
    fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }
        Ok(Self(value))
    }
}

impl ServerPort {
    fn parse(value: String) -> Result<Self, ConfigError> {
        let parsed: u16 = value.parse().map_err(|_| ConfigError::InvalidPort(value.clone()))?;
        if parsed == 0 {
            return Err(ConfigError::InvalidPort(value));
        }
        Ok(Self(parsed))
    }
}

fn env_optional(name: &str) -> Option<String> {
    env::var(name).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True" | "yes" | "YES" | "on" | "ON")
}

fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_environment(raw: Option<String>) -> Environment {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("prod") | Some("production") => Environment::Production,
        Some("staging") => Environment::Staging,
        Some("test") | Some("testing") => Environment::Test,
        _ => Environment::Development,
    }
}

/// Accepts a JSON array or a comma-separated list; empty input falls
/// back to the development defaults.
fn parse_cors_origins(raw: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect());
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(trimmed)
            .map_err(|err| ConfigError::InvalidCors(err.to_string()));
    }

    Ok(trimmed
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

fn parse_string_list(raw: Option<String>, defaults: &[&str]) -> Vec<String> {
    let parsed: Vec<String> = raw
        .map(|value| {
            value
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if parsed.is_empty() {
        defaults.iter().map(|item| item.to_string()).collect()
    } else {
        parsed
    }
}

/// Persist a generated secret next to the manifest so dev restarts keep
/// issued tokens valid.
fn load_or_create_secret_key() -> String {
    let path = secret_file_path();
    if let Ok(existing) = fs::read_to_string(&path) {
        let trimmed = existing.trim().to_string();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }

    let generated = generate_secret_key();
    if let Err(err) = fs::write(&path, &generated) {
        tracing::warn!(error = %err, "Failed to persist generated secret key");
    }
    generated
}

fn generate_secret_key() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn secret_file_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".secret_key")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cors_origins_json() {
        let raw = "[\"http://a\",\"http://b\"]".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors json");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_csv() {
        let raw = "http://a, http://b".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors csv");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_defaults_on_empty() {
        let parsed = parse_cors_origins(Some(" ".to_string())).expect("cors empty");
        let defaults: Vec<String> =
            DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect();
        assert_eq!(parsed, defaults);
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn parse_environment_variants() {
        assert_eq!(parse_environment(Some("prod".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("production".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("staging".to_string())), Environment::Staging);
        assert_eq!(parse_environment(Some("testing".to_string())), Environment::Test);
        assert_eq!(parse_environment(None), Environment::Development);
    }

    #[test]
    fn parse_string_list_without_defaults_yields_empty() {
        assert!(parse_string_list(None, &[]).is_empty());
        assert_eq!(parse_string_list(Some("ALPHA, BETA,".to_string()), &[]), vec!["ALPHA", "BETA"]);
    }

    #[test]
    fn parse_string_list_falls_back_to_defaults() {
        assert_eq!(
            parse_string_list(None, DEFAULT_TRACKS),
            vec!["Science Physique", "SVT", "Sciences Math"]
        );
        assert_eq!(
            parse_string_list(Some("SVT , Sciences Math".to_string()), DEFAULT_TRACKS),
            vec!["SVT", "Sciences Math"]
        );
    }
}
