use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub broker: BrokerSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");

        let whatsapp = WhatsAppConfig {
            api_key: var_or("INFOBIP_API_KEY", ""),
            base_url: var_or("INFOBIP_BASE_URL", "https://api.infobip.com"),
            sender: var_or("INFOBIP_WHATSAPP_FROM", ""),
        };

        let llm = LlmConfig {
            api_key: var_or("OPENAI_API_KEY", ""),
            base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: var_or("OPENAI_MODEL", "gpt-4o"),
            transcription_model: var_or("OPENAI_TRANSCRIPTION_MODEL", "whisper-1"),
            max_tool_rounds: parse_number("AGENT_MAX_TOOL_ROUNDS", 6)?,
        };

        let storage = StorageConfig {
            access_key: var_or("AWS_ACCESS_KEY", ""),
            secret_key: var_or("AWS_SECRET_KEY", ""),
            region: var_or("AWS_REGION", "us-east-1"),
            bucket: var_or("S3_BUCKET", "broky-images"),
            folder: var_or("S3_FOLDER", "uploads"),
            endpoint: env::var("S3_ENDPOINT").ok().filter(|value| !value.trim().is_empty()),
        };

        let broker = BrokerSettings {
            broker_number: whatsapp.sender.clone(),
            template_language: var_or("BROKER_TEMPLATE_LANGUAGE", "es"),
            qr_template: var_or("BROKER_QR_TEMPLATE", "banner_qr_broky"),
            visit_request_template: var_or("BROKER_VISIT_TEMPLATE", "visit_request"),
            visit_duration_minutes: parse_number("BROKER_VISIT_MINUTES", 60)?,
            contract_template: PathBuf::from(var_or(
                "BROKER_CONTRACT_TEMPLATE",
                "resources/contracts/FORMATO-CONTRATO-DE-COMPRAVENTA.pdf",
            )),
            dedupe_deliveries: parse_flag("BROKER_DEDUPE_DELIVERIES", false)?,
            fallback_reply: BrokerSettings::DEFAULT_FALLBACK_REPLY.to_string(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            whatsapp,
            llm,
            storage,
            broker,
        })
    }

    /// Outbound adapters cannot be built without these; checked before serving traffic.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        let required = [
            ("INFOBIP_API_KEY", &self.whatsapp.api_key),
            ("INFOBIP_WHATSAPP_FROM", &self.whatsapp.sender),
            ("OPENAI_API_KEY", &self.llm.api_key),
            ("AWS_ACCESS_KEY", &self.storage.access_key),
            ("AWS_SECRET_KEY", &self.storage.secret_key),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing { key });
            }
        }
        Ok(())
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Infobip WhatsApp channel credentials.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub api_key: String,
    pub base_url: String,
    /// Broker number messages are sent from; also the target of property QR codes.
    pub sender: String,
}

/// OpenAI-compatible model endpoint used for agent turns and audio transcription.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub transcription_model: String,
    pub max_tool_rounds: usize,
}

/// Object storage for generated artifacts (QR banners, contracts).
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub bucket: String,
    pub folder: String,
    /// Path-style endpoint for S3-compatible stores; virtual-hosted AWS URLs when absent.
    pub endpoint: Option<String>,
}

/// Business knobs read by the conversation service and tools.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub broker_number: String,
    pub template_language: String,
    pub qr_template: String,
    pub visit_request_template: String,
    pub visit_duration_minutes: u32,
    pub contract_template: PathBuf,
    pub dedupe_deliveries: bool,
    pub fallback_reply: String,
}

impl BrokerSettings {
    pub const DEFAULT_FALLBACK_REPLY: &'static str =
        "Lo siento, tuvimos un problema procesando tu mensaje. ¿Puedes intentarlo de nuevo en unos minutos?";
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            broker_number: String::new(),
            template_language: "es".to_string(),
            qr_template: "banner_qr_broky".to_string(),
            visit_request_template: "visit_request".to_string(),
            visit_duration_minutes: 60,
            contract_template: PathBuf::from(
                "resources/contracts/FORMATO-CONTRATO-DE-COMPRAVENTA.pdf",
            ),
            dedupe_deliveries: false,
            fallback_reply: Self::DEFAULT_FALLBACK_REPLY.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidFlag { key: &'static str },
    Missing { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => write!(f, "{key} must be a positive integer"),
            ConfigError::InvalidFlag { key } => write!(f, "{key} must be true or false"),
            ConfigError::Missing { key } => write!(f, "{key} is not configured"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidFlag { .. }
            | ConfigError::Missing { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "INFOBIP_API_KEY",
            "INFOBIP_WHATSAPP_FROM",
            "OPENAI_API_KEY",
            "AWS_ACCESS_KEY",
            "AWS_SECRET_KEY",
            "AGENT_MAX_TOOL_ROUNDS",
            "BROKER_VISIT_MINUTES",
            "BROKER_DEDUPE_DELIVERIES",
            "S3_ENDPOINT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.llm.max_tool_rounds, 6);
        assert_eq!(config.broker.visit_duration_minutes, 60);
        assert!(!config.broker.dedupe_deliveries);
        assert!(config.storage.endpoint.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        env::remove_var("APP_HOST");
    }

    #[test]
    fn rejects_malformed_flags_and_numbers() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("BROKER_DEDUPE_DELIVERIES", "maybe");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidFlag {
                key: "BROKER_DEDUPE_DELIVERIES"
            })
        ));
        reset_env();
        env::set_var("AGENT_MAX_TOOL_ROUNDS", "-2");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                key: "AGENT_MAX_TOOL_ROUNDS"
            })
        ));
        reset_env();
    }

    #[test]
    fn require_credentials_names_first_missing_key() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("INFOBIP_API_KEY", "key");
        env::set_var("INFOBIP_WHATSAPP_FROM", "447908680611");
        let config = AppConfig::load().expect("config loads");
        match config.require_credentials() {
            Err(ConfigError::Missing { key }) => assert_eq!(key, "OPENAI_API_KEY"),
            other => panic!("expected missing key, got {other:?}"),
        }
        assert_eq!(config.broker.broker_number, "447908680611");
        reset_env();
    }
}
