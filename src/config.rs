pub use self::parser::{
    BridgeConfig, Config, IrcConfig, LoggingConfig, MatrixConfig, MetricsConfig, PasteConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
