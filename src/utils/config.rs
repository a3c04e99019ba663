//! Configuration string parsing macro.

/// Parses config parameters from TOML format string into a config struct,
/// filling in unspecified fields with their default values. Rejects fields
/// that are not in the given list.
///
/// Example:
/// ```ignore
/// let config = parsed_config!(config_str => ServerConfig;
///                             discovery_port, hb_interval_ms)?;
/// ```
#[macro_export]
macro_rules! parsed_config {
    ($conf_str:expr => $conf_type:ty; $($field:ident),+ $(,)?) => {{
        (|| -> Result<$conf_type, $crate::RingChatError> {
            let mut config = <$conf_type>::default();
            if let Some(conf_str) = $conf_str {
                let table = conf_str
                    .parse::<toml::Table>()
                    .map_err(|e| $crate::RingChatError::msg(format!(
                        "error parsing config string: {}", e)))?;
                for key in table.keys() {
                    if ![$(stringify!($field)),+].contains(&key.as_str()) {
                        return Err($crate::RingChatError::msg(format!(
                            "unknown config field '{}'", key)));
                    }
                }
                $(
                    if let Some(value) = table.get(stringify!($field)) {
                        config.$field = value.clone().try_into().map_err(
                            |e| $crate::RingChatError::msg(format!(
                                "invalid value for field '{}': {}",
                                stringify!($field), e)))?;
                    }
                )+
            }
            Ok(config)
        })()
    }};
}
