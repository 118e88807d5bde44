use crate::core::ConfigProvider;
use crate::domain::model::MergedField;
use crate::utils::error::{MergeError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub sources: SourcesConfig,
    pub merge: Option<MergeConfig>,
    pub aggregate: Option<AggregateConfig>,
    pub load: LoadConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub vehicles: String,
    pub updates: String,
    pub employment: String,
    pub personal_info: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    pub max_count: Option<usize>,
    pub max_recorded_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateConfig {
    pub group_by: Option<MergedField>,
    pub count_field: Option<MergedField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub write_merged: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// "compact" 或 "json"
    pub format: Option<String>,
    pub verbose: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MergeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MergeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MergeError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 是否輸出 JSON 格式日誌
    pub fn json_logs(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    pub fn verbose(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.verbose)
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn source_files(&self) -> Vec<PathBuf> {
        [
            &self.sources.vehicles,
            &self.sources.updates,
            &self.sources.employment,
            &self.sources.personal_info,
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect()
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn max_count(&self) -> Option<usize> {
        self.merge.as_ref().and_then(|m| m.max_count)
    }

    fn max_recorded_date(&self) -> Option<&str> {
        self.merge
            .as_ref()
            .and_then(|m| m.max_recorded_date.as_deref())
    }

    fn group_by(&self) -> MergedField {
        self.aggregate
            .as_ref()
            .and_then(|a| a.group_by)
            .unwrap_or(MergedField::Gender)
    }

    fn count_field(&self) -> MergedField {
        self.aggregate
            .as_ref()
            .and_then(|a| a.count_field)
            .unwrap_or(MergedField::VehicleMake)
    }

    fn write_merged(&self) -> bool {
        self.load.write_merged.unwrap_or(true)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_merge_settings(
            &self.source_files(),
            self.max_count(),
            self.max_recorded_date(),
        )?;
        validation::validate_path("load.output_path", &self.load.output_path)?;

        if let Some(format) = self.logging.as_ref().and_then(|l| l.format.as_deref()) {
            let valid_formats = ["compact", "json"];
            if !valid_formats.contains(&format) {
                return Err(MergeError::InvalidConfigValueError {
                    field: "logging.format".to_string(),
                    value: format.to_string(),
                    reason: format!("Valid formats: {}", valid_formats.join(", ")),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[sources]
vehicles = "data/vehicles.csv"
updates = "data/update_status.csv"
employment = "data/employment.csv"
personal_info = "data/personal_info.csv"

[merge]
max_count = 500
max_recorded_date = "01/03/2017"

[aggregate]
group_by = "language"

[load]
output_path = "./output"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.source_files()[2], PathBuf::from("data/employment.csv"));
        assert_eq!(config.max_count(), Some(500));
        assert_eq!(config.max_recorded_date(), Some("01/03/2017"));
        assert_eq!(config.group_by(), MergedField::Language);
        assert_eq!(config.count_field(), MergedField::VehicleMake);
        assert!(config.write_merged());
        assert!(!config.json_logs());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MERGE_ETL_TEST_DATA_DIR", "/srv/data");

        let toml_content = r#"
[sources]
vehicles = "${MERGE_ETL_TEST_DATA_DIR}/vehicles.csv"
updates = "${MERGE_ETL_TEST_DATA_DIR}/updates.csv"
employment = "${MERGE_ETL_TEST_DATA_DIR}/employment.csv"
personal_info = "${MERGE_ETL_TEST_DATA_DIR}/personal_info.csv"

[load]
output_path = "./output"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.sources.vehicles, "/srv/data/vehicles.csv");

        std::env::remove_var("MERGE_ETL_TEST_DATA_DIR");
    }

    #[test]
    fn test_config_validation() {
        let toml_content = BASIC.replace("01/03/2017", "2017-03-01");
        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = BASIC.replace("data/vehicles.csv", "data/vehicles.json");
        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_field_fails_parsing() {
        let toml_content = BASIC.replace("\"language\"", "\"favourite_colour\"");
        assert!(TomlConfig::from_toml_str(&toml_content).is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let toml_content = format!("{}\n[logging]\nformat = \"json\"\n", BASIC);
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert!(config.json_logs());
        assert!(config.validate().is_ok());
    }
}
