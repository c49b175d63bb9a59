//! Job and style configuration, loadable from JSON.

use ks_core::KmlError;
use ks_core::KmlResult;
use ks_storage::KmlStore;
use ks_style::StyleRequest;
use ks_style::StyleScope;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;

pub const DEFAULT_INPUT: &str = "SMC.kml";
pub const DEFAULT_OUTPUT: &str = "modified.kml";
pub const DEFAULT_LINE_WIDTH: f64 = 4.0;
pub const DEFAULT_COLOR: &str = "#9929a3";
pub const DEFAULT_TRANSPARENCY: f64 = 50.0;

/// Style values written into every selected `Style`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct StyleConfig {
    pub line_width: f64,
    pub line_color: String,
    pub fill_color: String,
    pub fill_transparency: f64,
    pub style_scope: StyleScope,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            line_width: DEFAULT_LINE_WIDTH,
            line_color: DEFAULT_COLOR.to_owned(),
            fill_color: DEFAULT_COLOR.to_owned(),
            fill_transparency: DEFAULT_TRANSPARENCY,
            style_scope: StyleScope::default(),
        }
    }
}

impl StyleConfig {
    /// Checks every value up front so a bad config never reaches the tree.
    pub fn validate(&self) -> KmlResult<()> {
        ks_style::format_width(self.line_width)?;
        ks_color::encode(&self.line_color, self.fill_transparency)?;
        ks_color::encode(&self.fill_color, self.fill_transparency)?;
        Ok(())
    }

    pub fn to_request(&self) -> StyleRequest {
        StyleRequest {
            line_width: self.line_width,
            line_color: self.line_color.clone(),
            fill_color: self.fill_color.clone(),
            fill_transparency: self.fill_transparency,
            scope: self.style_scope,
        }
    }
}

/// One end-to-end transformation: read `input`, restyle, write `output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct JobConfig {
    /// File path or `http(s)` URL.
    pub input: String,
    pub output: PathBuf,
    pub style: StyleConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT.to_owned(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            style: StyleConfig::default(),
        }
    }
}

impl JobConfig {
    pub fn from_json_str(raw: &str) -> KmlResult<Self> {
        serde_json::from_str(raw).map_err(|error| KmlError::Config {
            message: format!("invalid job configuration: {error}"),
        })
    }

    pub fn from_json_file(path: &Path) -> KmlResult<Self> {
        Self::from_json_str(&KmlStore::new().read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::JobConfig;
    use super::StyleConfig;
    use ks_core::KmlError;
    use ks_style::StyleScope;
    use std::path::PathBuf;

    #[test]
    fn defaults_match_the_stock_transformation() {
        let job = JobConfig::default();
        assert_eq!(job.input, "SMC.kml");
        assert_eq!(job.output, PathBuf::from("modified.kml"));

        let request = job.style.to_request();
        assert_eq!(request.line_width, 4.0);
        assert_eq!(request.line_color, "#9929a3");
        assert_eq!(request.fill_color, "#9929a3");
        assert_eq!(request.fill_transparency, 50.0);
        assert_eq!(request.scope, StyleScope::Cascading);
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_keys() {
        let job = JobConfig::from_json_str(
            r##"{"input":"https://example.com/a.kml","style":{"lineColor":"#FF0000","styleScope":"allStyles"}}"##,
        );
        let job = match job {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(job.input, "https://example.com/a.kml");
        assert_eq!(job.output, PathBuf::from("modified.kml"));
        assert_eq!(job.style.line_color, "#FF0000");
        assert_eq!(job.style.fill_color, "#9929a3");
        assert_eq!(job.style.style_scope, StyleScope::AllStyles);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = JobConfig::from_json_str(r##"{"style":{"lineColour":"#FF0000"}}"##);
        assert!(matches!(result, Err(KmlError::Config { .. })));
    }

    #[test]
    fn validate_reports_bad_values() {
        let bad_color = StyleConfig {
            fill_color: "purple".to_owned(),
            ..StyleConfig::default()
        };
        assert!(matches!(
            bad_color.validate(),
            Err(KmlError::InvalidColorFormat { .. })
        ));

        let bad_width = StyleConfig {
            line_width: -1.0,
            ..StyleConfig::default()
        };
        assert!(matches!(bad_width.validate(), Err(KmlError::Config { .. })));

        let bad_transparency = StyleConfig {
            fill_transparency: 120.0,
            ..StyleConfig::default()
        };
        assert!(matches!(
            bad_transparency.validate(),
            Err(KmlError::InvalidTransparency { .. })
        ));

        assert!(StyleConfig::default().validate().is_ok());
    }

    #[test]
    fn json_file_loads_through_the_store() {
        let dir = match tempfile::tempdir() {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let path = dir.path().join("job.json");
        assert!(std::fs::write(&path, "\u{feff}{\"output\":\"out.kml\"}").is_ok());

        let job = match JobConfig::from_json_file(&path) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(job.output, PathBuf::from("out.kml"));

        let missing = JobConfig::from_json_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(KmlError::Io { .. })));
    }

    #[test]
    fn width_errors_match_the_editor() {
        let config = StyleConfig {
            line_width: f64::NAN,
            ..StyleConfig::default()
        };
        let from_config = config.validate().err().map(|error| error.to_string());
        let from_editor = ks_style::format_width(f64::NAN).err().map(|error| error.to_string());
        assert!(from_config.is_some());
        assert_eq!(from_config, from_editor);
    }
}
