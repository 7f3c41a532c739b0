//! Binary size check
//!
//! Runs `recipe.size.pattern` and sums the sizes matched by the platform's
//! `recipe.size.regex` (program), `recipe.size.regex.data` (static data) and
//! `recipe.size.regex.eeprom` patterns, then compares them with the board's
//! `upload.maximum_size` and `upload.maximum_data_size`.

use regex::Regex;
use tracing::debug;

use crate::config::defaults::DEFAULT_WARN_DATA_PERCENTAGE;
use crate::core::logger::BuildLogger;
use crate::core::properties::PropertiesMap;
use crate::core::recipe::RecipeRunner;
use crate::error::StageError;

/// Measured sizes of the linked binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeReport {
    pub text: u64,
    pub max_text: u64,
    pub data: Option<u64>,
    pub max_data: Option<u64>,
    pub eeprom: Option<u64>,
}

/// Sum of the first capture group of every match of `pattern`
///
/// Patterns are applied in multi-line mode, as platforms write them for
/// line-oriented `size` output.
pub fn compute_size(pattern: &str, output: &str) -> Result<u64, StageError> {
    let re = Regex::new(&format!("(?m){pattern}"))
        .map_err(|e| StageError::Other(format!("invalid size regex '{pattern}': {e}")))?;
    Ok(re
        .captures_iter(output)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().trim().parse::<u64>().ok())
        .sum())
}

fn parse_limit(props: &PropertiesMap, key: &str) -> Result<Option<u64>, StageError> {
    match props.get(key).map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| StageError::Other(format!("invalid {key}: {value}"))),
    }
}

/// Measure the binary; `None` when the board declares no program size limit
pub fn measure(
    props: &PropertiesMap,
    recipes: &RecipeRunner<'_>,
) -> Result<Option<SizeReport>, StageError> {
    let Some(max_text) = parse_limit(props, "upload.maximum_size")? else {
        debug!("No upload.maximum_size, skipping size check");
        return Ok(None);
    };
    let max_data = parse_limit(props, "upload.maximum_data_size")?;

    let output = recipes.run_recipe(props, "recipe.size.pattern")?;
    let output = output.combined();

    let pattern = props
        .get("recipe.size.regex")
        .ok_or_else(|| StageError::MissingProperty {
            key: "recipe.size.regex".into(),
        })?;
    let text = compute_size(pattern, &output)?;
    let data = props
        .get("recipe.size.regex.data")
        .map(|p| compute_size(p, &output))
        .transpose()?;
    let eeprom = props
        .get("recipe.size.regex.eeprom")
        .map(|p| compute_size(p, &output))
        .transpose()?;

    Ok(Some(SizeReport {
        text,
        max_text,
        data,
        max_data,
        eeprom,
    }))
}

fn percent(value: u64, max: u64) -> u64 {
    if max == 0 {
        0
    } else {
        value.saturating_mul(100) / max
    }
}

/// Print the report and enforce the limits
pub fn check(
    report: &SizeReport,
    props: &PropertiesMap,
    logger: &dyn BuildLogger,
) -> Result<(), StageError> {
    logger.info(&format!(
        "Sketch uses {} bytes ({}%) of program storage space. Maximum is {} bytes.",
        report.text,
        percent(report.text, report.max_text),
        report.max_text
    ));

    if let (Some(data), Some(max_data)) = (report.data, report.max_data) {
        logger.info(&format!(
            "Global variables use {data} bytes ({}%) of dynamic memory, leaving {} bytes \
             for local variables. Maximum is {max_data} bytes.",
            percent(data, max_data),
            max_data.saturating_sub(data)
        ));
    }

    if report.text > report.max_text {
        logger.warn(
            "Sketch too big; see https://support.arduino.cc/hc/en-us/articles/360013825179 \
             for tips on reducing it.",
        );
        return Err(StageError::SizeExceeded {
            section: "text".into(),
            size: report.text,
            max: report.max_text,
        });
    }

    if let (Some(data), Some(max_data)) = (report.data, report.max_data) {
        if data > max_data {
            logger.warn(
                "Not enough memory; see https://support.arduino.cc/hc/en-us/articles/360013825179 \
                 for tips on reducing your footprint.",
            );
            return Err(StageError::SizeExceeded {
                section: "data".into(),
                size: data,
                max: max_data,
            });
        }

        let threshold = props
            .get("build.warn_data_percentage")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_WARN_DATA_PERCENTAGE);
        if percent(data, max_data) >= threshold {
            logger.warn("Low memory available, stability problems may occur.");
        }
    }
    Ok(())
}
