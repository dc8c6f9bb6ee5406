//! Weather lookup tool — stub that returns canned weather data.
//!
//! In production this would call a real weather API. The stub derives
//! deterministic but varied conditions from the location name, so the
//! loop can be exercised end-to-end without network access.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use cogwork_core::context::ExecContext;
use cogwork_core::error::ToolError;
use cogwork_core::tool::{ParamSpec, ParamType, Tool, ToolOutput};

pub struct WeatherLookupTool;

#[async_trait]
impl Tool for WeatherLookupTool {
    fn name(&self) -> &str {
        "weather_lookup"
    }

    fn description(&self) -> &str {
        "Look up current weather for a location. Returns temperature, conditions, and precipitation chance."
    }

    fn parameters(&self) -> BTreeMap<String, ParamSpec> {
        BTreeMap::from([
            (
                "location".to_string(),
                ParamSpec::required(ParamType::String, "City name or location to look up"),
            ),
            (
                "units".to_string(),
                ParamSpec::optional(ParamType::String, "'metric' (default) or 'imperial'"),
            ),
        ])
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _ctx: &ExecContext,
    ) -> Result<ToolOutput, ToolError> {
        let location = arguments["location"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: "weather_lookup".into(),
                reason: "missing 'location' argument".into(),
            })?;
        let units = arguments["units"].as_str().unwrap_or("metric");

        let report = canned_report(location, units);
        let summary = format!(
            "{}: {}{}, {}, {}% chance of precipitation",
            report.location,
            report.temperature,
            report.units,
            report.conditions,
            report.precipitation_pct
        );
        let data = serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
        Ok(ToolOutput::ok(summary).with_data(data))
    }
}

#[derive(Serialize)]
struct WeatherReport {
    location: String,
    temperature: f64,
    units: String,
    conditions: String,
    precipitation_pct: u32,
}

/// Derive a deterministic report from the location name.
fn canned_report(location: &str, units: &str) -> WeatherReport {
    let seed: u32 = location
        .bytes()
        .fold(17u32, |acc, b| acc.rotate_left(5).wrapping_add(b as u32));

    let conditions = [
        "clear",
        "partly cloudy",
        "overcast",
        "drizzle",
        "rain",
        "thunderstorms",
        "snow",
        "fog",
    ];

    let celsius = ((seed % 45) as f64) - 10.0; // -10 to 34C
    let (temperature, unit_label) = if units == "imperial" {
        (celsius * 9.0 / 5.0 + 32.0, "F")
    } else {
        (celsius, "C")
    };

    WeatherReport {
        location: location.to_string(),
        temperature: (temperature * 10.0).round() / 10.0,
        units: unit_label.to_string(),
        conditions: conditions[(seed as usize / 11) % conditions.len()].to_string(),
        precipitation_pct: (seed % 101),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_returns_summary_and_data() {
        let tool = WeatherLookupTool;
        let ctx = ExecContext::new();
        let result = tool
            .execute(serde_json::json!({"location": "Tokyo"}), &ctx)
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.starts_with("Tokyo:"));
        assert!(result.data.unwrap()["temperature"].is_number());
    }

    #[tokio::test]
    async fn imperial_units() {
        let tool = WeatherLookupTool;
        let ctx = ExecContext::new();
        let result = tool
            .execute(
                serde_json::json!({"location": "New York", "units": "imperial"}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.output.contains('F'));
    }

    #[tokio::test]
    async fn deterministic_results() {
        let tool = WeatherLookupTool;
        let ctx = ExecContext::new();
        let first = tool
            .execute(serde_json::json!({"location": "London"}), &ctx)
            .await
            .unwrap();
        let second = tool
            .execute(serde_json::json!({"location": "London"}), &ctx)
            .await
            .unwrap();
        assert_eq!(first.output, second.output);
    }

    #[tokio::test]
    async fn missing_location_is_invalid_arguments() {
        let tool = WeatherLookupTool;
        let ctx = ExecContext::new();
        let err = tool.execute(serde_json::json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
