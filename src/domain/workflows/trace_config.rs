use serde::Serialize;

pub const CONFIG_JSON_PLACEHOLDER: &str = "%CONFIG_JSON%";
pub const ENABLED_CATEGORIES_PLACEHOLDER: &str = "%ENABLED_CATEGORIES%";

#[derive(Serialize)]
struct ChromeTraceConfig<'a> {
    record_mode: &'static str,
    included_categories: &'a [String],
    excluded_categories: [&'static str; 1],
    memory_dump_config: serde_json::Map<String, serde_json::Value>,
}

/// Perfetto text-proto templates, one per capture mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceTemplates {
    pub standard: String,
    pub cpu: String,
}

impl Default for TraceTemplates {
    fn default() -> Self {
        Self {
            standard: include_str!("../../../assets/trace_config.pbtx").to_string(),
            cpu: include_str!("../../../assets/trace_config_cpu.pbtx").to_string(),
        }
    }
}

impl TraceTemplates {
    pub fn for_job(&self, capture_cpu: bool) -> &str {
        if capture_cpu {
            &self.cpu
        } else {
            &self.standard
        }
    }
}

/// Fill a perfetto text-proto template for the requested categories.
///
/// Everything is excluded except the listed categories. The chrome config is
/// embedded as a JSON string literal, so it is encoded twice.
pub fn render_trace_config(template: &str, categories: &[String]) -> Result<String, serde_json::Error> {
    let config = ChromeTraceConfig {
        record_mode: "record-until-full",
        included_categories: categories,
        excluded_categories: ["*"],
        memory_dump_config: serde_json::Map::new(),
    };
    let config_json = serde_json::to_string(&serde_json::to_string(&config)?)?;

    let enabled: String = categories
        .iter()
        .map(|category| format!("            enabled_categories: \"{category}\"\n"))
        .collect();

    Ok(template
        .replace(CONFIG_JSON_PLACEHOLDER, &config_json)
        .replace(ENABLED_CATEGORIES_PLACEHOLDER, &enabled))
}
