pub const COMMAND_LINE_OPTIONS: &[&str] = &[
    "--no-default-browser-check",
    "--no-first-run",
    "--disable-background-downloads",
    "--disable-external-intent-requests",
    "--disable-fre",
];

pub const ENABLE_FEATURES: &[&str] = &["EnablePerfettoSystemTracing"];

pub const DISABLE_FEATURES: &[&str] = &[
    "AutofillServerCommunication",
    "CalculateNativeWinOcclusion",
    "HeavyAdPrivacyMitigations",
    "InterestFeedContentSuggestions",
    "MediaRouter",
    "OfflinePagesPrefetching",
    "OptimizationHints",
    "Translate",
];

pub const ENABLE_BLINK_FEATURES: &[&str] = &[];

/// Contents of the browser's command-line file. The first token stands in
/// for the program name and is ignored by the browser.
pub fn command_line() -> String {
    let mut args: Vec<String> = COMMAND_LINE_OPTIONS.iter().map(|s| s.to_string()).collect();
    if !ENABLE_FEATURES.is_empty() {
        args.push(format!("--enable-features={}", ENABLE_FEATURES.join(",")));
    }
    if !DISABLE_FEATURES.is_empty() {
        args.push(format!("--disable-features={}", DISABLE_FEATURES.join(",")));
    }
    if !ENABLE_BLINK_FEATURES.is_empty() {
        args.push(format!(
            "--enable-blink-features={}",
            ENABLE_BLINK_FEATURES.join(",")
        ));
    }
    format!("_ {}", args.join(" "))
}
