use regex::Regex;
use std::sync::OnceLock;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern"))
}

/// Battery `(level, temperature in °C)` from `dumpsys battery`.
pub fn parse_battery(output: &str) -> (Option<u8>, Option<f32>) {
    static LEVEL: OnceLock<Regex> = OnceLock::new();
    static TEMP: OnceLock<Regex> = OnceLock::new();
    let level_re = regex(&LEVEL, r"^\s*level:\s*(\d+)");
    let temp_re = regex(&TEMP, r"^\s*temperature:\s*(\d+)");

    let mut level = None;
    let mut temp = None;
    for line in output.lines() {
        if let Some(caps) = level_re.captures(line) {
            level = caps[1].parse::<u8>().ok();
        }
        if let Some(caps) = temp_re.captures(line) {
            // Reported in tenths of a degree.
            temp = caps[1].parse::<u32>().ok().map(|t| t as f32 / 10.0);
        }
    }
    (level, temp)
}

/// Total bytes received across all non-loopback interfaces in `/proc/net/dev`.
pub fn parse_rx_bytes(output: &str) -> u64 {
    static IFACE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&IFACE, r"^\s*([\w.-]+):\s*(\d+)");

    output
        .lines()
        .filter_map(|line| re.captures(line))
        .filter(|caps| &caps[1] != "lo")
        .filter_map(|caps| caps[2].parse::<u64>().ok())
        .sum()
}

/// File size from a single `ls -l` line.
pub fn parse_ls_size(output: &str) -> Option<u64> {
    let fields: Vec<&str> = output.lines().next()?.split_whitespace().collect();
    if fields.len() < 6 {
        return None;
    }
    fields[4].parse().ok()
}

/// Pids of processes named `name` in `ps` output.
pub fn parse_pids(output: &str, name: &str) -> Vec<u32> {
    output
        .lines()
        .skip(1)
        .filter(|line| line.split_whitespace().last() == Some(name))
        .filter_map(|line| line.split_whitespace().nth(1)?.parse().ok())
        .collect()
}

/// Whether `dumpsys window windows` shows a crash or USB-debugging dialog
/// that needs dismissing.
pub fn has_blocking_dialog(output: &str) -> bool {
    static DIALOG: OnceLock<Regex> = OnceLock::new();
    let re = regex(
        &DIALOG,
        r"Window #[^\n]*(Application Error:|systemui\.usb\.UsbDebuggingActivity)",
    );
    re.is_match(output)
}

/// Platform name from `ro.build.version.release`, e.g. `Android 14`.
pub fn parse_platform_version(output: &str) -> Option<String> {
    let version = output.trim();
    if version.is_empty() {
        None
    } else {
        Some(format!("Android {version}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_dumpsys_battery_when_parsed_should_read_level_and_temperature() {
        let out = "Current Battery Service state:\n  AC powered: false\n  level: 87\n  scale: 100\n  temperature: 312\n";
        assert_eq!(parse_battery(out), (Some(87), Some(31.2)));
        assert_eq!(parse_battery(""), (None, None));
    }

    #[test]
    fn given_proc_net_dev_when_parsed_should_skip_loopback() {
        let out = "Inter-|   Receive\n face |bytes    packets\n    lo: 5000 10 0 0\n wlan0: 1200 4 0 0\nrmnet_data0:300 1 0 0\n";
        assert_eq!(parse_rx_bytes(out), 1500);
    }

    #[test]
    fn given_ls_output_when_parsed_should_read_size_column() {
        let out = "-rw-rw-rw- 1 shell shell 1234567 2024-01-01 12:00 /data/local/tmp/tom_video.mp4\n";
        assert_eq!(parse_ls_size(out), Some(1_234_567));
        assert_eq!(parse_ls_size("ls: /x: No such file or directory"), None);
    }

    #[test]
    fn given_ps_output_when_parsed_should_match_exact_names() {
        let out = "USER PID PPID VSZ RSS WCHAN ADDR S NAME\nshell 4242 1 0 0 0 0 S screenrecord\nshell 4343 1 0 0 0 0 S perfetto\nshell 99 1 0 0 0 0 S screenrecorder\n";
        assert_eq!(parse_pids(out, "screenrecord"), vec![4242]);
    }

    #[test]
    fn given_window_dump_when_checked_should_spot_system_dialogs() {
        let crash = "  Window #3 Window{a1 u0 Application Error: com.example}:\n";
        let usb = "  Window #1 Window{b2 u0 com.android.systemui/com.android.systemui.usb.UsbDebuggingActivity}:\n";
        let normal = "  Window #0 Window{c3 u0 org.chromium.chrome/com.google.android.apps.chrome.Main}:\n";

        assert!(has_blocking_dialog(crash));
        assert!(has_blocking_dialog(usb));
        assert!(!has_blocking_dialog(normal));
    }
}
