/// Parsed User-Agent fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser_name: String,
    pub browser_version: Option<String>,
    pub os_name: String,
    pub os_version: Option<String>,
    pub device_type: String,
}

impl UserAgentInfo {
    /// `"Chrome 120.0.0.0"`, or just the name when the version is unknown.
    pub fn browser_label(&self) -> String {
        join_version(&self.browser_name, self.browser_version.as_deref())
    }

    pub fn os_label(&self) -> String {
        join_version(&self.os_name, self.os_version.as_deref())
    }
}

fn join_version(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("{name} {version}"),
        None => name.to_string(),
    }
}

/// woothee reports unknown fields as `"UNKNOWN"` or an empty string.
fn known(value: &str) -> Option<String> {
    if value.is_empty() || value == "UNKNOWN" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a `User-Agent` string via the `woothee` crate.
///
/// Returns `None` if the UA string is empty or `woothee` cannot classify it.
pub fn parse_user_agent(user_agent: &str) -> Option<UserAgentInfo> {
    if user_agent.trim().is_empty() {
        return None;
    }

    let result = woothee::parser::Parser::new().parse(user_agent)?;

    // woothee `category` maps to our device convention:
    //   "pc"         → "desktop"
    //   "smartphone" → "mobile"
    //   "mobilephone"→ "mobile"
    //   "tablet"     → "tablet"
    //   "crawler"    → "bot"
    //   everything else → "desktop"
    let device_type = match result.category {
        "smartphone" | "mobilephone" => "mobile",
        "tablet" => "tablet",
        "crawler" => "bot",
        _ => "desktop",
    }
    .to_string();

    Some(UserAgentInfo {
        browser_name: known(result.name).unwrap_or_else(|| "Unknown".to_string()),
        browser_version: known(&result.version),
        os_name: known(result.os).unwrap_or_else(|| "Unknown".to_string()),
        os_version: known(&result.os_version),
        device_type,
    })
}
