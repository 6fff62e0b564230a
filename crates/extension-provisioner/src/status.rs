/// Parsed shape of a `pjsip show endpoint <ext>` CLI dump: just enough to
/// answer "is this endpoint registered" for `get_status`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExtensionStatus {
    pub extension: String,
    pub contacts: Vec<ContactState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ContactState {
    Available,
    Unavailable,
    Unknown,
}

/// Scans CLI output lines for `Contact:` rows and lifts the `(Avail)` /
/// `(Unavail)` token Asterisk prints after the contact URI.
pub fn parse_endpoint_status(extension: &str, cli_output: &str) -> ExtensionStatus {
    let mut contacts = Vec::new();
    for line in cli_output.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with("Contact:") {
            continue;
        }
        let lower = trimmed.to_ascii_lowercase();
        let state = if lower.contains("(avail") {
            ContactState::Available
        } else if lower.contains("(unavail") {
            ContactState::Unavailable
        } else {
            ContactState::Unknown
        };
        contacts.push(state);
    }
    ExtensionStatus { extension: extension.to_string(), contacts }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_available_contact() {
        let output = "Endpoint:  1001\n Contact:  1001/sip:1001@10.0.0.5:5060  5e3f (Avail)\n";
        let status = parse_endpoint_status("1001", output);
        assert_eq!(status.contacts, vec![ContactState::Available]);
    }

    #[test]
    fn no_contacts_is_empty() {
        let status = parse_endpoint_status("1001", "Endpoint:  1001\n  not registered\n");
        assert!(status.contacts.is_empty());
    }
}
