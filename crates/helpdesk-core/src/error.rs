use std::fmt;

/// Machine-readable error codes for scripts and front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotConfigured,
    ConfigParseError,
    MissingToken,
    TicketNotFound,
    InvalidStateTransition,
    ActionNotPermitted,
    InvalidChoice,
    AttachmentTooLarge,
    AttachmentNotFound,
    EmptyContent,
    TransportFailure,
    ServerRejected,
    UnexpectedResponse,
    WorkspaceNotLoaded,
    WorkspaceClosed,
    FileReadFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotConfigured => "E1001",
            Self::ConfigParseError => "E1002",
            Self::MissingToken => "E1003",
            Self::TicketNotFound => "E2001",
            Self::InvalidStateTransition => "E2002",
            Self::ActionNotPermitted => "E2003",
            Self::InvalidChoice => "E2004",
            Self::AttachmentTooLarge => "E2005",
            Self::AttachmentNotFound => "E2006",
            Self::EmptyContent => "E2007",
            Self::TransportFailure => "E4001",
            Self::ServerRejected => "E4002",
            Self::UnexpectedResponse => "E4003",
            Self::WorkspaceNotLoaded => "E5001",
            Self::WorkspaceClosed => "E5002",
            Self::FileReadFailed => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotConfigured => "API base URL not configured",
            Self::ConfigParseError => "Config file parse error",
            Self::MissingToken => "Access token missing",
            Self::TicketNotFound => "Ticket not found",
            Self::InvalidStateTransition => "Invalid status transition",
            Self::ActionNotPermitted => "Action not permitted for this user",
            Self::InvalidChoice => "Invalid impact/priority value",
            Self::AttachmentTooLarge => "Attachment too large",
            Self::AttachmentNotFound => "Staged attachment not found",
            Self::EmptyContent => "Nothing to send",
            Self::TransportFailure => "Request did not reach the server",
            Self::ServerRejected => "Server rejected the request",
            Self::UnexpectedResponse => "Unexpected server response",
            Self::WorkspaceNotLoaded => "Ticket workspace not loaded",
            Self::WorkspaceClosed => "Ticket workspace closed",
            Self::FileReadFailed => "Attachment file could not be read",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotConfigured => Some("Set HELPDESK_API_URL or api_url in config.toml."),
            Self::ConfigParseError => Some("Fix syntax in ~/.config/helpdesk/config.toml and retry."),
            Self::MissingToken => {
                Some("Run `hd token set <token>` or export HELPDESK_TOKEN. Please log in.")
            }
            Self::TicketNotFound => Some("Check the ticket number and try again."),
            Self::InvalidStateTransition => Some(
                "Follow the lifecycle: open -> working in progress -> waiting for user -> resolved -> closed.",
            ),
            Self::ActionNotPermitted => Some("Only the ticket assignee may perform this action."),
            Self::InvalidChoice => Some("Run `hd choices` to list valid impact and priority values."),
            Self::AttachmentTooLarge => Some("Each file must be less than 10MB."),
            Self::AttachmentNotFound => None,
            Self::EmptyContent => Some("Provide message text or at least one attachment."),
            Self::TransportFailure => Some("Check network connectivity and the API base URL."),
            Self::ServerRejected => None,
            Self::UnexpectedResponse => Some("Check that the client and server versions match."),
            Self::WorkspaceNotLoaded => Some("Reload the ticket before acting on it."),
            Self::WorkspaceClosed => None,
            Self::FileReadFailed => Some("Check the file path and read permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 17] = [
        ErrorCode::NotConfigured,
        ErrorCode::ConfigParseError,
        ErrorCode::MissingToken,
        ErrorCode::TicketNotFound,
        ErrorCode::InvalidStateTransition,
        ErrorCode::ActionNotPermitted,
        ErrorCode::InvalidChoice,
        ErrorCode::AttachmentTooLarge,
        ErrorCode::AttachmentNotFound,
        ErrorCode::EmptyContent,
        ErrorCode::TransportFailure,
        ErrorCode::ServerRejected,
        ErrorCode::UnexpectedResponse,
        ErrorCode::WorkspaceNotLoaded,
        ErrorCode::WorkspaceClosed,
        ErrorCode::FileReadFailed,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let text = code.code();
            assert_eq!(text.len(), 5);
            assert!(text.starts_with('E'));
            assert!(text.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn display_matches_code() {
        assert_eq!(ErrorCode::MissingToken.to_string(), "E1003");
    }
}
