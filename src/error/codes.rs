/// Error code registry for gitbridge
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Lock errors
/// - 4000-4999: Execution errors
/// - 5000-5999: Transport errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_TOML: u16 = 1002;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;
    pub const CONFIG_PATH_ERROR: u16 = 1006;

    // Lock errors (2000-2999)
    pub const LOCK_GENERIC: u16 = 2000;
    pub const LOCK_TIMEOUT: u16 = 2001;
    pub const LOCK_ABANDONED: u16 = 2002;

    // Execution errors (4000-4999)
    pub const EXEC_GENERIC: u16 = 4000;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 4001;
    pub const EXEC_SUBPROCESS_FAILED: u16 = 4003;
    pub const EXEC_SIGNAL_RECEIVED: u16 = 4005;
    pub const EXEC_SPAWN_FAILED: u16 = 4007;
    pub const EXEC_OUTPUT_ERROR: u16 = 4008;
    pub const EXEC_ENVIRONMENT_ERROR: u16 = 4010;

    // Transport errors (5000-5999)
    pub const TRANSPORT_GENERIC: u16 = 5000;
    pub const TRANSPORT_REMOTE_ERROR: u16 = 5001;
    pub const TRANSPORT_CLOSED: u16 = 5002;
    pub const TRANSPORT_RENDEZVOUS: u16 = 5003;
    pub const TRANSPORT_CODEC: u16 = 5005;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
    pub const OTHER_INTERNAL_ERROR: u16 = 9004;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        1000 => "Generic configuration error",
        1001 => "Configuration file not found",
        1002 => "Invalid TOML syntax in configuration",
        1005 => "Invalid value in configuration",
        1006 => "Configuration path error",

        2000 => "Generic lock error",
        2001 => "Timed out waiting for the command lock",
        2002 => "Lock waiter was abandoned",

        4000 => "Generic execution error",
        4001 => "Command not found",
        4003 => "Subprocess failed",
        4005 => "Command received signal",
        4007 => "Failed to spawn subprocess",
        4008 => "Command output error",
        4010 => "Command environment error",

        5000 => "Generic transport error",
        5001 => "Error reported by the stream producer",
        5002 => "Stream endpoint closed",
        5003 => "Stream rendezvous failed",
        5005 => "Malformed stream message",

        9000 => "Generic error",
        9004 => "Internal error",

        _ => "Unknown error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_ranges() {
        assert!(ErrorCode::CONFIG_GENERIC >= 1000 && ErrorCode::CONFIG_GENERIC < 2000);
        assert!(ErrorCode::LOCK_GENERIC >= 2000 && ErrorCode::LOCK_GENERIC < 3000);
        assert!(ErrorCode::EXEC_GENERIC >= 4000 && ErrorCode::EXEC_GENERIC < 5000);
        assert!(ErrorCode::TRANSPORT_GENERIC >= 5000 && ErrorCode::TRANSPORT_GENERIC < 6000);
        assert!(ErrorCode::OTHER_GENERIC >= 9000 && ErrorCode::OTHER_GENERIC < 10000);
    }

    #[test]
    fn test_error_code_descriptions() {
        assert_eq!(describe_error_code(1001), "Configuration file not found");
        assert_eq!(
            describe_error_code(ErrorCode::LOCK_TIMEOUT),
            "Timed out waiting for the command lock"
        );
        assert_eq!(describe_error_code(65535), "Unknown error code");
    }
}
