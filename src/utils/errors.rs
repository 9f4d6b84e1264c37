//! User-Friendly Error Formatting
//!
//! Turns the error that ends the binary into a message with troubleshooting
//! hints for the common cases.

use std::fmt::Write;

use crate::input::{classify_error, ErrorType, InputSendError};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    let send_error = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<InputSendError>());
    let error_msg = error.to_string();

    if let Some(send_error) = send_error {
        format_delivery_error(&mut output, send_error);
    } else if error_msg.contains("config") {
        format_config_error(&mut output);
    } else if error.chain().any(|cause| cause.is::<std::io::Error>()) {
        format_socket_error(&mut output);
    } else {
        format_generic_error(&mut output, &error_msg);
    }

    writeln!(&mut output).ok();
    writeln!(&mut output, "{RULE}").ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    writeln!(&mut output, "{RULE}").ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: lamco-input-sender -vv"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Set RUST_LOG=lamco_input_sender=trace to see every event"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();

    output
}

fn format_delivery_error(output: &mut String, error: &InputSendError) {
    match classify_error(error) {
        ErrorType::Caller => {
            writeln!(output, "Input Routing Error").ok();
            writeln!(output).ok();
            writeln!(
                output,
                "An event was addressed to channel {}, which no surface owns.",
                error.channel()
            )
            .ok();
            writeln!(output).ok();
            writeln!(output, "Common Causes:").ok();
            writeln!(output).ok();
            writeln!(output, "  1. The surface was removed before the event was sent").ok();
            writeln!(output, "     → Drop events for surfaces that are gone").ok();
            writeln!(output).ok();
            writeln!(output, "  2. The channel id is stale (fd reused)").ok();
            writeln!(output, "     → Look up the channel from the surface each time").ok();
        }
        ErrorType::Transport => {
            writeln!(output, "Input Transport Error").ok();
            writeln!(output).ok();
            writeln!(
                output,
                "Writing to channel {} failed in a way that cannot be retried.",
                error.channel()
            )
            .ok();
            if let Some(code) = error.raw_os_error() {
                writeln!(output, "OS error code: {}", code).ok();
            }
            writeln!(output).ok();
            writeln!(output, "Common Causes:").ok();
            writeln!(output).ok();
            writeln!(output, "  1. The channel fd was closed while still in use").ok();
            writeln!(output, "  2. The process ran out of socket buffer memory").ok();
            writeln!(output, "     → Check: cat /proc/sys/net/core/wmem_max").ok();
        }
    }
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "The configuration file could not be used.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. TOML syntax error").ok();
    writeln!(output, "     → Check brackets, quotes and key names").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Value out of range").ok();
    writeln!(output, "     → response_timeout_ms must be 1..=60000").ok();
    writeln!(output, "     → loopback.surfaces must be at least 1").ok();
}

fn format_socket_error(output: &mut String) {
    writeln!(output, "Socket Error").ok();
    writeln!(output).ok();
    writeln!(output, "Creating or polling a socket failed.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Too many open files").ok();
    writeln!(output, "     → Check: ulimit -n").ok();
    writeln!(output, "     → Lower loopback.surfaces").ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Operation Failed").ok();
    writeln!(output).ok();
    writeln!(output, "{}", error).ok();
}
