use std::fmt::Display;

use bytesize::ByteSize;
use owo_colors::OwoColorize;

/// Contract code size limit (EIP-170).
pub const CODE_SIZE_LIMIT_KIB: u64 = 24;
/// Init code size limit (EIP-3860).
pub const INIT_CODE_SIZE_LIMIT_KIB: u64 = 48;

pub fn format_gas(gas: u128, color: bool) -> String {
    let gas: u64 = gas.try_into().unwrap_or(u64::MAX);
    let text = format!("{gas} gas");
    if !color {
        text
    } else if gas <= 3_000_000 {
        text.bright_green().to_string()
    } else if gas <= 7_000_000 {
        text.yellow().to_string()
    } else {
        text.bright_purple().to_string()
    }
}

/// Pretty-prints a code size based on its limits.
pub fn format_file_size(len: usize, mid: u64, max: u64, color: bool) -> String {
    let len = ByteSize::b(len as u64);
    if !color {
        return len.to_string();
    }

    let mid = ByteSize::kib(mid);
    let max = ByteSize::kib(max);
    if len <= mid {
        len.bright_green().to_string()
    } else if len <= max {
        len.yellow().to_string()
    } else {
        len.bright_purple().to_string()
    }
}

/// Highlights an address or hash in console output.
pub fn highlight(value: impl Display, color: bool) -> String {
    if color {
        value.bright_magenta().to_string()
    } else {
        value.to_string()
    }
}
