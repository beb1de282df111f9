//! Severity-coded console reporting.
//!
//! The pipeline has no machine-readable error channel; the operator reads
//! these lines. `[-]` marks a step in progress, `[+]` a success, `[!]` a
//! warning or failure, and external commands are echoed in italics before
//! they run.

use crossterm::style::Stylize;

/// A step has started.
pub fn step(msg: &str) {
    println!("{}", format!("[-] {msg}").blue());
}

/// A step finished successfully.
pub fn done(msg: &str) {
    println!("{}", format!("[+] {msg}").green());
}

/// Something unexpected but survivable happened.
pub fn warn(msg: &str) {
    println!("{}", format!("[!] {msg}").yellow());
}

/// A failure the operator has to act on.
pub fn fail(msg: &str) {
    println!("{}", format!("[!] {msg}").red());
}

/// Manual-recovery instructions accompanying a warning or failure.
pub fn hint(msg: &str) {
    println!("{}", format!("[!] {msg}").italic());
}

/// Echo an external command before running it.
pub fn command(cmd: &str) {
    println!("{}", cmd.italic());
}

/// Startup banner.
pub fn banner(version: &str) {
    println!(
        "{}",
        format!(
            "\nFirmware emulation pipeline v{version}\n\
             Extracts a root filesystem from a firmware image, infers its\n\
             network layout and boots it in an emulator by sequencing the\n\
             analysis-toolkit scripts.\n"
        )
        .bold()
    );
}
