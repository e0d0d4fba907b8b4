//! Terminal output utilities

use console::style;

/// Print an error message to stderr
pub fn print_error(message: &str) {
    eprintln!("{}: {}", style("error").red().bold(), message);
}

/// Print a warning message to stderr
pub fn print_warning(message: &str) {
    eprintln!("{}: {}", style("warning").yellow().bold(), message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{}: {}", style("success").green().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!();
    println!("{}", style(message).green());
}

/// Echo a command line before it runs
pub fn print_command(command: &str) {
    println!("{}", style(format!("Command : {}", command)).blue());
}

/// Print a boxed heading for a pipeline stage
pub fn print_banner(title: &str) {
    let rule = "*".repeat(70);
    println!("{}", style(&rule).dim());
    println!("{}", style(title).bold());
    println!("{}", style(&rule).dim());
}

/// Print a suspicious log line reported by the scanner
pub fn print_finding(location: &str, line: &str) {
    eprintln!(
        "{} {}",
        style(format!("From {} :", location)).red(),
        style(line.trim_end()).red()
    );
}
