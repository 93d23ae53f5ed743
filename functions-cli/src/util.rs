//! Colored progress output, carried over from the teacher's own `util.rs` almost
//! verbatim (`print_running`/`print_success`/`print_failure`), plus the table renderer
//! the CLI's `list`/`describe` commands share.

use colored::Colorize;

pub fn print_running(message: &str) {
    print!("{} {}", "->".cyan(), message);
}

pub fn print_success() {
    println!(" {}", "done".green());
}

pub fn print_failure() {
    println!(" {}", "failed".red());
}

pub fn print_error(message: &str) {
    eprintln!("{}: {}", "error".red().bold(), message);
}

/// Renders rows under fixed `Name | Trigger | Resource | URL` headers (§4.7).
pub fn print_function_table(rows: &[[String; 4]]) {
    let headers = ["Name", "Trigger", "Resource", "URL"];
    let mut widths = headers.map(str::len);
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_line.join("  ").bold());

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:width$}", cell, width = widths[i]))
            .collect();
        println!("{}", line.join("  "));
    }
}
