use crate::logger::{log_error, log_info};
use std::fmt::Write;
use std::process::{Command, Stdio};

/// Form-encodes a query component: unreserved characters stay, spaces
/// become `+`, every other byte becomes `%XX`.
pub fn encode_query_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                let _ = write!(out, "%{b:02X}");
            }
        }
    }
    out
}

pub fn search_query(package_name: &str) -> String {
    format!("What is {} for?", package_name)
}

/// Fills `{query}` in the template. Templates without the placeholder get
/// the query appended.
pub fn search_url(template: &str, package_name: &str) -> String {
    let encoded = encode_query_component(&search_query(package_name));
    if template.contains("{query}") {
        template.replace("{query}", &encoded)
    } else {
        format!("{}{}", template, encoded)
    }
}

fn opener_command(url: &str) -> Command {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut start = Command::new("cmd");
        start.args(["/c", "start", ""]);
        start
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };
    cmd.arg(url);
    cmd
}

/// Opens `url` in the default browser without waiting for it.
pub fn open_url(url: &str) -> Result<(), String> {
    log_info(&format!("Opening {}", url));
    opener_command(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|mut child| {
            // reap the opener so it does not linger as a zombie
            std::thread::spawn(move || {
                let _ = child.wait();
            });
        })
        .map_err(|e| {
            let err = format!("Failed to open browser: {}", e);
            log_error(&err);
            err
        })
}
