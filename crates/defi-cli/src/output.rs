use serde::Serialize;

pub const ENVELOPE_VERSION: &str = "v1";

/// Stable wrapper for every `--json` response.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub version: &'static str,
    pub success: bool,
    pub data: Option<&'a T>,
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub code: i32,
    pub message: String,
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_success<T: Serialize>(data: &T) -> anyhow::Result<()> {
    print_json(&Envelope {
        version: ENVELOPE_VERSION,
        success: true,
        data: Some(data),
        error: None,
    })
}

pub fn print_error(kind: &str, code: i32, message: &str) -> anyhow::Result<()> {
    print_json(&Envelope::<()> {
        version: ENVELOPE_VERSION,
        success: false,
        data: None,
        error: Some(ErrorBody {
            kind: kind.to_string(),
            code,
            message: message.to_string(),
        }),
    })
}

/// Aligned `label  value` lines.
pub fn print_fields(fields: &[(&str, String)]) {
    let width = fields.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in fields {
        println!("{:width$}  {}", key, value, width = width);
    }
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}
