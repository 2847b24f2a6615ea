use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use spibridge_frame::AddressingMode;

const PREVIEW_BYTES: usize = 32;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Outcome of one register operation, as reported to the user.
pub struct RegisterResult<'a> {
    pub operation: &'static str,
    pub mode: AddressingMode,
    pub mux_target: u8,
    pub address: u8,
    pub data: &'a [u8],
}

#[derive(Serialize)]
struct RegisterOutput<'a> {
    schema_id: &'a str,
    operation: &'a str,
    mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mux_target: Option<u8>,
    address: u8,
    length: usize,
    data: String,
    timestamp: String,
}

pub fn print_result(result: &RegisterResult<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RegisterOutput {
                schema_id: "https://schemas.3leaps.dev/spibridge/cli/v1/register-result.schema.json",
                operation: result.operation,
                mode: mode_name(result.mode),
                mux_target: mux_target(result),
                address: result.address,
                length: result.data.len(),
                data: hex::encode(result.data),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let target = mux_target(result).map_or_else(|| "-".to_string(), |t| t.to_string());
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OPERATION", "MODE", "TARGET", "ADDRESS", "LENGTH", "DATA"])
                .add_row(vec![
                    result.operation.to_string(),
                    mode_name(result.mode).to_string(),
                    target,
                    format!("0x{:02x}", result.address),
                    result.data.len().to_string(),
                    data_preview(result.data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let target = mux_target(result).map_or_else(String::new, |t| format!(" target={t}"));
            println!(
                "{} mode={}{} address=0x{:02x} len={} data={}",
                result.operation,
                mode_name(result.mode),
                target,
                result.address,
                result.data.len(),
                data_preview(result.data)
            );
        }
        OutputFormat::Raw => print_raw(result.data),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn mode_name(mode: AddressingMode) -> &'static str {
    match mode {
        AddressingMode::Direct => "direct",
        AddressingMode::Multiplexed => "multiplexed",
    }
}


fn mux_target(result: &RegisterResult<'_>) -> Option<u8> {
    match result.mode {
        AddressingMode::Direct => None,
        AddressingMode::Multiplexed => Some(result.mux_target),
    }
}

fn data_preview(data: &[u8]) -> String {
    if data.len() <= PREVIEW_BYTES {
        return hex::encode(data);
    }
    format!("{}... ({} bytes)", hex::encode(&data[..PREVIEW_BYTES]), data.len())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
