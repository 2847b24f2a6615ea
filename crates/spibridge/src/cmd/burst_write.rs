use std::fs;

use spibridge_frame::RegisterAddress;

use crate::cmd::{parse_hex, BridgeArgs, BurstWriteArgs};
use crate::exit::{bridge_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_result, OutputFormat, RegisterResult};

pub fn run(args: BurstWriteArgs, bridge_args: &BridgeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    if payload.is_empty() {
        return Err(CliError::new(USAGE, "burst payload must not be empty"));
    }

    let mode = bridge_args.mode();
    let mut bridge = bridge_args.connect()?;
    bridge
        .burst_write(mode, bridge_args.mux_target, args.address, &payload)
        .map_err(|err| bridge_error("burst write failed", err))?;

    print_result(
        &RegisterResult {
            operation: "burst-write",
            mode,
            mux_target: bridge_args.mux_target,
            address: RegisterAddress::new(args.address).get(),
            data: &payload,
        },
        format,
    );
    Ok(SUCCESS)
}

fn resolve_payload(args: &BurstWriteArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::new(USAGE, "one of --hex or --file is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_comes_from_hex() {
        let args = BurstWriteArgs {
            address: 0x10,
            hex: Some("a0 a1".to_string()),
            file: None,
        };
        assert_eq!(resolve_payload(&args).unwrap(), vec![0xA0, 0xA1]);
    }

    #[test]
    fn payload_comes_from_file() {
        let path = std::env::temp_dir().join(format!("spibridge-payload-{}", std::process::id()));
        fs::write(&path, [1u8, 2, 3]).unwrap();
        let args = BurstWriteArgs {
            address: 0x10,
            hex: None,
            file: Some(path.clone()),
        };
        assert_eq!(resolve_payload(&args).unwrap(), vec![1, 2, 3]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_reported() {
        let args = BurstWriteArgs {
            address: 0x10,
            hex: None,
            file: Some("/nonexistent/spibridge/payload.bin".into()),
        };
        let err = resolve_payload(&args).unwrap_err();
        assert!(err.message.contains("failed reading"));
    }
}
