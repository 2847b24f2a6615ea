use spibridge_frame::RegisterAddress;

use crate::cmd::{BridgeArgs, WriteArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_result, OutputFormat, RegisterResult};

pub fn run(args: WriteArgs, bridge_args: &BridgeArgs, format: OutputFormat) -> CliResult<i32> {
    let mode = bridge_args.mode();
    let mut bridge = bridge_args.connect()?;
    bridge
        .write(mode, bridge_args.mux_target, args.address, args.value)
        .map_err(|err| bridge_error("write failed", err))?;

    print_result(
        &RegisterResult {
            operation: "write",
            mode,
            mux_target: bridge_args.mux_target,
            address: RegisterAddress::new(args.address).get(),
            data: &[args.value],
        },
        format,
    );
    Ok(SUCCESS)
}
