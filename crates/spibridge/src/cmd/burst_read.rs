use spibridge_frame::RegisterAddress;

use crate::cmd::{BridgeArgs, BurstReadArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_result, OutputFormat, RegisterResult};

pub fn run(args: BurstReadArgs, bridge_args: &BridgeArgs, format: OutputFormat) -> CliResult<i32> {
    let mode = bridge_args.mode();
    let mut bridge = bridge_args.connect()?;
    let data = bridge
        .burst_read(mode, bridge_args.mux_target, args.address, args.length)
        .map_err(|err| bridge_error("burst read failed", err))?;

    print_result(
        &RegisterResult {
            operation: "burst-read",
            mode,
            mux_target: bridge_args.mux_target,
            address: RegisterAddress::new(args.address).get(),
            data: &data,
        },
        format,
    );
    Ok(SUCCESS)
}
