use spibridge_frame::RegisterAddress;

use crate::cmd::{BridgeArgs, ReadArgs};
use crate::exit::{bridge_error, CliResult, SUCCESS};
use crate::output::{print_result, OutputFormat, RegisterResult};

pub fn run(args: ReadArgs, bridge_args: &BridgeArgs, format: OutputFormat) -> CliResult<i32> {
    let mode = bridge_args.mode();
    let mut bridge = bridge_args.connect()?;
    let value = bridge
        .read(mode, bridge_args.mux_target, args.address)
        .map_err(|err| bridge_error("read failed", err))?;

    print_result(
        &RegisterResult {
            operation: "read",
            mode,
            mux_target: bridge_args.mux_target,
            address: RegisterAddress::new(args.address).get(),
            data: &[value],
        },
        format,
    );
    Ok(SUCCESS)
}
