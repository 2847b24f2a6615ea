use spibridge_core::BridgeConfig;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("spibridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let defaults = BridgeConfig::default();
    println!("name: spibridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SPIBRIDGE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("SPIBRIDGE_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("default_socket: {}", defaults.socket_path.display());
    println!("default_chunk_size: {}", defaults.chunk_size);

    Ok(SUCCESS)
}
