use std::env;

const PROTOS: &[&str] = &[
    "common/common.proto",
    "msp/identities.proto",
    "peer/chaincode.proto",
    "peer/proposal.proto",
    "peer/proposal_response.proto",
    "peer/transaction.proto",
    "gateway/gateway.proto",
];

/// Regenerates the committed Rust bindings under `src/generated`.
///
/// Only runs when `BUILD_PROTO=1`, so regular builds never need the `.proto` sources or a
/// protobuf toolchain.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo::rerun-if-env-changed=BUILD_PROTO");

    if env::var("BUILD_PROTO").unwrap_or_default() != "1" {
        return Ok(());
    }

    let generated_dir = "src/generated";
    fs_err::create_dir_all(generated_dir)?;

    let file_descriptors = protox::compile(PROTOS, ["proto"])?;

    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .out_dir(generated_dir)
        .compile_fds(file_descriptors)?;

    for proto in PROTOS {
        println!("cargo::rerun-if-changed=proto/{proto}");
    }

    Ok(())
}
