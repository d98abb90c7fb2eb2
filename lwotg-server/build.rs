fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile protobuf definitions.
    tonic_prost_build::configure()
        .build_client(false)
        .compile_protos(&["../proto/otg.proto"], &["../proto"])?;

    Ok(())
}
