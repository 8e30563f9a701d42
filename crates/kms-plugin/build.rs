//! Compiles the KMS v1beta1 protobuf contract into tonic server and client stubs.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc so builds do not depend on a system install.
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile(&["proto/service.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/service.proto");
    Ok(())
}
