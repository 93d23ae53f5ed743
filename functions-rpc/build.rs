//! Compiles `proto/functions.proto` with `tonic-build`/`prost`, the direct modern
//! successor of the teacher's own `protoc_grpcio`-driven `build.rs`
//! (`azure-functions-shared/build.rs`) and the same toolchain `golemcloud-golem`'s
//! `*-api-grpc` crates use (see `cloud-api-grpc/build.rs`).

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/functions.proto");
    tonic_build::configure().compile(&["proto/functions.proto"], &["proto"])?;
    Ok(())
}
