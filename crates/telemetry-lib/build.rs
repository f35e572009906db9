//! Build script for generating protobuf code
//!
//! Code generation only runs with the `proto-gen` feature enabled; the
//! default build uses the message definitions checked into `src/proto`.

use std::path::PathBuf;
use std::process::Command;

const PROTO_FILE: &str = "../../proto/telemetry/v1/edges.proto";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed={}", PROTO_FILE);
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_PROTO_GEN");

    if std::env::var_os("CARGO_FEATURE_PROTO_GEN").is_none() {
        return Ok(());
    }

    let protoc_available =
        std::env::var("PROTOC").is_ok() || Command::new("protoc").arg("--version").output().is_ok();

    if !protoc_available {
        return Err("proto-gen feature enabled but protoc was not found; install protoc or set PROTOC".into());
    }

    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);

    // Messages only: the transport is served over HTTP by the server crate
    tonic_build::configure()
        .build_server(false)
        .build_client(false)
        .type_attribute(".", "#[derive(serde::Serialize, serde::Deserialize)]")
        .message_attribute(".", "#[serde(default)]")
        .enum_attribute(".", "#[serde(rename_all = \"snake_case\")]")
        .out_dir(&out_dir)
        .compile(&[PROTO_FILE], &["../../proto"])?;

    Ok(())
}
