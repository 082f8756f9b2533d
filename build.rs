fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::env::var("OUT_DIR")?;
    let descriptor_path = std::path::Path::new(&out_dir).join("memberlink_descriptor.bin");

    tonic_build::configure()
        .file_descriptor_set_path(&descriptor_path)
        .compile_protos(&["proto/memberlink.proto"], &["proto"])?;

    // Tell cargo to rerun if the proto file changes
    println!("cargo:rerun-if-changed=proto/memberlink.proto");

    Ok(())
}
