fn main() {
    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let config = cbindgen::Config::from_file("cbindgen.toml").unwrap_or_default();

    println!("cargo:rerun-if-changed=src/ffi.rs");

    if let Ok(bindings) = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .with_include_guard("HMD_BRIDGE_H")
        .generate()
    {
        bindings.write_to_file(format!("{}/include/hmd_bridge.h", crate_dir));
    }
}
