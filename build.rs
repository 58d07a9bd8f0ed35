// Build script for the fitting engine bridge
//
// flutter_rust_bridge v2 code generation is run via the CLI tool:
//   flutter_rust_bridge_codegen generate
//
// The generated Dart bindings wrap the functions in src/api.rs.

fn main() {
    // Tell cargo to rerun this build script if api.rs changes
    println!("cargo:rerun-if-changed=src/api.rs");

    // The native fitting engine is a C++ library; Android builds must link
    // against libc++_shared so its runtime symbols resolve on all ABIs.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("android") {
        println!("cargo:rustc-link-lib=c++_shared");
    }
}
