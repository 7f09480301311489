use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=ROCM_PATH");
    println!("cargo:rerun-if-env-changed=RPD_LIB_DIR");

    // The rpd tracer is only linked when the feature asks for it
    if env::var("CARGO_FEATURE_RPD").is_err() {
        return;
    }

    let rocm_root = env::var("ROCM_PATH").unwrap_or_else(|_| "/opt/rocm".to_string());
    println!("cargo:rustc-link-search=native={}/lib", rocm_root);

    // rpd is usually built from source and installed outside the ROCm tree
    if let Ok(rpd_dir) = env::var("RPD_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", rpd_dir);
    }
    println!("cargo:rustc-link-search=native=/usr/local/lib");
    println!("cargo:rustc-link-lib=dylib=rpd_tracer");
}
