use std::env;

fn main() {
    let version = env::var("DEVISION_VERSION")
        .or_else(|_| env::var("CARGO_PKG_VERSION"))
        .unwrap_or_default();
    println!("cargo:rustc-env=DEVISION_VERSION={version}");
    println!("cargo:rerun-if-env-changed=DEVISION_VERSION");
}
